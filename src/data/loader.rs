//! Load JSON or YAML model files by extension, and resolve job-relative paths.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use crate::error::{QuakeError, Result};

/// Deserialize a `.json`, `.yaml` or `.yml` file. Unknown extensions are read as JSON.
pub fn load_structured<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = fs::read_to_string(path).map_err(|source| QuakeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if is_yaml(path) {
        serde_yaml::from_str(&raw).map_err(|source| QuakeError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    } else {
        serde_json::from_str(&raw).map_err(|source| QuakeError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"))
        .unwrap_or(false)
}

/// Resolve `path` against `base_dir` unless it is already absolute.
pub fn resolve_relative(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_detection_is_case_insensitive() {
        assert!(is_yaml(Path::new("model.YAML")));
        assert!(is_yaml(Path::new("dir/model.yml")));
        assert!(!is_yaml(Path::new("model.json")));
        assert!(!is_yaml(Path::new("model")));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let base = Path::new("/jobs/demo");
        assert_eq!(
            resolve_relative(base, Path::new("exposure.csv")),
            PathBuf::from("/jobs/demo/exposure.csv")
        );
        assert_eq!(
            resolve_relative(base, Path::new("/data/gmf.csv")),
            PathBuf::from("/data/gmf.csv")
        );
    }
}
