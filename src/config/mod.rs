//! Job configuration, read from a YAML job file.
//!
//! Relative paths are resolved against the job file's directory.
//! `QUAKEDMG_EXPORT_DIR` overrides `export_dir`.

pub mod validate;

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::data::loader::resolve_relative;
use crate::error::{QuakeError, Result};

pub use validate::{validate_job, ValidationDiagnostic, ValidationReport, ValidationSeverity};

pub const EXPORT_DIR_ENV: &str = "QUAKEDMG_EXPORT_DIR";
pub const DEFAULT_ASSET_HAZARD_DISTANCE_KM: f64 = 15.0;
pub const DEFAULT_MASTER_SEED: u64 = 42;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    #[serde(default)]
    pub description: String,
    pub exposure_file: PathBuf,
    pub sites_file: PathBuf,
    pub gmfs_file: PathBuf,
    #[serde(default)]
    pub fragility_file: Option<PathBuf>,
    /// Loss type -> consequence model file.
    #[serde(default)]
    pub consequence_files: BTreeMap<String, PathBuf>,
    /// GSIMs to report, in order. Empty means every GSIM found in the GMF file.
    #[serde(default)]
    pub gsims: Vec<String>,
    /// Kilometres; assets farther from every hazard site are discarded.
    #[serde(default = "default_asset_hazard_distance")]
    pub asset_hazard_distance: f64,
    #[serde(default)]
    pub aggregate_by: Vec<String>,
    /// Also export the tag and portfolio aggregates.
    #[serde(default)]
    pub export_aggregates: bool,
    #[serde(default)]
    pub discrete_damage_distribution: bool,
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Worker threads; 0 uses every core.
    #[serde(default)]
    pub workers: usize,
}

fn default_asset_hazard_distance() -> f64 {
    DEFAULT_ASSET_HAZARD_DISTANCE_KM
}

fn default_master_seed() -> u64 {
    DEFAULT_MASTER_SEED
}

fn default_export_dir() -> PathBuf {
    PathBuf::from("output")
}

impl JobConfig {
    pub fn from_yaml(raw: &str, source: &Path) -> Result<Self> {
        serde_yaml::from_str(raw).map_err(|err| QuakeError::Yaml {
            path: source.to_path_buf(),
            source: err,
        })
    }

    pub fn has_fragility(&self) -> bool {
        self.fragility_file.is_some()
    }

    pub fn has_consequences(&self) -> bool {
        !self.consequence_files.is_empty()
    }

    /// Make every input and output path absolute with respect to `base_dir`.
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        self.exposure_file = resolve_relative(base_dir, &self.exposure_file);
        self.sites_file = resolve_relative(base_dir, &self.sites_file);
        self.gmfs_file = resolve_relative(base_dir, &self.gmfs_file);
        self.fragility_file = self
            .fragility_file
            .as_ref()
            .map(|path| resolve_relative(base_dir, path));
        for path in self.consequence_files.values_mut() {
            *path = resolve_relative(base_dir, path);
        }
        self.export_dir = resolve_relative(base_dir, &self.export_dir);
    }
}

pub fn load_job(path: &Path) -> Result<JobConfig> {
    let raw = fs::read_to_string(path).map_err(|source| QuakeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut job = JobConfig::from_yaml(&raw, path)?;
    if let Ok(dir) = env::var(EXPORT_DIR_ENV) {
        if !dir.trim().is_empty() {
            job.export_dir = PathBuf::from(dir);
        }
    }
    let base_dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    job.resolve_paths(base_dir);
    Ok(job)
}
