//! Exposure model: the assets whose damage is reported.
//! CSV columns `id, lon, lat, taxonomy, number`, cost-type value columns, and
//! free-form tag columns (anything else).

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Serialize;

use crate::error::{QuakeError, Result};

/// Cost types recognised as asset value columns.
pub const COST_TYPES: &[&str] = &[
    "structural",
    "nonstructural",
    "contents",
    "business_interruption",
];

const CORE_COLUMNS: &[&str] = &["id", "lon", "lat", "taxonomy", "number"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Asset {
    pub id: String,
    pub taxonomy: String,
    pub lon: f64,
    pub lat: f64,
    /// Number of buildings represented by the asset.
    pub number: f64,
    /// Replacement value per cost type (total for the asset, not per building).
    pub values: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
}

impl Asset {
    pub fn value(&self, loss_type: &str) -> Option<f64> {
        self.values.get(loss_type).copied()
    }

    pub fn tag(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Exposure {
    pub assets: Vec<Asset>,
    /// Tag column names in file order.
    pub tag_names: Vec<String>,
}

impl Exposure {
    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    pub fn taxonomies(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.assets
            .iter()
            .map(|asset| asset.taxonomy.as_str())
            .filter(|taxonomy| seen.insert(*taxonomy))
            .collect()
    }
}

pub fn load_exposure(path: &Path) -> Result<Exposure> {
    let csv_error = |source| QuakeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(csv_error)?;
    let header: Vec<String> = reader
        .headers()
        .map_err(csv_error)?
        .iter()
        .map(str::to_string)
        .collect();
    parse_exposure_rows(&header, reader.records().map(|row| row.map_err(csv_error)))
}

/// Parse exposure rows already split into cells. Separated from the file
/// reader so tests can feed in-memory records.
pub fn parse_exposure_rows<I>(header: &[String], rows: I) -> Result<Exposure>
where
    I: IntoIterator<Item = Result<csv::StringRecord>>,
{
    let find = |name: &str| header.iter().position(|h| h.eq_ignore_ascii_case(name));
    let mut core = [0usize; 5];
    for (slot, name) in core.iter_mut().zip(CORE_COLUMNS) {
        *slot = find(name)
            .ok_or_else(|| QuakeError::invalid(format!("exposure is missing column '{name}'")))?;
    }
    let [id_col, lon_col, lat_col, taxonomy_col, number_col] = core;

    let mut value_cols = Vec::new();
    let mut tag_cols = Vec::new();
    for (index, name) in header.iter().enumerate() {
        if core.contains(&index) {
            continue;
        }
        let lowered = name.to_lowercase();
        if COST_TYPES.contains(&lowered.as_str()) {
            value_cols.push((index, lowered));
        } else {
            tag_cols.push((index, name.clone()));
        }
    }

    let mut assets = Vec::new();
    let mut seen_ids = HashSet::new();
    for (row_index, row) in rows.into_iter().enumerate() {
        let row = row?;
        let line = row_index + 2;
        let cell = |col: usize| row.get(col).unwrap_or("").trim();
        let number_cell = |col: usize, what: &str| -> Result<f64> {
            cell(col).parse::<f64>().map_err(|_| {
                QuakeError::invalid(format!(
                    "exposure line {line}: {what} '{}' is not a number",
                    cell(col)
                ))
            })
        };

        let id = cell(id_col).to_string();
        if id.is_empty() {
            return Err(QuakeError::invalid(format!("exposure line {line}: empty asset id")));
        }
        if !seen_ids.insert(id.clone()) {
            return Err(QuakeError::invalid(format!("duplicate asset id '{id}'")));
        }
        let number = number_cell(number_col, "number")?;
        if number < 0.0 {
            return Err(QuakeError::invalid(format!(
                "asset '{id}': number of buildings must be non-negative"
            )));
        }

        let mut values = BTreeMap::new();
        for (col, cost_type) in &value_cols {
            if cell(*col).is_empty() {
                continue;
            }
            let value = number_cell(*col, cost_type)?;
            if value < 0.0 {
                return Err(QuakeError::invalid(format!(
                    "asset '{id}': {cost_type} value must be non-negative"
                )));
            }
            values.insert(cost_type.clone(), value);
        }
        let tags = tag_cols
            .iter()
            .map(|(col, name)| (name.clone(), cell(*col).to_string()))
            .collect();

        assets.push(Asset {
            id,
            taxonomy: cell(taxonomy_col).to_string(),
            lon: number_cell(lon_col, "lon")?,
            lat: number_cell(lat_col, "lat")?,
            number,
            values,
            tags,
        });
    }

    Ok(Exposure {
        assets,
        tag_names: tag_cols.into_iter().map(|(_, name)| name).collect(),
    })
}
