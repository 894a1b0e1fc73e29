//! Hazard sites and ground-motion fields, one realization per GSIM.
//!
//! `sites.csv`: `site_id, lon, lat`.
//! `gmf_data.csv`: `gsim, site_id, event_id, <IMT columns>`; an IMT column may
//! carry a `gmv_` prefix. A missing `(site, event)` row means the shaking was
//! below the minimum intensity and reads back as zero.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use serde::Serialize;

use crate::error::{QuakeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Site {
    pub id: u32,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GmfRow {
    pub gsim: String,
    pub site_id: u32,
    pub event_id: u64,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct GroundMotionFields {
    pub imts: Vec<String>,
    pub gsims: Vec<String>,
    /// Per GSIM, ascending event ids; event ordinals of that realization index into it.
    pub event_ids: Vec<Vec<u64>>,
    /// Per GSIM: site id -> `event_count * imt_count` values, event-major.
    fields: Vec<HashMap<u32, Vec<f64>>>,
}

impl GroundMotionFields {
    pub fn from_rows(imts: Vec<String>, rows: Vec<GmfRow>) -> Result<Self> {
        let mut gsims: Vec<String> = Vec::new();
        let mut events: Vec<BTreeSet<u64>> = Vec::new();
        for row in &rows {
            if row.values.len() != imts.len() {
                return Err(QuakeError::invalid(format!(
                    "gmf row for site {} event {}: {} values for {} imts",
                    row.site_id,
                    row.event_id,
                    row.values.len(),
                    imts.len()
                )));
            }
            let gsim_index = match gsims.iter().position(|gsim| *gsim == row.gsim) {
                Some(index) => index,
                None => {
                    gsims.push(row.gsim.clone());
                    events.push(BTreeSet::new());
                    gsims.len() - 1
                }
            };
            events[gsim_index].insert(row.event_id);
        }
        let event_ids: Vec<Vec<u64>> = events
            .into_iter()
            .map(|ids| ids.into_iter().collect())
            .collect();
        let event_ordinals: Vec<HashMap<u64, usize>> = event_ids
            .iter()
            .map(|ids| {
                ids.iter()
                    .enumerate()
                    .map(|(ordinal, id)| (*id, ordinal))
                    .collect()
            })
            .collect();

        let width = imts.len();
        let mut fields: Vec<HashMap<u32, Vec<f64>>> = vec![HashMap::new(); gsims.len()];
        let mut seen = BTreeSet::new();
        for row in rows {
            if !seen.insert((row.gsim.clone(), row.site_id, row.event_id)) {
                return Err(QuakeError::invalid(format!(
                    "duplicate gmf row for gsim '{}' site {} event {}",
                    row.gsim, row.site_id, row.event_id
                )));
            }
            let gsim_index = gsims
                .iter()
                .position(|gsim| *gsim == row.gsim)
                .unwrap_or_default();
            let num_events = event_ids[gsim_index].len();
            let offset = event_ordinals[gsim_index][&row.event_id] * width;
            let slot = fields[gsim_index]
                .entry(row.site_id)
                .or_insert_with(|| vec![0.0; num_events * width]);
            slot[offset..offset + width].copy_from_slice(&row.values);
        }

        Ok(Self {
            imts,
            gsims,
            event_ids,
            fields,
        })
    }

    /// Events of one realization.
    pub fn num_events(&self, gsim_index: usize) -> usize {
        self.event_ids.get(gsim_index).map_or(0, Vec::len)
    }

    /// Events over every realization.
    pub fn total_events(&self) -> usize {
        self.event_ids.iter().map(Vec::len).sum()
    }

    pub fn imt_index(&self, imt: &str) -> Option<usize> {
        self.imts.iter().position(|name| name == imt)
    }

    /// Sites with at least one row for the GSIM, ascending.
    pub fn site_ids(&self, gsim_index: usize) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .fields
            .get(gsim_index)
            .map(|by_site| by_site.keys().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    /// Ground-motion values for one site and IMT across the realization's events.
    pub fn site_values(&self, gsim_index: usize, site_id: u32, imt_index: usize) -> Vec<f64> {
        let width = self.imts.len();
        match self.fields.get(gsim_index).and_then(|by_site| by_site.get(&site_id)) {
            Some(values) => values
                .chunks(width)
                .map(|event| event[imt_index])
                .collect(),
            None => vec![0.0; self.num_events(gsim_index)],
        }
    }

    /// Keep only `selected` GSIMs, in that order.
    pub fn select_gsims(mut self, selected: &[String]) -> Result<Self> {
        let mut fields = Vec::with_capacity(selected.len());
        let mut event_ids = Vec::with_capacity(selected.len());
        for gsim in selected {
            let index = self.gsims.iter().position(|name| name == gsim).ok_or_else(|| {
                QuakeError::invalid(format!("gsim '{gsim}' has no ground-motion fields"))
            })?;
            fields.push(std::mem::take(&mut self.fields[index]));
            event_ids.push(std::mem::take(&mut self.event_ids[index]));
        }
        self.gsims = selected.to_vec();
        self.event_ids = event_ids;
        self.fields = fields;
        Ok(self)
    }
}

fn csv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_path(path)
        .map_err(|source| QuakeError::Csv {
            path: path.to_path_buf(),
            source,
        })
}

fn column(header: &csv::StringRecord, name: &str, path: &Path) -> Result<usize> {
    header
        .iter()
        .position(|h| h.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            QuakeError::invalid(format!("'{}' is missing column '{name}'", path.display()))
        })
}

fn parse_cell<T: std::str::FromStr>(
    record: &csv::StringRecord,
    col: usize,
    what: &str,
    path: &Path,
) -> Result<T> {
    let raw = record.get(col).unwrap_or("");
    raw.parse::<T>().map_err(|_| {
        QuakeError::invalid(format!(
            "'{}': {what} '{raw}' is not a valid number",
            path.display()
        ))
    })
}

pub fn load_sites(path: &Path) -> Result<Vec<Site>> {
    let mut reader = csv_reader(path)?;
    let csv_error = |source| QuakeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let header = reader.headers().map_err(csv_error)?.clone();
    let (id_col, lon_col, lat_col) = (
        column(&header, "site_id", path)?,
        column(&header, "lon", path)?,
        column(&header, "lat", path)?,
    );
    let mut sites = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        sites.push(Site {
            id: parse_cell(&record, id_col, "site_id", path)?,
            lon: parse_cell(&record, lon_col, "lon", path)?,
            lat: parse_cell(&record, lat_col, "lat", path)?,
        });
    }
    Ok(sites)
}

pub fn load_gmfs(path: &Path) -> Result<GroundMotionFields> {
    let mut reader = csv_reader(path)?;
    let csv_error = |source| QuakeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let header = reader.headers().map_err(csv_error)?.clone();
    let gsim_col = column(&header, "gsim", path)?;
    let site_col = column(&header, "site_id", path)?;
    let event_col = column(&header, "event_id", path)?;
    let imt_cols: Vec<(usize, String)> = header
        .iter()
        .enumerate()
        .filter(|(index, _)| ![gsim_col, site_col, event_col].contains(index))
        .map(|(index, name)| (index, name.trim_start_matches("gmv_").to_string()))
        .collect();
    if imt_cols.is_empty() {
        return Err(QuakeError::invalid(format!(
            "'{}' has no intensity measure columns",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        let values = imt_cols
            .iter()
            .map(|(col, imt)| parse_cell::<f64>(&record, *col, imt, path))
            .collect::<Result<Vec<_>>>()?;
        rows.push(GmfRow {
            gsim: record.get(gsim_col).unwrap_or("").to_string(),
            site_id: parse_cell(&record, site_col, "site_id", path)?,
            event_id: parse_cell(&record, event_col, "event_id", path)?,
            values,
        });
    }
    GroundMotionFields::from_rows(imt_cols.into_iter().map(|(_, imt)| imt).collect(), rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(gsim: &str, site_id: u32, event_id: u64, values: &[f64]) -> GmfRow {
        GmfRow {
            gsim: gsim.to_string(),
            site_id,
            event_id,
            values: values.to_vec(),
        }
    }

    fn fields() -> GroundMotionFields {
        GroundMotionFields::from_rows(
            vec!["PGA".to_string(), "SA(0.3)".to_string()],
            vec![
                row("BooreAtkinson2008", 1, 20, &[0.2, 0.4]),
                row("BooreAtkinson2008", 1, 10, &[0.1, 0.3]),
                row("ChiouYoungs2008", 1, 10, &[0.5, 0.6]),
                row("BooreAtkinson2008", 2, 20, &[0.05, 0.07]),
            ],
        )
        .expect("gmfs should build")
    }

    #[test]
    fn events_are_sorted_and_missing_rows_read_zero() {
        let gmfs = fields();
        assert_eq!(gmfs.event_ids, vec![vec![10, 20], vec![10]]);
        assert_eq!(gmfs.gsims, vec!["BooreAtkinson2008", "ChiouYoungs2008"]);
        assert_eq!(gmfs.site_values(0, 1, 0), vec![0.1, 0.2]);
        assert_eq!(gmfs.site_values(0, 2, 1), vec![0.0, 0.07]);
        assert_eq!(gmfs.site_values(1, 1, 0), vec![0.5]);
        assert_eq!(gmfs.site_values(1, 9, 0), vec![0.0]);
        assert_eq!(gmfs.total_events(), 3);
    }

    #[test]
    fn duplicate_rows_are_rejected() {
        let err = GroundMotionFields::from_rows(
            vec!["PGA".to_string()],
            vec![row("G", 1, 1, &[0.1]), row("G", 1, 1, &[0.2])],
        )
        .expect_err("duplicate should fail");
        assert!(err.to_string().contains("duplicate gmf row"));
    }

    #[test]
    fn select_gsims_reorders_and_filters() {
        let gmfs = fields()
            .select_gsims(&["ChiouYoungs2008".to_string()])
            .expect("gsim exists");
        assert_eq!(gmfs.gsims, vec!["ChiouYoungs2008"]);
        assert_eq!(gmfs.site_values(0, 1, 1), vec![0.6]);

        let missing = fields().select_gsims(&["Unknown".to_string()]);
        assert!(missing.is_err());
    }

    #[test]
    fn realizations_keep_their_own_events() {
        let gmfs = GroundMotionFields::from_rows(
            vec!["PGA".to_string()],
            vec![
                row("GsimA", 1, 0, &[0.3]),
                row("GsimA", 1, 1, &[0.3]),
                row("GsimB", 1, 2, &[0.5]),
                row("GsimB", 1, 3, &[0.5]),
            ],
        )
        .expect("gmfs should build");
        assert_eq!(gmfs.num_events(0), 2);
        assert_eq!(gmfs.num_events(1), 2);
        assert_eq!(gmfs.site_values(1, 1, 0), vec![0.5, 0.5]);

        let only_b = gmfs.select_gsims(&["GsimB".to_string()]).expect("gsim exists");
        assert_eq!(only_b.event_ids, vec![vec![2, 3]]);
        assert_eq!(only_b.num_events(0), 2);
        assert_eq!(only_b.site_values(0, 1, 0), vec![0.5, 0.5]);
    }
}
