//! CSV writers for the damage and loss reports.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::damage::aggregate::{
    asset_damage_rows, asset_loss_rows, tag_damage_rows, tag_loss_rows, total_damage,
    total_losses,
};
use crate::damage::{RealizationOutcome, ScenarioOutcome};
use crate::data::Exposure;
use crate::error::{QuakeError, Result};
use crate::export::plan::{OutputKind, PlannedOutput};

/// Identifies one export; stamped on every file it writes.
#[derive(Debug, Clone, Copy)]
pub struct ExportContext {
    pub calc_id: Uuid,
    pub exported_at: DateTime<Utc>,
}

impl ExportContext {
    pub fn new() -> Self {
        Self {
            calc_id: Uuid::new_v4(),
            exported_at: Utc::now(),
        }
    }
}

impl Default for ExportContext {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportedFile {
    pub kind: OutputKind,
    pub gsim: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// A table ready to be written: header plus stringified rows.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn fmt_value(value: f64) -> String {
    format!("{value:.6}")
}

fn stat_columns(names: &[String], with_stddev: bool) -> Vec<String> {
    names
        .iter()
        .flat_map(|name| {
            let mean = format!("{name}~mean");
            if with_stddev {
                vec![mean, format!("{name}~stddev")]
            } else {
                vec![mean]
            }
        })
        .collect()
}

fn interleave(mean: &[f64], stddev: Option<&[f64]>) -> Vec<String> {
    match stddev {
        Some(stddev) => mean
            .iter()
            .zip(stddev)
            .flat_map(|(m, s)| [fmt_value(*m), fmt_value(*s)])
            .collect(),
        None => mean.iter().map(|m| fmt_value(*m)).collect(),
    }
}

const ASSET_COLUMNS: [&str; 4] = ["asset_id", "taxonomy", "lon", "lat"];

fn asset_prefix(asset_id: &str, taxonomy: &str, lon: f64, lat: f64) -> Vec<String> {
    vec![
        asset_id.to_string(),
        taxonomy.to_string(),
        format!("{lon:.5}"),
        format!("{lat:.5}"),
    ]
}

/// Build the table for one output of one realization.
pub fn build_table(
    kind: OutputKind,
    outcome: &ScenarioOutcome,
    realization: &RealizationOutcome,
    exposure: &Exposure,
    aggregate_by: &[String],
) -> Table {
    let states = outcome.damage_states.as_slice();
    let loss_types = outcome.loss_types.as_slice();
    let columns = |prefix: Vec<String>, names: &[String], with_stddev: bool| {
        prefix
            .into_iter()
            .chain(stat_columns(names, with_stddev))
            .collect::<Vec<_>>()
    };
    let asset_header = || ASSET_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>();

    match kind {
        OutputKind::DmgByAsset => Table {
            header: columns(asset_header(), states, true),
            rows: asset_damage_rows(outcome, realization, exposure)
                .into_iter()
                .map(|row| {
                    let mut cells = asset_prefix(&row.asset_id, &row.taxonomy, row.lon, row.lat);
                    cells.extend(interleave(&row.mean, Some(row.stddev.as_slice())));
                    cells
                })
                .collect(),
        },
        OutputKind::DmgByTag => Table {
            header: columns(aggregate_by.to_vec(), states, false),
            rows: tag_damage_rows(outcome, realization, exposure, aggregate_by)
                .into_iter()
                .map(|row| {
                    let mut cells = row.tag_values;
                    cells.extend(interleave(&row.mean, None));
                    cells
                })
                .collect(),
        },
        OutputKind::DmgTotal => {
            let total = total_damage(outcome, realization);
            Table {
                header: columns(Vec::new(), states, true),
                rows: vec![interleave(&total.mean, Some(total.stddev.as_slice()))],
            }
        }
        OutputKind::LossesByAsset => Table {
            header: columns(asset_header(), loss_types, true),
            rows: asset_loss_rows(realization, exposure)
                .into_iter()
                .map(|row| {
                    let mut cells = asset_prefix(&row.asset_id, &row.taxonomy, row.lon, row.lat);
                    cells.extend(interleave(&row.mean, Some(row.stddev.as_slice())));
                    cells
                })
                .collect(),
        },
        OutputKind::LossesByTag => Table {
            header: columns(aggregate_by.to_vec(), loss_types, true),
            rows: tag_loss_rows(outcome, realization, exposure, aggregate_by)
                .into_iter()
                .map(|row| {
                    let mut cells = row.tag_values;
                    cells.extend(interleave(&row.mean, Some(row.stddev.as_slice())));
                    cells
                })
                .collect(),
        },
        OutputKind::LossesTotal => Table {
            header: vec!["loss_type".to_string(), "mean".to_string(), "stddev".to_string()],
            rows: total_losses(outcome, realization)
                .into_iter()
                .map(|total| vec![total.loss_type, fmt_value(total.mean), fmt_value(total.stddev)])
                .collect(),
        },
    }
}

/// Write a table preceded by a `#` metadata line.
pub fn write_table(path: &Path, metadata: &str, table: &Table) -> Result<()> {
    let write_error = |source| QuakeError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(write_error)?;
    writeln!(file, "# {metadata}").map_err(write_error)?;
    let mut writer = csv::Writer::from_writer(file);
    let csv_error = |source| QuakeError::Csv {
        path: path.to_path_buf(),
        source,
    };
    writer.write_record(&table.header).map_err(csv_error)?;
    for row in &table.rows {
        writer.write_record(row).map_err(csv_error)?;
    }
    writer.flush().map_err(write_error)?;
    Ok(())
}

fn metadata_line(context: &ExportContext, planned: &PlannedOutput) -> String {
    format!(
        "generated_by=quakedmg {}; calc_id={}; output={}; gsim={}; exported_at={}",
        env!("CARGO_PKG_VERSION"),
        context.calc_id,
        planned.title,
        planned.gsim,
        context.exported_at.to_rfc3339()
    )
}

/// Write every planned output into `export_dir`, creating it if needed.
pub fn export_outputs(
    export_dir: &Path,
    plan: &[PlannedOutput],
    outcome: &ScenarioOutcome,
    exposure: &Exposure,
    aggregate_by: &[String],
    context: &ExportContext,
) -> Result<Vec<ExportedFile>> {
    fs::create_dir_all(export_dir).map_err(|source| QuakeError::Write {
        path: export_dir.to_path_buf(),
        source,
    })?;
    let mut exported = Vec::with_capacity(plan.len());
    for planned in plan {
        let realization = outcome
            .realizations
            .iter()
            .find(|realization| realization.gsim == planned.gsim)
            .ok_or_else(|| {
                QuakeError::invalid(format!("no results for gsim '{}'", planned.gsim))
            })?;
        let table = build_table(planned.kind, outcome, realization, exposure, aggregate_by);
        let path = export_dir.join(&planned.file_name);
        write_table(&path, &metadata_line(context, planned), &table)?;
        info!(output = %planned.kind, gsim = %planned.gsim, rows = table.rows.len(), path = %path.display(), "exported");
        exported.push(ExportedFile {
            kind: planned.kind,
            gsim: planned.gsim.clone(),
            path,
            rows: table.rows.len(),
        });
    }
    Ok(exported)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stat_columns_follow_name_order() {
        let names = vec!["no_damage".to_string(), "complete".to_string()];
        assert_eq!(
            stat_columns(&names, true),
            vec!["no_damage~mean", "no_damage~stddev", "complete~mean", "complete~stddev"]
        );
        assert_eq!(stat_columns(&names, false), vec!["no_damage~mean", "complete~mean"]);
    }

    #[test]
    fn interleave_pairs_mean_with_stddev() {
        assert_eq!(
            interleave(&[1.0, 2.5], Some(&[0.1, 0.0][..])),
            vec!["1.000000", "0.100000", "2.500000", "0.000000"]
        );
        assert_eq!(interleave(&[3.0], None), vec!["3.000000"]);
    }

    #[test]
    fn write_table_emits_metadata_then_csv() {
        let dir = std::env::temp_dir().join(format!("quakedmg-writer-{}", Uuid::new_v4()));
        fs::create_dir_all(&dir).expect("temp dir");
        let path = dir.join("t.csv");
        let table = Table {
            header: vec!["a".to_string(), "b".to_string()],
            rows: vec![vec!["1".to_string(), "x,y".to_string()]],
        };
        write_table(&path, "calc_id=test", &table).expect("table should be written");
        let written = fs::read_to_string(&path).expect("file exists");
        assert_eq!(written, "# calc_id=test\na,b\n1,\"x,y\"\n");
        let _ = fs::remove_dir_all(dir);
    }
}
