//! Reduce per-event outcomes to the reported statistics: per asset, per tag
//! combination and for the whole portfolio.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::damage::engine::{RealizationOutcome, ScenarioOutcome};
use crate::data::Exposure;
use crate::stats::mean_std;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetDamageRow {
    pub asset_id: String,
    pub taxonomy: String,
    pub lon: f64,
    pub lat: f64,
    /// Per damage state.
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagDamageRow {
    /// One value per `aggregate_by` tag, in that order.
    pub tag_values: Vec<String>,
    pub mean: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalDamage {
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssetLossRow {
    pub asset_id: String,
    pub taxonomy: String,
    pub lon: f64,
    pub lat: f64,
    /// Per loss type.
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagLossRow {
    pub tag_values: Vec<String>,
    pub mean: Vec<f64>,
    pub stddev: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalLoss {
    pub loss_type: String,
    pub mean: f64,
    pub stddev: f64,
}

/// Column-wise mean and stddev of an `[event][column]` matrix.
fn column_stats(rows: &[Vec<f64>], width: usize) -> (Vec<f64>, Vec<f64>) {
    (0..width)
        .map(|col| {
            let column: Vec<f64> = rows.iter().map(|row| row[col]).collect();
            mean_std(&column)
        })
        .unzip()
}

fn add_into(acc: &mut [Vec<f64>], rows: &[Vec<f64>]) {
    for (acc_row, row) in acc.iter_mut().zip(rows) {
        for (a, v) in acc_row.iter_mut().zip(row) {
            *a += v;
        }
    }
}

pub fn asset_damage_rows(
    outcome: &ScenarioOutcome,
    realization: &RealizationOutcome,
    exposure: &Exposure,
) -> Vec<AssetDamageRow> {
    let width = outcome.damage_states.len();
    realization
        .assets
        .iter()
        .map(|asset_outcome| {
            let asset = &exposure.assets[asset_outcome.asset_index];
            let (mean, stddev) = column_stats(&asset_outcome.damage, width);
            AssetDamageRow {
                asset_id: asset.id.clone(),
                taxonomy: asset.taxonomy.clone(),
                lon: asset.lon,
                lat: asset.lat,
                mean,
                stddev,
            }
        })
        .collect()
}

/// Per-event damage summed over the assets selected by `tag_key`, keyed by tag values.
fn damage_by_tag_events(
    outcome: &ScenarioOutcome,
    realization: &RealizationOutcome,
    exposure: &Exposure,
    aggregate_by: &[String],
) -> BTreeMap<Vec<String>, Vec<Vec<f64>>> {
    let width = outcome.damage_states.len();
    let mut groups: BTreeMap<Vec<String>, Vec<Vec<f64>>> = BTreeMap::new();
    for asset_outcome in &realization.assets {
        let key = tag_key(exposure, asset_outcome.asset_index, aggregate_by);
        let acc = groups
            .entry(key)
            .or_insert_with(|| vec![vec![0.0; width]; realization.num_events()]);
        add_into(acc, &asset_outcome.damage);
    }
    groups
}

fn tag_key(exposure: &Exposure, asset_index: usize, aggregate_by: &[String]) -> Vec<String> {
    let asset = &exposure.assets[asset_index];
    aggregate_by
        .iter()
        .map(|name| asset.tag(name).unwrap_or("").to_string())
        .collect()
}

pub fn tag_damage_rows(
    outcome: &ScenarioOutcome,
    realization: &RealizationOutcome,
    exposure: &Exposure,
    aggregate_by: &[String],
) -> Vec<TagDamageRow> {
    let width = outcome.damage_states.len();
    damage_by_tag_events(outcome, realization, exposure, aggregate_by)
        .into_iter()
        .map(|(tag_values, events)| TagDamageRow {
            tag_values,
            mean: column_stats(&events, width).0,
        })
        .collect()
}

pub fn total_damage(outcome: &ScenarioOutcome, realization: &RealizationOutcome) -> TotalDamage {
    let width = outcome.damage_states.len();
    let mut events = vec![vec![0.0; width]; realization.num_events()];
    for asset_outcome in &realization.assets {
        add_into(&mut events, &asset_outcome.damage);
    }
    let (mean, stddev) = column_stats(&events, width);
    TotalDamage { mean, stddev }
}

pub fn asset_loss_rows(
    realization: &RealizationOutcome,
    exposure: &Exposure,
) -> Vec<AssetLossRow> {
    realization
        .assets
        .iter()
        .map(|asset_outcome| {
            let asset = &exposure.assets[asset_outcome.asset_index];
            let (mean, stddev): (Vec<f64>, Vec<f64>) = asset_outcome
                .losses
                .iter()
                .map(|per_event| mean_std(per_event))
                .unzip();
            AssetLossRow {
                asset_id: asset.id.clone(),
                taxonomy: asset.taxonomy.clone(),
                lon: asset.lon,
                lat: asset.lat,
                mean,
                stddev,
            }
        })
        .collect()
}

pub fn tag_loss_rows(
    outcome: &ScenarioOutcome,
    realization: &RealizationOutcome,
    exposure: &Exposure,
    aggregate_by: &[String],
) -> Vec<TagLossRow> {
    let mut groups: BTreeMap<Vec<String>, Vec<Vec<f64>>> = BTreeMap::new();
    for asset_outcome in &realization.assets {
        let key = tag_key(exposure, asset_outcome.asset_index, aggregate_by);
        let acc = groups.entry(key).or_insert_with(|| {
            vec![vec![0.0; realization.num_events()]; outcome.loss_types.len()]
        });
        add_into(acc, &asset_outcome.losses);
    }
    groups
        .into_iter()
        .map(|(tag_values, per_loss_type)| {
            let (mean, stddev): (Vec<f64>, Vec<f64>) =
                per_loss_type.iter().map(|events| mean_std(events)).unzip();
            TagLossRow {
                tag_values,
                mean,
                stddev,
            }
        })
        .collect()
}

pub fn total_losses(outcome: &ScenarioOutcome, realization: &RealizationOutcome) -> Vec<TotalLoss> {
    let mut sums = vec![vec![0.0; realization.num_events()]; outcome.loss_types.len()];
    for asset_outcome in &realization.assets {
        add_into(&mut sums, &asset_outcome.losses);
    }
    outcome
        .loss_types
        .iter()
        .zip(&sums)
        .map(|(loss_type, events)| {
            let (mean, stddev) = mean_std(events);
            TotalLoss {
                loss_type: loss_type.clone(),
                mean,
                stddev,
            }
        })
        .collect()
}

/// Mean number of damaged buildings (every state except `no_damage`) per event.
pub fn mean_damaged(total: &TotalDamage) -> f64 {
    total.mean.iter().skip(1).sum()
}
