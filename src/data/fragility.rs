//! Fragility model: per-taxonomy functions giving the probability of reaching or
//! exceeding each limit state for a ground-motion intensity.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::loader::load_structured;
use crate::error::{QuakeError, Result};
use crate::stats::normal_cdf;

/// Name of the implicit first damage state.
pub const NO_DAMAGE: &str = "no_damage";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragilityModel {
    pub id: String,
    #[serde(default = "default_loss_type")]
    pub loss_type: String,
    pub limit_states: Vec<String>,
    pub functions: Vec<FragilityFunctionSet>,
}

fn default_loss_type() -> String {
    "structural".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FragilityFunctionSet {
    pub taxonomy: String,
    pub imt: String,
    /// Intensities below this level cause no damage.
    #[serde(default)]
    pub no_damage_limit: Option<f64>,
    #[serde(flatten)]
    pub shape: DamageFunction,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LognormalParams {
    pub mean: f64,
    pub stddev: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "lowercase")]
pub enum DamageFunction {
    Continuous {
        #[serde(default)]
        min_iml: Option<f64>,
        #[serde(default)]
        max_iml: Option<f64>,
        params: Vec<LognormalParams>,
    },
    Discrete {
        imls: Vec<f64>,
        /// One row per limit state, one column per IML.
        poes: Vec<Vec<f64>>,
    },
}

impl FragilityModel {
    /// `no_damage` followed by the limit states.
    pub fn damage_states(&self) -> Vec<String> {
        std::iter::once(NO_DAMAGE.to_string())
            .chain(self.limit_states.iter().cloned())
            .collect()
    }

    pub fn function_for(&self, taxonomy: &str) -> Result<&FragilityFunctionSet> {
        self.functions
            .iter()
            .find(|function| function.taxonomy == taxonomy)
            .ok_or_else(|| QuakeError::MissingTaxonomy {
                model: "fragility",
                taxonomy: taxonomy.to_string(),
            })
    }

    /// Structural problems that make the model unusable.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.limit_states.is_empty() {
            problems.push(format!("fragility model '{}' has no limit states", self.id));
        }
        let expected = self.limit_states.len();
        for function in &self.functions {
            let context = format!("fragility function '{}'", function.taxonomy);
            match &function.shape {
                DamageFunction::Continuous { params, min_iml, max_iml } => {
                    if params.len() != expected {
                        problems.push(format!(
                            "{context}: {} params for {expected} limit states",
                            params.len()
                        ));
                    }
                    if params.iter().any(|p| p.mean <= 0.0 || p.stddev < 0.0) {
                        problems.push(format!(
                            "{context}: lognormal mean must be positive and stddev non-negative"
                        ));
                    }
                    if let (Some(lo), Some(hi)) = (min_iml, max_iml) {
                        if lo >= hi {
                            problems.push(format!("{context}: min_iml must be below max_iml"));
                        }
                    }
                }
                DamageFunction::Discrete { imls, poes } => {
                    if poes.len() != expected {
                        problems.push(format!(
                            "{context}: {} poe rows for {expected} limit states",
                            poes.len()
                        ));
                    }
                    if imls.is_empty() || poes.iter().any(|row| row.len() != imls.len()) {
                        problems.push(format!("{context}: every poe row needs one value per iml"));
                    }
                    if imls.windows(2).any(|pair| pair[1] <= pair[0]) {
                        problems.push(format!("{context}: imls must be strictly increasing"));
                    }
                    if poes.iter().flatten().any(|p| !(0.0..=1.0).contains(p)) {
                        problems.push(format!("{context}: poes must lie in [0, 1]"));
                    }
                }
            }
        }
        problems
    }
}

impl FragilityFunctionSet {
    /// Probability of reaching or exceeding each limit state at `iml`,
    /// forced non-increasing across limit states.
    pub fn poes(&self, iml: f64) -> Vec<f64> {
        let below_threshold = iml <= 0.0
            || self
                .no_damage_limit
                .map(|limit| iml < limit)
                .unwrap_or(false);
        let mut poes = match &self.shape {
            DamageFunction::Continuous { params, .. } if below_threshold => vec![0.0; params.len()],
            DamageFunction::Discrete { poes, .. } if below_threshold => vec![0.0; poes.len()],
            DamageFunction::Continuous {
                min_iml,
                max_iml,
                params,
            } => {
                let clipped = iml
                    .max(min_iml.unwrap_or(f64::MIN_POSITIVE))
                    .min(max_iml.unwrap_or(f64::INFINITY));
                params
                    .iter()
                    .map(|p| lognormal_cdf(clipped, *p))
                    .collect()
            }
            DamageFunction::Discrete { imls, poes } => poes
                .iter()
                .map(|row| self.interpolate(imls, row, iml))
                .collect::<Vec<_>>(),
        };
        for index in 1..poes.len() {
            if poes[index] > poes[index - 1] {
                poes[index] = poes[index - 1];
            }
        }
        poes
    }

    fn interpolate(&self, imls: &[f64], row: &[f64], iml: f64) -> f64 {
        let (Some(&first), Some(&last)) = (imls.first(), imls.last()) else {
            return 0.0;
        };
        if iml >= last {
            return row.last().copied().unwrap_or(0.0);
        }
        if iml <= first {
            // Ramp up from zero at the no-damage limit when one precedes the first level.
            return match self.no_damage_limit {
                Some(limit) if limit < first && iml > limit => {
                    row[0] * (iml - limit) / (first - limit)
                }
                _ => row[0],
            };
        }
        let upper = imls.partition_point(|level| *level < iml);
        let (x0, x1) = (imls[upper - 1], imls[upper]);
        let (y0, y1) = (row[upper - 1], row[upper]);
        y0 + (y1 - y0) * (iml - x0) / (x1 - x0)
    }
}

/// Lognormal CDF with mean and standard deviation given in linear units.
fn lognormal_cdf(iml: f64, params: LognormalParams) -> f64 {
    if params.stddev == 0.0 {
        return if iml >= params.mean { 1.0 } else { 0.0 };
    }
    let variance = params.stddev * params.stddev;
    let sigma = (1.0 + variance / (params.mean * params.mean)).ln().sqrt();
    let mu = (params.mean * params.mean / (variance + params.mean * params.mean).sqrt()).ln();
    normal_cdf((iml.ln() - mu) / sigma)
}

/// Fractions of buildings in each damage state (`no_damage` first) for
/// non-increasing limit-state PoEs. The fractions sum to 1.
pub fn damage_fractions(poes: &[f64]) -> Vec<f64> {
    let mut fractions = Vec::with_capacity(poes.len() + 1);
    let mut previous = 1.0;
    for poe in poes {
        fractions.push((previous - poe).max(0.0));
        previous = *poe;
    }
    fractions.push(previous);
    fractions
}

pub fn load_fragility_model(path: &Path) -> Result<FragilityModel> {
    load_structured(path)
}
