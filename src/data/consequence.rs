//! Consequence model: per-taxonomy consequence ratios for each limit state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::loader::load_structured;
use crate::error::{QuakeError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsequenceModel {
    pub id: String,
    pub loss_type: String,
    pub limit_states: Vec<String>,
    pub functions: Vec<ConsequenceFunction>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsequenceFunction {
    pub taxonomy: String,
    /// Fraction of the asset value lost, one ratio per limit state.
    pub params: Vec<f64>,
}

impl ConsequenceModel {
    pub fn function_for(&self, taxonomy: &str) -> Result<&ConsequenceFunction> {
        self.functions
            .iter()
            .find(|function| function.taxonomy == taxonomy)
            .ok_or_else(|| QuakeError::MissingTaxonomy {
                model: "consequence",
                taxonomy: taxonomy.to_string(),
            })
    }

    pub fn problems(&self, fragility_limit_states: Option<&[String]>) -> Vec<String> {
        let mut problems = Vec::new();
        if let Some(expected) = fragility_limit_states {
            if expected != self.limit_states.as_slice() {
                problems.push(format!(
                    "consequence model '{}' limit states {:?} differ from fragility limit states {:?}",
                    self.id, self.limit_states, expected
                ));
            }
        }
        for function in &self.functions {
            if function.params.len() != self.limit_states.len() {
                problems.push(format!(
                    "consequence function '{}': {} ratios for {} limit states",
                    function.taxonomy,
                    function.params.len(),
                    self.limit_states.len()
                ));
            }
            if function.params.iter().any(|ratio| *ratio < 0.0) {
                problems.push(format!(
                    "consequence function '{}': ratios must be non-negative",
                    function.taxonomy
                ));
            }
        }
        problems
    }
}

impl ConsequenceFunction {
    /// Consequence for damage fractions laid out `no_damage` first.
    pub fn consequence(&self, fractions: &[f64], value: f64) -> f64 {
        let ratio: f64 = fractions
            .iter()
            .skip(1)
            .zip(&self.params)
            .map(|(fraction, ratio)| fraction * ratio)
            .sum();
        ratio * value
    }
}

pub fn load_consequence_model(path: &Path) -> Result<ConsequenceModel> {
    load_structured(path)
}
