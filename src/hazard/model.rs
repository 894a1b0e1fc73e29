//! Classical hazard input: intensity levels, source groups and their ruptures,
//! with ground-motion medians and sigmas already evaluated per site.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::loader::load_structured;
use crate::error::Result;

/// Intensity measure levels per IMT, in a fixed order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImtLevels {
    pub imt: String,
    pub levels: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HazardModel {
    pub imtls: Vec<ImtLevels>,
    #[serde(default)]
    pub truncation_level: Option<f64>,
    pub sites: Vec<u32>,
    pub groups: Vec<SourceGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interdependence {
    #[default]
    Indep,
    Mutex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceGroup {
    pub id: u32,
    #[serde(default)]
    pub tectonic_region_type: String,
    #[serde(default)]
    pub src_interdep: Interdependence,
    #[serde(default)]
    pub rup_interdep: Interdependence,
    #[serde(default)]
    pub grp_probability: Option<f64>,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    /// Weight within a mutually exclusive group.
    #[serde(default = "default_weight")]
    pub weight: f64,
    pub ruptures: Vec<Rupture>,
}

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rupture {
    #[serde(flatten)]
    pub occurrence: Occurrence,
    pub sites: Vec<RuptureSite>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Occurrence {
    Poisson { rate: f64, investigation_time: f64 },
    Probability { probability: f64 },
}

impl Occurrence {
    /// Probability that the rupture produces no exceedance, given the
    /// conditional exceedance probability `poe`.
    pub fn no_exceedance(&self, poe: f64) -> f64 {
        match *self {
            Self::Poisson {
                rate,
                investigation_time,
            } => (-rate * investigation_time * poe).exp(),
            Self::Probability { probability } => 1.0 - probability * poe,
        }
    }

    /// Probability of at least one occurrence.
    pub fn probability(&self) -> f64 {
        match *self {
            Self::Poisson {
                rate,
                investigation_time,
            } => 1.0 - (-rate * investigation_time).exp(),
            Self::Probability { probability } => probability,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuptureSite {
    pub site_id: u32,
    /// IMT -> ground motion in natural-log units.
    pub ground_motion: BTreeMap<String, GroundMotion>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroundMotion {
    pub mean: f64,
    pub sigma: f64,
}

impl HazardModel {
    pub fn num_levels(&self) -> usize {
        self.imtls.iter().map(|imtl| imtl.levels.len()).sum()
    }

    pub fn level_counts(&self) -> Vec<usize> {
        self.imtls.iter().map(|imtl| imtl.levels.len()).collect()
    }

    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if self.imtls.is_empty() {
            problems.push("no intensity measure types".to_string());
        }
        for imtl in &self.imtls {
            if imtl.levels.is_empty() || imtl.levels.iter().any(|level| *level <= 0.0) {
                problems.push(format!("imt '{}': levels must be positive", imtl.imt));
            }
            if imtl.levels.windows(2).any(|pair| pair[1] <= pair[0]) {
                problems.push(format!("imt '{}': levels must be increasing", imtl.imt));
            }
        }
        for group in &self.groups {
            if let Some(p) = group.grp_probability {
                if group.src_interdep != Interdependence::Mutex {
                    problems.push(format!(
                        "group {}: grp_probability applies to mutually exclusive groups only",
                        group.id
                    ));
                } else if !(0.0..=1.0).contains(&p) {
                    problems.push(format!("group {}: grp_probability must lie in [0, 1]", group.id));
                }
            }
            if group.src_interdep == Interdependence::Mutex {
                let total: f64 = group.sources.iter().map(|source| source.weight).sum();
                if (total - 1.0).abs() > 1e-6 {
                    problems.push(format!(
                        "group {}: mutually exclusive source weights sum to {total}, not 1",
                        group.id
                    ));
                }
            }
            for source in &group.sources {
                for rupture in &source.ruptures {
                    let invalid = match rupture.occurrence {
                        Occurrence::Poisson {
                            rate,
                            investigation_time,
                        } => rate < 0.0 || investigation_time <= 0.0,
                        Occurrence::Probability { probability } => {
                            !(0.0..=1.0).contains(&probability)
                        }
                    };
                    if invalid {
                        problems.push(format!("source '{}': invalid rupture occurrence", source.id));
                    }
                    if rupture
                        .sites
                        .iter()
                        .flat_map(|site| site.ground_motion.values())
                        .any(|gm| gm.sigma < 0.0)
                    {
                        problems.push(format!("source '{}': negative ground-motion sigma", source.id));
                    }
                }
            }
        }
        problems
    }
}

pub fn load_hazard_model(path: &Path) -> Result<HazardModel> {
    load_structured(path)
}
