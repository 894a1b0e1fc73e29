//! Probability-of-exceedance curves keyed by site.
//!
//! A curve holds one PoE per intensity level, all IMTs concatenated in the
//! order of [ImtLevels](crate::hazard::ImtLevels). `a | b` combines independent
//! contributions as `1 - (1 - a)(1 - b)`.

use std::collections::BTreeMap;
use std::ops::{BitOrAssign, MulAssign};

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityCurve(pub Vec<f64>);

impl ProbabilityCurve {
    pub fn zeros(num_levels: usize) -> Self {
        Self(vec![0.0; num_levels])
    }

    pub fn values(&self) -> &[f64] {
        &self.0
    }

    /// `self += other * weight`, used for mutually exclusive contributions.
    pub fn add_weighted(&mut self, other: &ProbabilityCurve, weight: f64) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a += b * weight;
        }
    }
}

impl BitOrAssign<&ProbabilityCurve> for ProbabilityCurve {
    fn bitor_assign(&mut self, other: &ProbabilityCurve) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a = 1.0 - (1.0 - *a) * (1.0 - b);
        }
    }
}

impl MulAssign<f64> for ProbabilityCurve {
    fn mul_assign(&mut self, factor: f64) {
        for value in &mut self.0 {
            *value *= factor;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityMap {
    pub num_levels: usize,
    pub curves: BTreeMap<u32, ProbabilityCurve>,
}

impl ProbabilityMap {
    pub fn new(num_levels: usize) -> Self {
        Self {
            num_levels,
            curves: BTreeMap::new(),
        }
    }

    pub fn get(&self, site_id: u32) -> Option<&ProbabilityCurve> {
        self.curves.get(&site_id)
    }

    /// Curve for `site_id`, created as zeros when absent.
    pub fn curve_mut(&mut self, site_id: u32) -> &mut ProbabilityCurve {
        let num_levels = self.num_levels;
        self.curves
            .entry(site_id)
            .or_insert_with(|| ProbabilityCurve::zeros(num_levels))
    }

    pub fn add_weighted(&mut self, other: &ProbabilityMap, weight: f64) {
        for (site_id, curve) in &other.curves {
            self.curve_mut(*site_id).add_weighted(curve, weight);
        }
    }

    /// Split each site's curve per IMT. Sites without a curve get zeros.
    pub fn convert(&self, level_counts: &[usize], site_ids: &[u32]) -> Vec<Vec<Vec<f64>>> {
        let zeros = ProbabilityCurve::zeros(self.num_levels);
        site_ids
            .iter()
            .map(|site_id| {
                let curve = self.curves.get(site_id).unwrap_or(&zeros);
                let mut start = 0;
                level_counts
                    .iter()
                    .map(|count| {
                        let slice = curve.0[start..start + count].to_vec();
                        start += count;
                        slice
                    })
                    .collect()
            })
            .collect()
    }
}

impl BitOrAssign<&ProbabilityMap> for ProbabilityMap {
    fn bitor_assign(&mut self, other: &ProbabilityMap) {
        for (site_id, curve) in &other.curves {
            match self.curves.get_mut(site_id) {
                Some(existing) => *existing |= curve,
                None => {
                    self.curves.insert(*site_id, curve.clone());
                }
            }
        }
    }
}

impl MulAssign<f64> for ProbabilityMap {
    fn mul_assign(&mut self, factor: f64) {
        for curve in self.curves.values_mut() {
            *curve *= factor;
        }
    }
}
