//! Associate each asset with its closest hazard site, within a distance limit.

use serde::Serialize;

use crate::data::{Asset, Site};

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Association {
    pub asset_index: usize,
    pub site_id: u32,
    pub distance_km: f64,
}

#[derive(Debug, Clone, Default)]
pub struct AssociationResult {
    pub associated: Vec<Association>,
    /// Indices of assets with no site within the limit.
    pub discarded: Vec<usize>,
}

/// Great-circle distance in kilometres.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let d_phi = phi2 - phi1;
    let d_lambda = (lon2 - lon1).to_radians();
    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
}

/// Closest site per asset; ties go to the first site listed.
pub fn associate_assets(assets: &[Asset], sites: &[Site], max_distance_km: f64) -> AssociationResult {
    let mut result = AssociationResult::default();
    for (asset_index, asset) in assets.iter().enumerate() {
        let closest = sites
            .iter()
            .map(|site| (site, haversine_km(asset.lon, asset.lat, site.lon, site.lat)))
            .fold(None::<(&Site, f64)>, |best, candidate| match best {
                Some((_, best_distance)) if best_distance <= candidate.1 => best,
                _ => Some(candidate),
            });
        match closest {
            Some((site, distance_km)) if distance_km <= max_distance_km => {
                result.associated.push(Association {
                    asset_index,
                    site_id: site.id,
                    distance_km,
                })
            }
            _ => result.discarded.push(asset_index),
        }
    }
    result
}
