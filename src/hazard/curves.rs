//! Classical PSHA: combine rupture exceedance probabilities into hazard
//! curves per site.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{QuakeError, Result};
use crate::export::writer::{write_table, ExportContext, Table};
use crate::hazard::model::{HazardModel, Interdependence, Rupture, Source, SourceGroup};
use crate::hazard::probability_map::{ProbabilityCurve, ProbabilityMap};
use crate::parallel::{batch_ranges, WorkerPool};
use crate::stats::exceedance;

/// Hazard curves per site, `poes[site][imt][level]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HazardCurves {
    pub imts: Vec<String>,
    pub levels: Vec<Vec<f64>>,
    pub site_ids: Vec<u32>,
    pub poes: Vec<Vec<Vec<f64>>>,
}

impl HazardCurves {
    pub fn curve(&self, site_id: u32, imt: &str) -> Option<&[f64]> {
        let site = self.site_ids.iter().position(|id| *id == site_id)?;
        let imt = self.imts.iter().position(|name| name == imt)?;
        Some(self.poes[site][imt].as_slice())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SourceStats {
    ruptures: usize,
    contributing: usize,
}

/// Conditional PoE of every level for one rupture, per site it affects.
fn rupture_poes(
    rupture: &Rupture,
    model: &HazardModel,
) -> BTreeMap<u32, ProbabilityCurve> {
    let mut out = BTreeMap::new();
    for site in &rupture.sites {
        let mut poes = Vec::with_capacity(model.num_levels());
        for imtl in &model.imtls {
            match site.ground_motion.get(&imtl.imt) {
                Some(gm) => poes.extend(imtl.levels.iter().map(|level| {
                    let distance = level.ln() - gm.mean;
                    if gm.sigma == 0.0 {
                        exceedance(distance, Some(0.0))
                    } else {
                        exceedance(distance / gm.sigma, model.truncation_level)
                    }
                })),
                None => poes.extend(std::iter::repeat(0.0).take(imtl.levels.len())),
            }
        }
        out.insert(site.site_id, ProbabilityCurve(poes));
    }
    out
}

fn source_poe_map(
    source: &Source,
    model: &HazardModel,
    rup_interdep: Interdependence,
) -> (ProbabilityMap, SourceStats) {
    let num_levels = model.num_levels();
    let mut stats = SourceStats {
        ruptures: source.ruptures.len(),
        contributing: 0,
    };
    let mut pmap = ProbabilityMap::new(num_levels);
    // indep: running product of no-exceedance probabilities, flipped at the end
    let mut no_exceedance: BTreeMap<u32, Vec<f64>> = BTreeMap::new();

    for rupture in &source.ruptures {
        let poes = rupture_poes(rupture, model);
        if poes.values().any(|curve| curve.values().iter().any(|p| *p > 0.0)) {
            stats.contributing += 1;
        }
        for (site_id, curve) in poes {
            match rup_interdep {
                Interdependence::Indep => {
                    let product = no_exceedance
                        .entry(site_id)
                        .or_insert_with(|| vec![1.0; num_levels]);
                    for (acc, poe) in product.iter_mut().zip(curve.values()) {
                        *acc *= rupture.occurrence.no_exceedance(*poe);
                    }
                }
                Interdependence::Mutex => {
                    pmap.curve_mut(site_id)
                        .add_weighted(&curve, rupture.occurrence.probability());
                }
            }
        }
    }
    for (site_id, product) in no_exceedance {
        pmap.curves.insert(
            site_id,
            ProbabilityCurve(product.into_iter().map(|p| 1.0 - p).collect()),
        );
    }
    (pmap, stats)
}

fn timed_source_map(
    group: &SourceGroup,
    source: &Source,
    model: &HazardModel,
) -> (ProbabilityMap, SourceStats) {
    let started = Instant::now();
    let (pmap, stats) = source_poe_map(source, model, group.rup_interdep);
    debug!(
        group = group.id,
        source = %source.id,
        ruptures = stats.ruptures,
        contributing = stats.contributing,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "source done"
    );
    (pmap, stats)
}

/// Probability map of one source group.
pub fn pmap_from_group(
    group: &SourceGroup,
    model: &HazardModel,
    pool: &WorkerPool,
) -> Result<ProbabilityMap> {
    let started = Instant::now();
    let num_levels = model.num_levels();
    let (pmap, stats) = match group.src_interdep {
        Interdependence::Indep => {
            let batches = batch_ranges(group.sources.len(), pool.effective_workers());
            let partials = pool.install(|| {
                batches
                    .par_iter()
                    .map(|&(start, end)| {
                        let mut acc = ProbabilityMap::new(num_levels);
                        let mut total = SourceStats::default();
                        for source in &group.sources[start..end] {
                            let (pmap, stats) = timed_source_map(group, source, model);
                            acc |= &pmap;
                            total.ruptures += stats.ruptures;
                            total.contributing += stats.contributing;
                        }
                        (acc, total)
                    })
                    .collect::<Vec<_>>()
            })?;
            let mut acc = ProbabilityMap::new(num_levels);
            let mut total = SourceStats::default();
            for (pmap, stats) in &partials {
                acc |= pmap;
                total.ruptures += stats.ruptures;
                total.contributing += stats.contributing;
            }
            (acc, total)
        }
        Interdependence::Mutex => {
            let mut acc = ProbabilityMap::new(num_levels);
            let mut total = SourceStats::default();
            for source in &group.sources {
                let (pmap, stats) = timed_source_map(group, source, model);
                acc.add_weighted(&pmap, source.weight);
                total.ruptures += stats.ruptures;
                total.contributing += stats.contributing;
            }
            if let Some(probability) = group.grp_probability {
                acc *= probability;
            }
            (acc, total)
        }
    };
    info!(
        group = group.id,
        sources = group.sources.len(),
        ruptures = stats.ruptures,
        contributing = stats.contributing,
        elapsed_ms = started.elapsed().as_secs_f64() * 1000.0,
        "source group done"
    );
    Ok(pmap)
}

/// Hazard curves for every site of the model; groups combine independently.
pub fn calc_hazard_curves(model: &HazardModel, pool: &WorkerPool) -> Result<HazardCurves> {
    let problems = model.problems();
    if !problems.is_empty() {
        return Err(QuakeError::invalid(format!(
            "invalid hazard model: {}",
            problems.join("; ")
        )));
    }
    let mut pmap = ProbabilityMap::new(model.num_levels());
    for group in &model.groups {
        pmap |= &pmap_from_group(group, model, pool)?;
    }
    Ok(HazardCurves {
        imts: model.imtls.iter().map(|imtl| imtl.imt.clone()).collect(),
        levels: model.imtls.iter().map(|imtl| imtl.levels.clone()).collect(),
        site_ids: model.sites.clone(),
        poes: pmap.convert(&model.level_counts(), &model.sites),
    })
}

/// Write one `hazard_curve-<imt>.csv` per IMT into `dir`.
pub fn write_hazard_curves(
    dir: &Path,
    curves: &HazardCurves,
    context: &ExportContext,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|source| QuakeError::Write {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut written = Vec::with_capacity(curves.imts.len());
    for (imt_index, imt) in curves.imts.iter().enumerate() {
        let header: Vec<String> = std::iter::once("site_id".to_string())
            .chain(curves.levels[imt_index].iter().map(|level| format!("poe-{level}")))
            .collect();
        let rows: Vec<Vec<String>> = curves
            .site_ids
            .iter()
            .zip(&curves.poes)
            .map(|(site_id, per_imt)| {
                std::iter::once(site_id.to_string())
                    .chain(per_imt[imt_index].iter().map(|poe| format!("{poe:.6}")))
                    .collect()
            })
            .collect();
        let path = dir.join(format!("hazard_curve-{imt}.csv"));
        let metadata = format!(
            "generated_by=quakedmg {}; calc_id={}; output=Hazard Curves; imt={imt}; exported_at={}",
            env!("CARGO_PKG_VERSION"),
            context.calc_id,
            context.exported_at.to_rfc3339()
        );
        write_table(&path, &metadata, &Table { header, rows })?;
        info!(imt = %imt, sites = curves.site_ids.len(), path = %path.display(), "exported hazard curves");
        written.push(path);
    }
    Ok(written)
}
