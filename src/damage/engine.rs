//! Scenario damage evaluation: per GSIM, per asset, per event damage
//! distributions and consequences.

use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::JobConfig;
use crate::damage::assoc::{associate_assets, Association};
use crate::damage::inputs::ScenarioInputs;
use crate::damage::rng::Rng;
use crate::data::fragility::damage_fractions;
use crate::data::{Asset, ConsequenceFunction, FragilityFunctionSet};
use crate::error::{QuakeError, Result};
use crate::parallel::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioSettings {
    pub asset_hazard_distance: f64,
    pub discrete_damage_distribution: bool,
    pub master_seed: u64,
}

impl ScenarioSettings {
    pub fn from_job(job: &JobConfig) -> Self {
        Self {
            asset_hazard_distance: job.asset_hazard_distance,
            discrete_damage_distribution: job.discrete_damage_distribution,
            master_seed: job.master_seed,
        }
    }
}

/// Per-event outcome for one asset under one GSIM.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetOutcome {
    pub asset_index: usize,
    /// `[event][damage_state]`, number of buildings.
    pub damage: Vec<Vec<f64>>,
    /// `[loss_type][event]`.
    pub losses: Vec<Vec<f64>>,
}

#[derive(Debug, Clone)]
pub struct RealizationOutcome {
    pub gsim: String,
    /// Events of this realization; per-event vectors index into it.
    pub event_ids: Vec<u64>,
    pub assets: Vec<AssetOutcome>,
}

impl RealizationOutcome {
    pub fn num_events(&self) -> usize {
        self.event_ids.len()
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioOutcome {
    pub damage_states: Vec<String>,
    pub loss_types: Vec<String>,
    pub associations: Vec<Association>,
    pub discarded_assets: Vec<String>,
    pub realizations: Vec<RealizationOutcome>,
}

pub fn run_scenario(
    inputs: &ScenarioInputs,
    settings: ScenarioSettings,
    pool: &WorkerPool,
) -> Result<ScenarioOutcome> {
    run_scenario_with_parallelism(inputs, settings, pool, true)
}

/// Like [run_scenario] on the calling thread only. Results are identical.
pub fn run_scenario_sequential(
    inputs: &ScenarioInputs,
    settings: ScenarioSettings,
) -> Result<ScenarioOutcome> {
    run_scenario_with_parallelism(inputs, settings, &WorkerPool::default(), false)
}

struct AssetModels<'a> {
    fragility: &'a FragilityFunctionSet,
    imt_index: usize,
    consequences: Vec<(&'a ConsequenceFunction, f64)>,
}

fn run_scenario_with_parallelism(
    inputs: &ScenarioInputs,
    settings: ScenarioSettings,
    pool: &WorkerPool,
    parallel: bool,
) -> Result<ScenarioOutcome> {
    let fragility = inputs.fragility.as_ref().ok_or_else(|| {
        QuakeError::invalid("a scenario damage run needs a fragility model")
    })?;
    let assets = &inputs.exposure.assets;
    let association =
        associate_assets(assets, &inputs.sites, settings.asset_hazard_distance);
    let discarded_assets: Vec<String> = association
        .discarded
        .iter()
        .map(|index| assets[*index].id.clone())
        .collect();
    if !discarded_assets.is_empty() {
        warn!(
            discarded = discarded_assets.len(),
            max_distance_km = settings.asset_hazard_distance,
            "assets farther than the hazard distance from every site were discarded"
        );
    }
    if association.associated.is_empty() {
        return Err(QuakeError::invalid(format!(
            "no asset lies within {} km of a hazard site",
            settings.asset_hazard_distance
        )));
    }

    let models = association
        .associated
        .iter()
        .map(|assoc| asset_models(inputs, &assets[assoc.asset_index]))
        .collect::<Result<Vec<_>>>()?;

    let mut realizations = Vec::with_capacity(inputs.gmfs.gsims.len());
    for (gsim_index, gsim) in inputs.gmfs.gsims.iter().enumerate() {
        info!(
            gsim = %gsim,
            assets = models.len(),
            events = inputs.gmfs.num_events(gsim_index),
            "computing damage"
        );
        let evaluate = |(assoc, models): (&Association, &AssetModels<'_>)| {
            let iml = inputs
                .gmfs
                .site_values(gsim_index, assoc.site_id, models.imt_index);
            evaluate_asset(&assets[assoc.asset_index], assoc.asset_index, &iml, models, settings)
        };
        let outcomes: Vec<AssetOutcome> = if parallel {
            pool.install(|| {
                association
                    .associated
                    .par_iter()
                    .zip(models.par_iter())
                    .map(evaluate)
                    .collect::<Vec<_>>()
            })?
        } else {
            association
                .associated
                .iter()
                .zip(models.iter())
                .map(evaluate)
                .collect()
        };
        realizations.push(RealizationOutcome {
            gsim: gsim.clone(),
            event_ids: inputs.gmfs.event_ids[gsim_index].clone(),
            assets: outcomes,
        });
    }

    Ok(ScenarioOutcome {
        damage_states: fragility.damage_states(),
        loss_types: inputs.loss_types(),
        associations: association.associated,
        discarded_assets,
        realizations,
    })
}

fn asset_models<'a>(inputs: &'a ScenarioInputs, asset: &Asset) -> Result<AssetModels<'a>> {
    let fragility = inputs
        .fragility
        .as_ref()
        .ok_or_else(|| QuakeError::invalid("missing fragility model"))?
        .function_for(&asset.taxonomy)?;
    let imt_index = inputs.gmfs.imt_index(&fragility.imt).ok_or_else(|| {
        QuakeError::invalid(format!(
            "fragility function '{}' needs imt '{}', absent from the ground-motion fields",
            fragility.taxonomy, fragility.imt
        ))
    })?;
    let consequences = inputs
        .consequences
        .iter()
        .map(|(loss_type, model)| {
            let value = asset.value(loss_type).unwrap_or(0.0);
            Ok((model.function_for(&asset.taxonomy)?, value))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(AssetModels {
        fragility,
        imt_index,
        consequences,
    })
}

fn evaluate_asset(
    asset: &Asset,
    asset_index: usize,
    imls: &[f64],
    models: &AssetModels<'_>,
    settings: ScenarioSettings,
) -> AssetOutcome {
    let mut damage = Vec::with_capacity(imls.len());
    let mut losses = vec![Vec::with_capacity(imls.len()); models.consequences.len()];
    let count = if settings.discrete_damage_distribution {
        asset.number.round()
    } else {
        asset.number
    };
    for (event_ordinal, iml) in imls.iter().enumerate() {
        let fractions = damage_fractions(&models.fragility.poes(*iml));
        let buildings = if settings.discrete_damage_distribution {
            let mut rng = Rng::for_asset_event(settings.master_seed, asset_index, event_ordinal);
            rng.multinomial(count as u64, &fractions)
        } else {
            fractions.iter().map(|f| f * count).collect()
        };
        // Consequences follow the building split actually reported.
        let realized_fractions: Vec<f64> = if count > 0.0 {
            buildings.iter().map(|buildings| buildings / count).collect()
        } else {
            fractions
        };
        for ((function, value), per_event) in models.consequences.iter().zip(losses.iter_mut()) {
            per_event.push(function.consequence(&realized_fractions, *value));
        }
        damage.push(buildings);
    }
    AssetOutcome {
        asset_index,
        damage,
        losses,
    }
}
