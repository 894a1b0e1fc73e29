//! Everything a scenario run reads from disk, loaded once.

use tracing::{debug, info};

use crate::config::JobConfig;
use crate::data::consequence::load_consequence_model;
use crate::data::exposure::load_exposure;
use crate::data::fragility::load_fragility_model;
use crate::data::gmf::{load_gmfs, load_sites};
use crate::data::{ConsequenceModel, Exposure, FragilityModel, GroundMotionFields, Site};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ScenarioInputs {
    pub exposure: Exposure,
    pub sites: Vec<Site>,
    pub gmfs: GroundMotionFields,
    pub fragility: Option<FragilityModel>,
    /// Keyed by the loss type named in the job, in job order.
    pub consequences: Vec<(String, ConsequenceModel)>,
}

impl ScenarioInputs {
    pub fn load(job: &JobConfig) -> Result<Self> {
        let exposure = load_exposure(&job.exposure_file)?;
        debug!(path = %job.exposure_file.display(), assets = exposure.len(), "exposure loaded");
        let sites = load_sites(&job.sites_file)?;
        let mut gmfs = load_gmfs(&job.gmfs_file)?;
        if !job.gsims.is_empty() {
            gmfs = gmfs.select_gsims(&job.gsims)?;
        }
        let fragility = job
            .fragility_file
            .as_deref()
            .map(load_fragility_model)
            .transpose()?;
        let consequences = job
            .consequence_files
            .iter()
            .map(|(loss_type, path)| Ok((loss_type.clone(), load_consequence_model(path)?)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            assets = exposure.len(),
            sites = sites.len(),
            events = gmfs.total_events(),
            gsims = gmfs.gsims.len(),
            "scenario inputs loaded"
        );
        Ok(Self {
            exposure,
            sites,
            gmfs,
            fragility,
            consequences,
        })
    }

    pub fn loss_types(&self) -> Vec<String> {
        self.consequences
            .iter()
            .map(|(loss_type, _)| loss_type.clone())
            .collect()
    }
}
