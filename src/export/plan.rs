//! Which report files a job produces.
//!
//! | output            | produced when                                  |
//! |-------------------|------------------------------------------------|
//! | `dmg_by_asset`    | fragility model configured                     |
//! | `dmg_by_tag`      | fragility model, aggregates and `aggregate_by` |
//! | `dmg_total`       | fragility model and aggregates                 |
//! | `losses_by_asset` | consequence model configured                   |
//! | `losses_by_tag`   | consequence model, aggregates and `aggregate_by` |
//! | `losses_total`    | consequence model and aggregates               |
//!
//! With more than one GSIM every file name carries the GSIM as a suffix.

use std::fmt;

use serde::Serialize;

use crate::config::JobConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    DmgByAsset,
    DmgByTag,
    DmgTotal,
    LossesByAsset,
    LossesByTag,
    LossesTotal,
}

impl OutputKind {
    pub const ALL: [OutputKind; 6] = [
        OutputKind::DmgByAsset,
        OutputKind::DmgByTag,
        OutputKind::DmgTotal,
        OutputKind::LossesByAsset,
        OutputKind::LossesByTag,
        OutputKind::LossesTotal,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::DmgByAsset => "dmg_by_asset",
            Self::DmgByTag => "dmg_by_tag",
            Self::DmgTotal => "dmg_total",
            Self::LossesByAsset => "losses_by_asset",
            Self::LossesByTag => "losses_by_tag",
            Self::LossesTotal => "losses_total",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::DmgByAsset => "Average Asset Damages",
            Self::DmgByTag => "Average Damages By Tag",
            Self::DmgTotal => "Total Damages",
            Self::LossesByAsset => "Average Asset Losses",
            Self::LossesByTag => "Average Losses By Tag",
            Self::LossesTotal => "Total Losses",
        }
    }

    pub fn is_damage(&self) -> bool {
        matches!(self, Self::DmgByAsset | Self::DmgByTag | Self::DmgTotal)
    }

    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Self::DmgByAsset | Self::LossesByAsset)
    }

    pub fn is_by_tag(&self) -> bool {
        matches!(self, Self::DmgByTag | Self::LossesByTag)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The configuration facts that decide which outputs exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputConditions {
    pub fragility: bool,
    pub consequences: bool,
    pub aggregates: bool,
    pub tags: bool,
}

impl OutputConditions {
    pub fn from_job(job: &JobConfig) -> Self {
        Self {
            fragility: job.has_fragility(),
            // Consequences are derived from damage; without fragility there is nothing to weigh.
            consequences: job.has_consequences() && job.has_fragility(),
            aggregates: job.export_aggregates,
            tags: !job.aggregate_by.is_empty(),
        }
    }

    pub fn produces(&self, kind: OutputKind) -> bool {
        let family = if kind.is_damage() {
            self.fragility
        } else {
            self.consequences
        };
        if !family {
            return false;
        }
        if !kind.is_aggregate() {
            return true;
        }
        self.aggregates && (!kind.is_by_tag() || self.tags)
    }

    pub fn kinds(&self) -> Vec<OutputKind> {
        OutputKind::ALL
            .into_iter()
            .filter(|kind| self.produces(*kind))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedOutput {
    pub kind: OutputKind,
    pub title: &'static str,
    pub gsim: String,
    pub file_name: String,
}

/// One file set per GSIM, in GSIM order then output order.
pub fn plan_outputs(conditions: OutputConditions, gsims: &[String]) -> Vec<PlannedOutput> {
    let kinds = conditions.kinds();
    let suffixed = gsims.len() > 1;
    gsims
        .iter()
        .flat_map(|gsim| {
            kinds.iter().map(move |kind| PlannedOutput {
                kind: *kind,
                title: kind.title(),
                gsim: gsim.clone(),
                file_name: file_name(*kind, gsim, suffixed),
            })
        })
        .collect()
}

pub fn file_name(kind: OutputKind, gsim: &str, suffixed: bool) -> String {
    if suffixed {
        format!("{}_{}.csv", kind.name(), sanitize(gsim))
    } else {
        format!("{}.csv", kind.name())
    }
}

/// Keep GSIM names file-system friendly: `[A-Za-z0-9._-]`, anything else becomes `_`.
fn sanitize(gsim: &str) -> String {
    gsim.chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conditions(fragility: bool, consequences: bool, aggregates: bool, tags: bool) -> OutputConditions {
        OutputConditions {
            fragility,
            consequences,
            aggregates,
            tags,
        }
    }

    #[test]
    fn fragility_alone_gives_asset_damages() {
        assert_eq!(
            conditions(true, false, false, true).kinds(),
            vec![OutputKind::DmgByAsset]
        );
    }

    #[test]
    fn consequences_add_asset_losses() {
        assert_eq!(
            conditions(true, true, false, false).kinds(),
            vec![OutputKind::DmgByAsset, OutputKind::LossesByAsset]
        );
    }

    #[test]
    fn aggregates_add_tag_and_total_files() {
        assert_eq!(conditions(true, true, true, true).kinds(), OutputKind::ALL.to_vec());
        assert_eq!(
            conditions(true, false, true, false).kinds(),
            vec![OutputKind::DmgByAsset, OutputKind::DmgTotal]
        );
    }

    #[test]
    fn nothing_without_models() {
        assert!(conditions(false, false, true, true).kinds().is_empty());
        assert!(conditions(false, true, true, true)
            .kinds()
            .iter()
            .all(|kind| !kind.is_damage()));
    }

    #[test]
    fn single_gsim_keeps_plain_names() {
        let plan = plan_outputs(conditions(true, false, false, false), &["BooreAtkinson2008".to_string()]);
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].file_name, "dmg_by_asset.csv");
        assert_eq!(plan[0].title, "Average Asset Damages");
    }

    #[test]
    fn multiple_gsims_duplicate_the_file_set() {
        let gsims = vec!["BooreAtkinson2008".to_string(), "[ChiouYoungs2014]".to_string()];
        let plan = plan_outputs(conditions(true, true, false, false), &gsims);
        let names: Vec<&str> = plan.iter().map(|p| p.file_name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "dmg_by_asset_BooreAtkinson2008.csv",
                "losses_by_asset_BooreAtkinson2008.csv",
                "dmg_by_asset__ChiouYoungs2014_.csv",
                "losses_by_asset__ChiouYoungs2014_.csv",
            ]
        );
    }
}
