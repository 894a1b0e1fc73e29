use std::collections::HashSet;
use std::fmt;

use serde::Serialize;

use crate::config::JobConfig;
use crate::damage::assoc::associate_assets;
use crate::damage::inputs::ScenarioInputs;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationSeverity {
    Error,
    Warning,
    Info,
}

impl ValidationSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }
}

impl fmt::Display for ValidationSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationDiagnostic {
    pub severity: ValidationSeverity,
    pub context: String,
    pub message: String,
}

impl fmt::Display for ValidationDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.context, self.message)
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub diagnostics: Vec<ValidationDiagnostic>,
}

impl ValidationReport {
    pub fn push(
        &mut self,
        severity: ValidationSeverity,
        context: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.diagnostics.push(ValidationDiagnostic {
            severity,
            context: context.into(),
            message: message.into(),
        });
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    pub fn error_count(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|diag| diag.severity == ValidationSeverity::Error)
            .count()
    }
}

/// Check a loaded job for problems that would make outputs wrong or missing.
pub fn validate_job(job: &JobConfig, inputs: &ScenarioInputs) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_models(job, inputs, &mut report);
    validate_exposure(job, inputs, &mut report);
    validate_hazard(job, inputs, &mut report);
    report.diagnostics.sort_by_key(|diag| diag.severity);
    report
}

fn validate_models(job: &JobConfig, inputs: &ScenarioInputs, report: &mut ValidationReport) {
    use ValidationSeverity::{Error, Warning};

    if !job.has_fragility() && !job.has_consequences() {
        report.push(
            Error,
            "job",
            "neither a fragility model nor a consequence model is configured; nothing would be exported",
        );
    }
    if job.has_consequences() && !job.has_fragility() {
        report.push(
            Error,
            "consequence_files",
            "consequence models need a fragility model to provide damage distributions",
        );
    }

    let taxonomies = inputs.exposure.taxonomies();
    if let Some(fragility) = &inputs.fragility {
        for problem in fragility.problems() {
            report.push(Error, "fragility_file", problem);
        }
        for taxonomy in &taxonomies {
            match fragility.function_for(taxonomy) {
                Ok(function) if inputs.gmfs.imt_index(&function.imt).is_none() => report.push(
                    Error,
                    "fragility_file",
                    format!(
                        "taxonomy '{taxonomy}' uses imt '{}', which the ground-motion fields do not provide",
                        function.imt
                    ),
                ),
                Ok(_) => {}
                Err(err) => report.push(Error, "fragility_file", err.to_string()),
            }
        }
    }

    let limit_states = inputs
        .fragility
        .as_ref()
        .map(|fragility| fragility.limit_states.as_slice());
    for (loss_type, model) in &inputs.consequences {
        let context = format!("consequence_files.{loss_type}");
        if model.loss_type != *loss_type {
            report.push(
                Error,
                context.clone(),
                format!(
                    "model '{}' is for loss type '{}', configured as '{loss_type}'",
                    model.id, model.loss_type
                ),
            );
        }
        for problem in model.problems(limit_states) {
            report.push(Error, context.clone(), problem);
        }
        for taxonomy in &taxonomies {
            if let Err(err) = model.function_for(taxonomy) {
                report.push(Error, context.clone(), err.to_string());
            }
        }
        let without_value = inputs
            .exposure
            .assets
            .iter()
            .filter(|asset| asset.value(loss_type).is_none())
            .count();
        if without_value > 0 {
            report.push(
                Warning,
                context,
                format!("{without_value} asset(s) have no '{loss_type}' value; their consequences are zero"),
            );
        }
    }
}

fn validate_exposure(job: &JobConfig, inputs: &ScenarioInputs, report: &mut ValidationReport) {
    use ValidationSeverity::{Error, Info, Warning};

    if inputs.exposure.is_empty() {
        report.push(Error, "exposure_file", "exposure has no assets");
    }
    for tag in &job.aggregate_by {
        if !inputs.exposure.tag_names.contains(tag) {
            report.push(
                Error,
                "aggregate_by",
                format!("tag '{tag}' is not a column of the exposure"),
            );
        }
    }
    if job.export_aggregates && job.aggregate_by.is_empty() {
        report.push(
            Info,
            "aggregate_by",
            "no tags to aggregate by; only portfolio totals will be exported",
        );
    }
    if job.discrete_damage_distribution {
        let fractional = inputs
            .exposure
            .assets
            .iter()
            .filter(|asset| asset.number.fract() != 0.0)
            .count();
        if fractional > 0 {
            report.push(
                Warning,
                "discrete_damage_distribution",
                format!("{fractional} asset(s) have a fractional number of buildings; it will be rounded"),
            );
        }
    }
}

fn validate_hazard(job: &JobConfig, inputs: &ScenarioInputs, report: &mut ValidationReport) {
    use ValidationSeverity::{Error, Warning};

    if job.asset_hazard_distance <= 0.0 {
        report.push(
            Error,
            "asset_hazard_distance",
            "must be a positive distance in km",
        );
    }
    let mut seen = HashSet::new();
    for gsim in &job.gsims {
        if !seen.insert(gsim) {
            report.push(Error, "gsims", format!("gsim '{gsim}' is listed twice"));
        }
    }
    if inputs.gmfs.total_events() == 0 {
        report.push(Error, "gmfs_file", "ground-motion fields contain no events");
    }
    if inputs.sites.is_empty() {
        report.push(Error, "sites_file", "no hazard sites");
        return;
    }

    let association = associate_assets(
        &inputs.exposure.assets,
        &inputs.sites,
        job.asset_hazard_distance,
    );
    if association.associated.is_empty() && !inputs.exposure.is_empty() {
        report.push(
            Error,
            "asset_hazard_distance",
            format!(
                "no asset lies within {} km of a hazard site",
                job.asset_hazard_distance
            ),
        );
    } else if !association.discarded.is_empty() {
        report.push(
            Warning,
            "asset_hazard_distance",
            format!(
                "{} asset(s) are farther than {} km from every hazard site and will be discarded",
                association.discarded.len(),
                job.asset_hazard_distance
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::Path;

    use super::*;
    use crate::data::fragility::LognormalParams;
    use crate::data::gmf::GmfRow;
    use crate::data::{
        Asset, ConsequenceFunction, ConsequenceModel, DamageFunction, Exposure,
        FragilityFunctionSet, FragilityModel, GroundMotionFields, Site,
    };

    fn job(extra: &str) -> JobConfig {
        let raw = format!(
            "exposure_file: exposure.csv\nsites_file: sites.csv\ngmfs_file: gmfs.csv\n{extra}"
        );
        JobConfig::from_yaml(&raw, Path::new("job.yaml")).expect("job yaml should parse")
    }

    fn inputs(asset_lon: f64, fragility_imt: &str, consequence_loss_type: &str) -> ScenarioInputs {
        let exposure = Exposure {
            assets: vec![Asset {
                id: "a1".to_string(),
                taxonomy: "RC".to_string(),
                lon: asset_lon,
                lat: 0.0,
                number: 2.0,
                values: BTreeMap::from([("structural".to_string(), 500.0)]),
                tags: BTreeMap::new(),
            }],
            tag_names: Vec::new(),
        };
        let gmfs = GroundMotionFields::from_rows(
            vec!["PGA".to_string()],
            vec![GmfRow {
                gsim: "GsimA".to_string(),
                site_id: 1,
                event_id: 0,
                values: vec![0.3],
            }],
        )
        .expect("gmf rows are consistent");
        let fragility = FragilityModel {
            id: "frag".to_string(),
            loss_type: "structural".to_string(),
            limit_states: vec!["slight".to_string()],
            functions: vec![FragilityFunctionSet {
                taxonomy: "RC".to_string(),
                imt: fragility_imt.to_string(),
                no_damage_limit: None,
                shape: DamageFunction::Continuous {
                    min_iml: None,
                    max_iml: None,
                    params: vec![LognormalParams { mean: 0.2, stddev: 0.1 }],
                },
            }],
        };
        let consequence = ConsequenceModel {
            id: "cons".to_string(),
            loss_type: consequence_loss_type.to_string(),
            limit_states: vec!["slight".to_string()],
            functions: vec![ConsequenceFunction {
                taxonomy: "RC".to_string(),
                params: vec![0.4],
            }],
        };
        ScenarioInputs {
            exposure,
            sites: vec![Site { id: 1, lon: 0.0, lat: 0.0 }],
            gmfs,
            fragility: Some(fragility),
            consequences: vec![("structural".to_string(), consequence)],
        }
    }

    fn consistent_inputs() -> ScenarioInputs {
        inputs(0.0, "PGA", "structural")
    }

    fn errors(report: &ValidationReport) -> Vec<(&str, &str)> {
        report
            .diagnostics
            .iter()
            .filter(|diag| diag.severity == ValidationSeverity::Error)
            .map(|diag| (diag.context.as_str(), diag.message.as_str()))
            .collect()
    }

    #[test]
    fn consistent_job_has_no_errors() {
        let job = job("fragility_file: frag.json\nconsequence_files:\n  structural: cons.json\n");
        let report = validate_job(&job, &consistent_inputs());
        assert!(!report.has_errors(), "{:?}", report.diagnostics);
    }

    #[test]
    fn job_without_any_model_is_rejected() {
        let report = validate_job(&job(""), &consistent_inputs());
        let errors = errors(&report);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].0, "job");
        assert!(errors[0].1.starts_with("neither a fragility model nor a consequence model"));
    }

    #[test]
    fn consequences_without_fragility_are_rejected() {
        let job = job("consequence_files:\n  structural: cons.json\n");
        let report = validate_job(&job, &consistent_inputs());
        assert!(errors(&report).iter().any(|(context, message)| {
            *context == "consequence_files" && message.contains("need a fragility model")
        }));
        assert!(errors(&report).iter().all(|(context, _)| *context != "job"));
    }

    #[test]
    fn fragility_imt_missing_from_gmfs_is_rejected() {
        let job = job("fragility_file: frag.json\n");
        let report = validate_job(&job, &inputs(0.0, "SA(0.3)", "structural"));
        let errors = errors(&report);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].0, "fragility_file");
        assert!(errors[0].1.contains("imt 'SA(0.3)'"), "{}", errors[0].1);
    }

    #[test]
    fn consequence_loss_type_must_match_its_key() {
        let job = job("fragility_file: frag.json\nconsequence_files:\n  structural: cons.json\n");
        let report = validate_job(&job, &inputs(0.0, "PGA", "contents"));
        let errors = errors(&report);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].0, "consequence_files.structural");
        assert_eq!(
            errors[0].1,
            "model 'cons' is for loss type 'contents', configured as 'structural'"
        );
    }

    #[test]
    fn no_asset_within_distance_is_rejected() {
        let job = job("fragility_file: frag.json\nasset_hazard_distance: 5.0\n");
        let report = validate_job(&job, &inputs(1.0, "PGA", "structural"));
        let errors = errors(&report);
        assert_eq!(errors.len(), 1, "{errors:?}");
        assert_eq!(errors[0].0, "asset_hazard_distance");
        assert_eq!(errors[0].1, "no asset lies within 5 km of a hazard site");
    }

    #[test]
    fn gsim_listed_twice_is_rejected() {
        let job = job("fragility_file: frag.json\ngsims: [GsimA, GsimA]\n");
        let report = validate_job(&job, &consistent_inputs());
        let errors = errors(&report);
        assert_eq!(errors, vec![("gsims", "gsim 'GsimA' is listed twice")]);
    }

    #[test]
    fn diagnostics_are_sorted_by_severity() {
        let job = job("fragility_file: frag.json\nexport_aggregates: true\ngsims: [GsimA, GsimA]\n");
        let report = validate_job(&job, &consistent_inputs());
        let severities: Vec<_> = report.diagnostics.iter().map(|diag| diag.severity).collect();
        assert_eq!(severities, vec![ValidationSeverity::Error, ValidationSeverity::Info]);
    }
}
