//! End-to-end job execution: load, validate, compute, export.

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{validate_job, JobConfig, ValidationReport, ValidationSeverity};
use crate::damage::aggregate::{mean_damaged, total_damage};
use crate::damage::{run_scenario, RealizationOutcome, ScenarioInputs, ScenarioSettings};
use crate::error::{QuakeError, Result};
use crate::export::{
    export_outputs, plan_outputs, ExportContext, ExportedFile, OutputConditions, PlannedOutput,
};
use crate::parallel::WorkerPool;

#[derive(Debug, Clone, Serialize)]
pub struct RealizationSummary {
    pub gsim: String,
    pub events: usize,
    /// Mean number of buildings in any damage state above `no_damage`.
    pub mean_damaged_buildings: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub calc_id: String,
    pub description: String,
    /// Events over every realization.
    pub events: usize,
    pub assets: usize,
    pub discarded_assets: Vec<String>,
    pub realizations: Vec<RealizationSummary>,
    pub files: Vec<ExportedFile>,
}

/// Outputs the job would write, without computing anything.
pub fn plan_job(job: &JobConfig, inputs: &ScenarioInputs) -> Vec<PlannedOutput> {
    plan_outputs(OutputConditions::from_job(job), &inputs.gmfs.gsims)
}

fn log_diagnostics(report: &ValidationReport) {
    for diag in &report.diagnostics {
        match diag.severity {
            ValidationSeverity::Error => {
                error!(context = %diag.context, "{}", diag.message)
            }
            ValidationSeverity::Warning => {
                warn!(context = %diag.context, "{}", diag.message)
            }
            ValidationSeverity::Info => {
                info!(context = %diag.context, "{}", diag.message)
            }
        }
    }
}

/// Load inputs and validate. Errors in the report abort with [QuakeError::InvalidJob].
pub fn prepare_job(job: &JobConfig) -> Result<(ScenarioInputs, ValidationReport)> {
    let inputs = ScenarioInputs::load(job)?;
    let report = validate_job(job, &inputs);
    log_diagnostics(&report);
    if report.has_errors() {
        return Err(QuakeError::InvalidJob(report.error_count()));
    }
    Ok((inputs, report))
}

pub fn run_job(job: &JobConfig) -> Result<RunSummary> {
    let (inputs, _) = prepare_job(job)?;
    let plan = plan_job(job, &inputs);
    let context = ExportContext::new();
    info!(calc_id = %context.calc_id, outputs = plan.len(), "starting scenario damage");

    let outcome = run_scenario(
        &inputs,
        ScenarioSettings::from_job(job),
        &WorkerPool::with_workers(job.workers),
    )?;
    let files = export_outputs(
        &job.export_dir,
        &plan,
        &outcome,
        &inputs.exposure,
        &job.aggregate_by,
        &context,
    )?;

    let realizations = outcome
        .realizations
        .iter()
        .map(|realization| RealizationSummary {
            gsim: realization.gsim.clone(),
            events: realization.num_events(),
            mean_damaged_buildings: mean_damaged(&total_damage(&outcome, realization)),
        })
        .collect();
    Ok(RunSummary {
        calc_id: context.calc_id.to_string(),
        description: job.description.clone(),
        events: outcome
            .realizations
            .iter()
            .map(RealizationOutcome::num_events)
            .sum(),
        assets: outcome.associations.len(),
        discarded_assets: outcome.discarded_assets,
        realizations,
        files,
    })
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Ok(mut inner) = self.0.lock() {
                inner.extend_from_slice(buf);
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn diagnostics_log_at_their_severity() {
        let mut report = ValidationReport::default();
        report.push(ValidationSeverity::Error, "gsims", "listed twice");
        report.push(ValidationSeverity::Warning, "exposure_file", "assets discarded");
        report.push(ValidationSeverity::Info, "aggregate_by", "totals only");

        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .without_time()
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, || log_diagnostics(&report));

        let output = String::from_utf8(captured.0.lock().expect("log buffer").clone())
            .expect("utf-8 log output");
        let level_of = |message: &str| {
            output
                .lines()
                .find(|line| line.contains(message))
                .and_then(|line| line.split_whitespace().next())
                .map(str::to_string)
        };
        assert_eq!(level_of("listed twice").as_deref(), Some("ERROR"));
        assert_eq!(level_of("assets discarded").as_deref(), Some("WARN"));
        assert_eq!(level_of("totals only").as_deref(), Some("INFO"));
    }
}
