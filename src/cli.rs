use std::path::Path;

use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::config::{load_job, validate_job};
use crate::damage::ScenarioInputs;
use crate::export::ExportContext;
use crate::hazard::{calc_hazard_curves, load_hazard_model, write_hazard_curves};
use crate::job::{plan_job, run_job};
use crate::parallel::WorkerPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    Plan,
    Validate,
    Hazard,
}

pub fn parse_command(args: &[String]) -> Option<Command> {
    match args.get(1).map(String::as_str) {
        Some("run") => Some(Command::Run),
        Some("plan") => Some(Command::Plan),
        Some("validate") => Some(Command::Validate),
        Some("hazard") => Some(Command::Hazard),
        _ => None,
    }
}

/// Log to stderr, filtered by `RUST_LOG` (default `info`). Safe to call twice.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run_with_args(args: &[String]) -> i32 {
    match parse_command(args) {
        Some(Command::Run) => handle_run(args),
        Some(Command::Plan) => handle_plan(args),
        Some(Command::Validate) => handle_validate(args),
        Some(Command::Hazard) => handle_hazard(args),
        None => {
            eprintln!("usage: quakedmg <run|plan|validate|hazard> ...");
            2
        }
    }
}

fn print_json<T: Serialize>(value: &T, what: &str) -> i32 {
    match serde_json::to_string_pretty(value) {
        Ok(payload) => {
            println!("{payload}");
            0
        }
        Err(err) => {
            eprintln!("failed to serialize {what}: {err}");
            1
        }
    }
}

fn job_path<'a>(args: &'a [String], command: &str) -> Option<&'a Path> {
    let path = args.get(2).map(Path::new);
    if path.is_none() {
        eprintln!("usage: quakedmg {command} <job.yaml>");
    }
    path
}

fn handle_run(args: &[String]) -> i32 {
    let Some(path) = job_path(args, "run") else {
        return 2;
    };
    let summary = load_job(path).and_then(|job| run_job(&job));
    match summary {
        Ok(summary) => print_json(&summary, "run summary"),
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn handle_plan(args: &[String]) -> i32 {
    let Some(path) = job_path(args, "plan") else {
        return 2;
    };
    let planned = load_job(path).and_then(|job| {
        let inputs = ScenarioInputs::load(&job)?;
        Ok(plan_job(&job, &inputs))
    });
    match planned {
        Ok(planned) => print_json(&planned, "output plan"),
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn handle_validate(args: &[String]) -> i32 {
    let Some(path) = job_path(args, "validate") else {
        return 2;
    };
    let report = load_job(path).and_then(|job| {
        let inputs = ScenarioInputs::load(&job)?;
        Ok(validate_job(&job, &inputs))
    });
    match report {
        Ok(report) => {
            for diag in &report.diagnostics {
                eprintln!("- {diag}");
            }
            let code = print_json(&report, "validation report");
            if report.has_errors() {
                eprintln!("validation failed: {} error(s)", report.error_count());
                1
            } else {
                code
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

fn handle_hazard(args: &[String]) -> i32 {
    let Some(path) = args.get(2).map(Path::new) else {
        eprintln!("usage: quakedmg hazard <model.json> [--csv <dir>] [--workers <n>]");
        return 2;
    };
    let csv_dir = flag_value(args, "--csv");
    let workers = parse_usize_arg(flag_value(args, "--workers"), "workers", 0);

    let curves = load_hazard_model(path)
        .and_then(|model| calc_hazard_curves(&model, &WorkerPool::with_workers(workers)));
    let curves = match curves {
        Ok(curves) => curves,
        Err(err) => {
            eprintln!("error: {err}");
            return 1;
        }
    };
    match csv_dir {
        Some(dir) => match write_hazard_curves(Path::new(dir), &curves, &ExportContext::new()) {
            Ok(paths) => print_json(&paths, "written files"),
            Err(err) => {
                eprintln!("error: {err}");
                1
            }
        },
        None => print_json(&curves, "hazard curves"),
    }
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a String> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|index| args.get(index + 1))
}

fn parse_usize_arg(raw: Option<&String>, name: &str, default: usize) -> usize {
    raw.and_then(|value| value.parse::<usize>().ok())
        .unwrap_or_else(|| {
            if let Some(value) = raw {
                eprintln!("invalid {name} '{value}', defaulting to {default}");
            }
            default
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|arg| arg.to_string()).collect()
    }

    #[test]
    fn parses_known_commands() {
        assert_eq!(parse_command(&args(&["quakedmg", "run", "job.yaml"])), Some(Command::Run));
        assert_eq!(parse_command(&args(&["quakedmg", "hazard"])), Some(Command::Hazard));
        assert_eq!(parse_command(&args(&["quakedmg", "serve"])), None);
        assert_eq!(parse_command(&args(&["quakedmg"])), None);
    }

    #[test]
    fn unknown_command_is_a_usage_error() {
        assert_eq!(run_with_args(&args(&["quakedmg", "nope"])), 2);
        assert_eq!(run_with_args(&args(&["quakedmg", "run"])), 2);
    }

    #[test]
    fn flags_read_the_following_argument() {
        let argv = args(&["quakedmg", "hazard", "m.json", "--workers", "3", "--csv"]);
        assert_eq!(parse_usize_arg(flag_value(&argv, "--workers"), "workers", 0), 3);
        assert_eq!(flag_value(&argv, "--csv"), None);
        assert_eq!(parse_usize_arg(Some(&"x".to_string()), "workers", 5), 5);
    }
}
