use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn bin() -> &'static str {
    env!("CARGO_BIN_EXE_quakedmg")
}

fn unique_temp_dir(name: &str) -> PathBuf {
    let stamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock should be after unix epoch")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!("quakedmg-cli-{name}-{stamp}"));
    fs::create_dir_all(&dir).expect("temp dir should be created");
    dir
}

fn write_scenario(dir: &Path, extra: &str) -> PathBuf {
    let files = [
        (
            "exposure.csv",
            "id,lon,lat,taxonomy,number,structural,region\n\
             a1,0.0,0.0,RC,10,100000,north\n\
             a2,0.02,0.0,RC,3,30000,south\n",
        ),
        ("sites.csv", "site_id,lon,lat\n0,0.0,0.0\n1,0.02,0.0\n"),
        (
            "gmf_data.csv",
            "gsim,site_id,event_id,PGA\n\
             GsimA,0,0,0.2\nGsimA,0,1,0.4\nGsimA,1,0,0.3\nGsimA,1,1,0.1\n",
        ),
        (
            "fragility.yaml",
            "id: frag\n\
             limit_states: [slight, complete]\n\
             functions:\n\
             \x20 - taxonomy: RC\n\
             \x20   imt: PGA\n\
             \x20   format: continuous\n\
             \x20   params:\n\
             \x20     - {mean: 0.2, stddev: 0.1}\n\
             \x20     - {mean: 0.5, stddev: 0.2}\n",
        ),
    ];
    for (name, content) in files {
        fs::write(dir.join(name), content).expect("fixture should be written");
    }
    let job = format!(
        "exposure_file: exposure.csv\n\
         sites_file: sites.csv\n\
         gmfs_file: gmf_data.csv\n\
         fragility_file: fragility.yaml\n\
         export_dir: out\n\
         {extra}"
    );
    let path = dir.join("job.yaml");
    fs::write(&path, job).expect("job should be written");
    path
}

#[test]
fn missing_command_prints_usage() {
    let output = Command::new(bin()).output().expect("binary should run");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: quakedmg"));
}

#[test]
fn run_command_requires_a_job_path() {
    let output = Command::new(bin())
        .arg("run")
        .output()
        .expect("run should start");

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("usage: quakedmg run"));
}

#[test]
fn plan_command_lists_outputs_as_json() {
    let dir = unique_temp_dir("plan");
    let job = write_scenario(&dir, "export_aggregates: true\n");

    let output = Command::new(bin())
        .args(["plan", job.to_string_lossy().as_ref()])
        .output()
        .expect("plan should run");

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("plan should emit json");
    let files: Vec<&str> = payload
        .as_array()
        .expect("plan is an array")
        .iter()
        .filter_map(|entry| entry["file_name"].as_str())
        .collect();
    assert_eq!(files, vec!["dmg_by_asset.csv", "dmg_total.csv"]);
    assert!(!dir.join("out").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn run_command_honours_export_dir_override() {
    let dir = unique_temp_dir("run");
    let job = write_scenario(&dir, "");
    let export_dir = dir.join("elsewhere");

    let output = Command::new(bin())
        .args(["run", job.to_string_lossy().as_ref()])
        .env("QUAKEDMG_EXPORT_DIR", &export_dir)
        .output()
        .expect("run should run");

    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let payload: serde_json::Value = serde_json::from_str(&stdout).expect("run should emit json");
    assert_eq!(payload["events"].as_u64(), Some(2));
    assert_eq!(payload["files"].as_array().map(Vec::len), Some(1));
    assert!(export_dir.join("dmg_by_asset.csv").exists());
    assert!(!dir.join("out").exists());

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn validate_command_returns_non_zero_on_invalid_job() {
    let dir = unique_temp_dir("validate");
    let job = write_scenario(&dir, "aggregate_by: [district]\n");

    let output = Command::new(bin())
        .args(["validate", job.to_string_lossy().as_ref()])
        .output()
        .expect("validate should run");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("validation failed"));
    assert!(stderr.contains("district"));

    let _ = fs::remove_dir_all(dir);
}

#[test]
fn hazard_command_writes_curves_per_imt() {
    let dir = unique_temp_dir("hazard");
    let model = dir.join("model.json");
    fs::write(
        &model,
        r#"{
            "imtls": [{"imt": "PGA", "levels": [0.1, 0.2, 0.4]}],
            "truncation_level": 3.0,
            "sites": [1],
            "groups": [{"id": 0, "sources": [{"id": "src", "ruptures": [
                {"rate": 0.01, "investigation_time": 50.0,
                 "sites": [{"site_id": 1, "ground_motion": {"PGA": {"mean": -1.6, "sigma": 0.6}}}]}
            ]}]}]
        }"#,
    )
    .expect("model should be written");
    let csv_dir = dir.join("curves");

    let output = Command::new(bin())
        .args([
            "hazard",
            model.to_string_lossy().as_ref(),
            "--csv",
            csv_dir.to_string_lossy().as_ref(),
        ])
        .output()
        .expect("hazard should run");

    assert_eq!(output.status.code(), Some(0), "{}", String::from_utf8_lossy(&output.stderr));
    let written = fs::read_to_string(csv_dir.join("hazard_curve-PGA.csv")).expect("curve file");
    let mut lines = written.lines();
    assert!(lines.next().is_some_and(|line| line.starts_with("# generated_by=quakedmg")));
    assert_eq!(lines.next(), Some("site_id,poe-0.1,poe-0.2,poe-0.4"));
    assert!(lines.next().is_some_and(|line| line.starts_with("1,")));

    let _ = fs::remove_dir_all(dir);
}
