//! Compare sequential vs parallel scenario damage run times.
//!
//! Run with: `cargo bench --bench scenario`

use std::collections::BTreeMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use quakedmg::damage::{run_scenario, run_scenario_sequential, ScenarioInputs, ScenarioSettings};
use quakedmg::data::fragility::LognormalParams;
use quakedmg::data::gmf::GmfRow;
use quakedmg::data::{
    Asset, DamageFunction, Exposure, FragilityFunctionSet, FragilityModel, GroundMotionFields,
    Site,
};
use quakedmg::parallel::WorkerPool;

/// Synthetic grid of assets and sites so the bench needs no input files.
fn synthetic_inputs(num_assets: usize, num_sites: u32, num_events: u64) -> ScenarioInputs {
    let sites: Vec<Site> = (0..num_sites)
        .map(|id| Site {
            id,
            lon: 0.01 * id as f64,
            lat: 0.0,
        })
        .collect();
    let assets = (0..num_assets)
        .map(|i| Asset {
            id: format!("a{i}"),
            taxonomy: "RC".to_string(),
            lon: 0.01 * (i % num_sites as usize) as f64 + 0.001,
            lat: 0.001,
            number: 5.0,
            values: BTreeMap::from([("structural".to_string(), 5000.0)]),
            tags: BTreeMap::new(),
        })
        .collect();
    let rows = sites
        .iter()
        .flat_map(|site| {
            (0..num_events).map(move |event_id| GmfRow {
                gsim: "BooreAtkinson2008".to_string(),
                site_id: site.id,
                event_id,
                values: vec![0.05 + 0.01 * ((event_id + site.id as u64) % 40) as f64],
            })
        })
        .collect();
    let fragility = FragilityModel {
        id: "bench".to_string(),
        loss_type: "structural".to_string(),
        limit_states: vec!["slight".into(), "moderate".into(), "complete".into()],
        functions: vec![FragilityFunctionSet {
            taxonomy: "RC".to_string(),
            imt: "PGA".to_string(),
            no_damage_limit: None,
            shape: DamageFunction::Continuous {
                min_iml: None,
                max_iml: None,
                params: vec![
                    LognormalParams { mean: 0.15, stddev: 0.08 },
                    LognormalParams { mean: 0.3, stddev: 0.15 },
                    LognormalParams { mean: 0.6, stddev: 0.3 },
                ],
            },
        }],
    };
    ScenarioInputs {
        exposure: Exposure {
            assets,
            tag_names: Vec::new(),
        },
        sites,
        gmfs: GroundMotionFields::from_rows(vec!["PGA".to_string()], rows)
            .expect("synthetic gmf rows are consistent"),
        fragility: Some(fragility),
        consequences: Vec::new(),
    }
}

fn bench_scenario_sequential_vs_parallel(c: &mut Criterion) {
    let inputs = synthetic_inputs(2_000, 50, 200);
    let settings = ScenarioSettings {
        asset_hazard_distance: 15.0,
        discrete_damage_distribution: false,
        master_seed: 42,
    };
    let pool = WorkerPool::default();

    let mut group = c.benchmark_group("scenario_damage");
    group.sample_size(20);
    group.measurement_time(std::time::Duration::from_secs(10));

    group.bench_function("sequential", |b| {
        b.iter(|| black_box(run_scenario_sequential(&inputs, settings)))
    });

    group.bench_function("parallel", |b| {
        b.iter(|| black_box(run_scenario(&inputs, settings, &pool)))
    });

    group.finish();
}

criterion_group!(benches, bench_scenario_sequential_vs_parallel);
criterion_main!(benches);
