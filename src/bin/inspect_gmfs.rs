//! Summarize a ground-motion field file: GSIMs, events, sites and IMT ranges.
//! Run: cargo run --bin inspect_gmfs -- <gmf_data.csv>

use std::path::Path;

use quakedmg::data::gmf::load_gmfs;
use quakedmg::stats::mean;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: inspect_gmfs <gmf_data.csv>");
        std::process::exit(2);
    };
    let gmfs = load_gmfs(Path::new(&path))?;

    println!(
        "{}: {} gsim(s), {} event(s), imts [{}]",
        path,
        gmfs.gsims.len(),
        gmfs.total_events(),
        gmfs.imts.join(", ")
    );
    for (gsim_index, gsim) in gmfs.gsims.iter().enumerate() {
        let sites = gmfs.site_ids(gsim_index);
        println!(
            "  {gsim}: {} event(s), {} site(s)",
            gmfs.num_events(gsim_index),
            sites.len()
        );
        for (imt_index, imt) in gmfs.imts.iter().enumerate() {
            let values: Vec<f64> = sites
                .iter()
                .flat_map(|site_id| gmfs.site_values(gsim_index, *site_id, imt_index))
                .collect();
            if values.is_empty() {
                continue;
            }
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            println!(
                "    {imt}: min={min:.6} mean={:.6} max={max:.6}",
                mean(&values)
            );
        }
    }
    Ok(())
}
