use std::env;

use quakedmg::cli;

fn main() {
    cli::init_tracing();
    let args: Vec<String> = env::args().collect();
    std::process::exit(cli::run_with_args(&args));
}
