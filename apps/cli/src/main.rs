#![deny(warnings)]

//! Headless runner: builds an economy from a YAML config (or the benchmark
//! parameters), steps it and writes the collected tables as JSON.

use anyhow::{Context, Result};
use econ_core::SimConfig;
use econ_runtime::Simulation;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STEPS: u64 = 100;

#[derive(Debug, Default)]
struct Args {
    config: Option<String>,
    steps: Option<u64>,
    seed: Option<u64>,
    shuffle: bool,
    out: Option<String>,
}

fn parse_args() -> Args {
    let mut args = Args::default();
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config" => args.config = it.next(),
            "--steps" => args.steps = it.next().and_then(|s| s.parse().ok()),
            "--seed" => args.seed = it.next().and_then(|s| s.parse().ok()),
            "--shuffle" => args.shuffle = true,
            "--out" => args.out = it.next(),
            _ => {}
        }
    }
    args
}

fn load_config(args: &Args) -> Result<SimConfig> {
    let mut config = match &args.config {
        Some(path) => SimConfig::from_file(path)
            .with_context(|| format!("loading config from {path}"))?,
        None => SimConfig::benchmark(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    config.shuffle |= args.shuffle;
    Ok(config)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = parse_args();
    info!(?args, "starting CLI");

    let config = load_config(&args)?;
    let steps = args.steps.unwrap_or(DEFAULT_STEPS);
    let mut sim = Simulation::from_config(&config)?;
    let report = sim.run(steps);
    if let Some(fault) = &report.fault {
        warn!(%fault, completed = report.completed, "run ended on a fault");
    }

    let population = sim.economy().population();
    println!(
        "Economy | consumption firms: {} | capital firms: {} | seed: {}",
        config.parameters.n_consumption_firms,
        config.parameters.n_capital_firms,
        config.seed
    );
    if let Some(last) = sim.sink().last_macro_record() {
        println!(
            "KPI | steps: {} | gdp: {} | wage: {} | cpi: {} | unemployment: {} | investment: {} | live firms: {}",
            last.step,
            last.gdp,
            last.market_wage,
            last.cpi,
            last.unemployment,
            last.investment,
            population.len()
        );
    }

    if let Some(out) = &args.out {
        let json = sim.sink().to_json()?;
        std::fs::write(out, json).with_context(|| format!("writing results to {out}"))?;
        info!(path = %out, rows = sim.sink().firm_row_count(), "results written");
    }

    match report.fault {
        Some(fault) => Err::<(), _>(fault).context(format!("stopped early after {} steps", report.completed)),
        None => Ok(()),
    }
}
