use std::{env, path::PathBuf};

use anyhow::Result;
use clap::Parser;
use log::info;

use ballista::config::SimulationConfig;
use ballista::montecarlo::{MonteCarloRunner, WindSweep};

/// Wind-sweep Monte Carlo over a single flight configuration.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Simulation config file (TOML)
    config: PathBuf,

    /// Wind speed range as start:end:step [m/s]
    #[arg(short, long, default_value = "0:8:1")]
    speeds: String,

    /// Number of wind directions, evenly spaced over 360 degrees
    #[arg(short, long, default_value_t = 8)]
    directions: usize,

    /// Uniform jitter amplitude on wind speed [m/s]
    #[arg(long, default_value_t = 0.0)]
    speed_jitter: f64,

    /// Uniform jitter amplitude on wind direction [deg]
    #[arg(long, default_value_t = 0.0)]
    direction_jitter: f64,

    /// Worker threads, defaults to the available parallelism
    #[arg(short = 'j', long)]
    workers: Option<usize>,

    /// Output directory
    #[arg(short, long, default_value = "out/montecarlo")]
    out_dir: PathBuf,
}

fn parse_speed_range(s: &str) -> Result<(f64, f64, f64)> {
    let parts: Vec<&str> = s.split(':').collect();
    anyhow::ensure!(
        parts.len() == 3,
        "speed range must be start:end:step, got '{s}'"
    );
    Ok((parts[0].parse()?, parts[1].parse()?, parts[2].parse()?))
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }
    pretty_env_logger::init();

    let args = Args::parse();
    let (start, end, step) = parse_speed_range(&args.speeds)?;

    let mut sweep = WindSweep::regular(start, end, step, args.directions);
    sweep.speed_jitter_m_s = args.speed_jitter;
    sweep.direction_jitter_deg = args.direction_jitter;

    info!("reading config from '{}'", args.config.display());
    let config = SimulationConfig::from_file(&args.config)?;

    std::fs::create_dir_all(&args.out_dir)?;
    let runner = MonteCarloRunner::new(config, sweep, args.workers, args.out_dir.clone())?;
    let summary = runner.run_blocking()?;

    info!(
        "done: {} runs, results in '{}'",
        summary.runs,
        args.out_dir.display()
    );
    Ok(())
}
