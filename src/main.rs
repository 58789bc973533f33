use std::{
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use ballista::config::SimulationConfig;
use ballista::sim::events::FlightMilestone;
use ballista::sim::solver::TrajectoryResult;

/// Six degree of freedom flight simulator for high-power rockets.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Simulation config file (TOML)
    config: PathBuf,

    /// Output directory
    #[arg(short, long, default_value = "out")]
    out_dir: PathBuf,
}

fn main() -> Result<()> {
    // Default log level to "info"
    if env::var("RUST_LOG").is_err() {
        unsafe { env::set_var("RUST_LOG", "info") }
    }
    pretty_env_logger::init();

    let args = Args::parse();

    info!("reading config from '{}'", args.config.display());
    let config = SimulationConfig::from_file(&args.config)?;
    let setup = config.build()?;

    info!(
        "engine: {:.1} Ns total impulse, {:.1} N peak, burn {:.2} s",
        setup.engine().impulse_total(),
        setup.engine().max_thrust(),
        setup.engine().cutoff_time()
    );

    let trajectory = setup.fly();

    if !trajectory.is_complete() {
        warn!("time grid exhausted before landing; results are incomplete");
    }
    if let Some(apogee) = trajectory.max_altitude_m() {
        info!("apogee: {apogee:.1} m");
    }
    if let Some(mach) = trajectory.max_mach() {
        info!("max Mach: {mach:.3}");
    }
    if let Some(q) = trajectory.max_dynamic_pressure() {
        info!("max dynamic pressure: {q:.0} Pa");
    }

    if let Some(landing) = trajectory.events.get(FlightMilestone::Landing) {
        if let Some([lat, lon]) = landing.latlon_deg {
            info!("landing at ({lat:.6}, {lon:.6}) after {:.1} s", landing.t_s);
            if !setup.areas().is_empty() {
                let violations = setup.areas().violations(lat, lon);
                if violations.is_empty() {
                    info!("landing point satisfies all area constraints");
                } else {
                    warn!("landing point violates: {}", violations.join(", "));
                }
            }
        }
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("creating '{}'", args.out_dir.display()))?;
    write_events(&trajectory, &args.out_dir.join("events.json"))?;
    write_trajectory(&trajectory, &args.out_dir.join("trajectory.csv"))?;
    info!("results written to '{}'", args.out_dir.display());

    Ok(())
}

fn write_events(trajectory: &TrajectoryResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&trajectory.events)?;
    fs::write(path, json).with_context(|| format!("writing '{}'", path.display()))?;
    Ok(())
}

fn write_trajectory(trajectory: &TrajectoryResult, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("writing '{}'", path.display()))?;
    for sample in &trajectory.samples {
        writer.serialize(sample)?;
    }
    writer.flush()?;
    Ok(())
}
