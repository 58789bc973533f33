//! Wind-sweep Monte Carlo: the same flight flown across a grid of wind
//! speeds and directions, optionally jittered, on a pool of worker threads.

use std::{
    fs,
    path::PathBuf,
    sync::{atomic::AtomicUsize, mpsc::Sender, Arc},
    thread::available_parallelism,
    time::Instant,
};

use anyhow::{Context, Result};
use log::info;
use rand::{rngs::OsRng, Rng, SeedableRng, TryRngCore};
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::Serialize;

use crate::config::SimulationConfig;
use crate::sim::wind::Wind;

/// The swept wind grid. Jitter amplitudes of zero reproduce the grid
/// exactly; positive amplitudes draw uniformly around each grid point.
#[derive(Debug, Clone)]
pub struct WindSweep {
    pub speeds_m_s: Vec<f64>,
    pub directions_deg: Vec<f64>,
    pub speed_jitter_m_s: f64,
    pub direction_jitter_deg: f64,
}

impl WindSweep {
    /// Speeds `start..end` in `step` increments, directions evenly
    /// spaced over the full circle.
    pub fn regular(speed_start: f64, speed_end: f64, speed_step: f64, n_directions: usize) -> Self {
        let mut speeds_m_s = Vec::new();
        let mut s = speed_start;
        while s < speed_end {
            speeds_m_s.push(s);
            s += speed_step;
        }
        let directions_deg = (0..n_directions)
            .map(|i| 360.0 * i as f64 / n_directions as f64)
            .collect();
        WindSweep {
            speeds_m_s,
            directions_deg,
            speed_jitter_m_s: 0.0,
            direction_jitter_deg: 0.0,
        }
    }

    fn cases(&self) -> Vec<(f64, f64)> {
        let mut cases = Vec::with_capacity(self.speeds_m_s.len() * self.directions_deg.len());
        for &speed in &self.speeds_m_s {
            for &dir in &self.directions_deg {
                cases.push((speed, dir));
            }
        }
        cases
    }
}

/// The per-case wind keeps the configured profile shape: a power-law
/// config is swept by replacing its reference vector, anything else
/// collapses to a constant profile.
fn sweep_wind(configured: &Wind, speed_m_s: f64, direction_deg: f64) -> Wind {
    let dir = direction_deg.to_radians();
    let reference = [-speed_m_s * dir.sin(), -speed_m_s * dir.cos(), 0.0];
    match configured {
        Wind::PowerLaw { z0, n, .. } => Wind::PowerLaw {
            reference,
            z0: *z0,
            n: *n,
        },
        _ => Wind::Constant {
            velocity: reference,
        },
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloResult {
    pub index: usize,
    pub thread_id: usize,
    pub seed: u64,
    pub wind_speed_m_s: f64,
    pub wind_direction_deg: f64,
    pub landed: bool,
    pub apogee_m: Option<f64>,
    pub flight_time_s: Option<f64>,
    pub landing_lat_deg: Option<f64>,
    pub landing_lon_deg: Option<f64>,
    pub inside_areas: Option<bool>,
    pub sim_duration_us: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloSummary {
    pub runs: usize,
    pub landed: usize,
    pub inside: usize,
    pub outside: usize,
}

#[allow(clippy::too_many_arguments)]
fn worker(
    config: Arc<SimulationConfig>,
    cases: Arc<Vec<(f64, f64)>>,
    sweep: WindSweep,
    thread_id: usize,
    run_index: Arc<AtomicUsize>,
    tx_result: Sender<MonteCarloResult>,
    out_dir: PathBuf,
) -> Result<()> {
    loop {
        let index = run_index.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        if index >= cases.len() {
            return Ok(());
        }

        let seed = OsRng.try_next_u64()?;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);

        let (mut speed, mut direction) = cases[index];
        if sweep.speed_jitter_m_s > 0.0 {
            speed = (speed + rng.random_range(-sweep.speed_jitter_m_s..=sweep.speed_jitter_m_s))
                .max(0.0);
        }
        if sweep.direction_jitter_deg > 0.0 {
            direction += rng
                .random_range(-sweep.direction_jitter_deg..=sweep.direction_jitter_deg);
        }

        let wind = sweep_wind(&config.wind, speed, direction);
        let setup = config
            .build_with_wind(wind)
            .with_context(|| format!("building run {index}"))?;

        let start = Instant::now();
        let trajectory = setup.fly();
        let sim_duration = start.elapsed();

        let latlon = trajectory.landing_latlon();
        let inside = latlon.map(|(lat, lon)| setup.areas().judge(lat, lon));

        let events_json = serde_json::to_string_pretty(&trajectory.events)?;
        let case_name = format!("{speed:.2}_{direction:.2}");
        fs::write(out_dir.join(format!("{case_name}.json")), events_json)?;

        tx_result.send(MonteCarloResult {
            index,
            thread_id,
            seed,
            wind_speed_m_s: speed,
            wind_direction_deg: direction,
            landed: trajectory.is_complete(),
            apogee_m: trajectory.max_altitude_m(),
            flight_time_s: trajectory.flight_duration_s(),
            landing_lat_deg: latlon.map(|ll| ll.0),
            landing_lon_deg: latlon.map(|ll| ll.1),
            inside_areas: inside,
            sim_duration_us: sim_duration.as_micros() as u64,
        })?;
    }
}

pub struct MonteCarloRunner {
    config: SimulationConfig,
    sweep: WindSweep,
    num_workers: usize,
    out_dir: PathBuf,
}

impl MonteCarloRunner {
    pub fn new(
        config: SimulationConfig,
        sweep: WindSweep,
        num_workers: Option<usize>,
        out_dir: PathBuf,
    ) -> Result<Self> {
        let num_workers =
            num_workers.unwrap_or_else(|| available_parallelism().map_or(1, |n| n.get()));

        // fail before spawning anything if the models cannot be built
        config.build().context("validating configuration")?;

        info!(
            "Monte Carlo configuration: {num_workers} workers, {} cases",
            sweep.speeds_m_s.len() * sweep.directions_deg.len()
        );

        Ok(MonteCarloRunner {
            config,
            sweep,
            num_workers,
            out_dir,
        })
    }

    pub fn run_blocking(self) -> Result<MonteCarloSummary> {
        let (tx_result, rx_result) = std::sync::mpsc::channel();
        let cases = Arc::new(self.sweep.cases());
        let config = Arc::new(self.config);
        let run_index = Arc::new(AtomicUsize::new(0));

        let mut workers = vec![];
        for i in 0..self.num_workers {
            let config = config.clone();
            let cases = cases.clone();
            let sweep = self.sweep.clone();
            let tx_result = tx_result.clone();
            let run_index = run_index.clone();
            let out_dir = self.out_dir.clone();

            workers.push(std::thread::spawn(move || {
                worker(config, cases, sweep, i, run_index, tx_result, out_dir)
            }));
        }
        drop(tx_result);

        let out_file = self.out_dir.join("montecarlo.csv");
        let mut writer = csv::Writer::from_path(&out_file)?;

        let mut summary = MonteCarloSummary {
            runs: 0,
            landed: 0,
            inside: 0,
            outside: 0,
        };

        while let Ok(result) = rx_result.recv() {
            info!(
                "run {} (thread {}): wind {:.1} m/s from {:.0} deg, apogee {:?} m, inside: {:?}",
                result.index,
                result.thread_id,
                result.wind_speed_m_s,
                result.wind_direction_deg,
                result.apogee_m,
                result.inside_areas,
            );

            summary.runs += 1;
            if result.landed {
                summary.landed += 1;
            }
            match result.inside_areas {
                Some(true) => summary.inside += 1,
                Some(false) => summary.outside += 1,
                None => {}
            }

            writer.serialize(result)?;
        }
        writer.flush()?;

        for w in workers {
            w.join().expect("worker thread panicked")?;
        }

        fs::write(
            self.out_dir.join("summary.json"),
            serde_json::to_string_pretty(&summary)?,
        )?;
        info!(
            "{} runs: {} landed, {} inside all areas, {} outside",
            summary.runs, summary.landed, summary.inside, summary.outside
        );

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_regular_sweep_grid() {
        let sweep = WindSweep::regular(0.0, 8.0, 2.0, 4);
        assert_eq!(sweep.speeds_m_s, vec![0.0, 2.0, 4.0, 6.0]);
        assert_eq!(sweep.directions_deg, vec![0.0, 90.0, 180.0, 270.0]);
        assert_eq!(sweep.cases().len(), 16);
    }

    #[test]
    fn test_sweep_wind_keeps_power_law_shape() {
        let configured = Wind::PowerLaw {
            reference: [1.0, 0.0, 0.0],
            z0: 5.0,
            n: 6.0,
        };
        // wind from the east blows towards the west
        let swept = sweep_wind(&configured, 4.0, 90.0);
        match swept {
            Wind::PowerLaw { reference, z0, n } => {
                assert_relative_eq!(reference[0], -4.0, epsilon = 1e-12);
                assert_relative_eq!(reference[1], 0.0, epsilon = 1e-12);
                assert_eq!(z0, 5.0);
                assert_eq!(n, 6.0);
            }
            _ => panic!("expected a power-law wind"),
        }

        let constant = sweep_wind(
            &Wind::Constant {
                velocity: [0.0, 0.0, 0.0],
            },
            3.0,
            180.0,
        );
        assert!(matches!(constant, Wind::Constant { .. }));
        assert_relative_eq!(constant.velocity(10.0).y, 3.0, epsilon = 1e-12);
    }
}
