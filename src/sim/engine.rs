//! Propellant profile: thrust-curve conditioning and the time-indexed
//! thrust / impulse / propellant mass / propellant inertia lookups.

use std::path::Path;

use nalgebra::Vector3;
use thiserror::Error;

use crate::math::filter::lowpass_zero_phase;
use crate::math::interp::{interp, InterpMode};

/// Thrust samples below this fraction of the peak are treated as noise when
/// locating the effective burn window.
const THRUST_THRESHOLD_RATE: f64 = 0.01;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("thrust curve is empty")]
    EmptyCurve,

    #[error("thrust sample interval must be positive, got {0}")]
    BadSampleInterval(f64),

    #[error("thrust curve has no samples above the {0}%-of-peak threshold")]
    NoEffectiveThrust(f64),

    #[error("propellant mass must be positive, got {0}")]
    BadPropellantMass(f64),

    #[error("reading thrust curve: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing thrust curve: {0}")]
    Csv(#[from] csv::Error),

    #[error("thrust curve line {line}: expected `time,thrust`")]
    BadRow { line: usize },
}

/// Start and end of the effective burn, the first/last sample times whose
/// thrust reaches `threshold_rate` of the peak. `None` if no sample does.
pub fn effective_window(
    time: &[f64],
    thrust: &[f64],
    threshold_rate: f64,
) -> Option<(f64, f64)> {
    let peak = thrust.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() || peak <= 0.0 {
        return None;
    }
    let threshold = peak * threshold_rate;

    let mut bounds = None;
    for (&t, &f) in time.iter().zip(thrust) {
        if f >= threshold {
            bounds = match bounds {
                None => Some((t, t)),
                Some((start, _)) => Some((start, t)),
            };
        }
    }
    bounds
}

/// Running integral of thrust over uniformly sampled time, `cumsum(F)·dt`.
pub fn cumulative_impulse(thrust: &[f64], dt: f64) -> Vec<f64> {
    thrust
        .iter()
        .scan(0.0, |acc, f| {
            *acc += f * dt;
            Some(*acc)
        })
        .collect()
}

/// Immutable, fully precomputed burn profile. Built once from a measured
/// thrust curve; every per-time quantity is interpolated over the trimmed
/// time domain `[0, cutoff_time]` rebased to start at ignition.
#[derive(Debug, Clone)]
pub struct PropellantProfile {
    time: Vec<f64>,
    thrust: Vec<f64>,
    impulse: Vec<f64>,
    /// Remaining propellant fraction, `1 − I(t)/I_total`.
    remaining: Vec<f64>,

    mass_init_kg: f64,
    moi_init_kgm2: Vector3<f64>,

    startup_time_raw_s: f64,
    cutoff_time_s: f64,
    impulse_total_ns: f64,
    max_thrust_n: f64,
}

impl PropellantProfile {
    /// Builds the profile from raw `(time, thrust)` samples with a uniform
    /// `sample_interval`. A positive `cutoff_freq_hz` low-pass filters the
    /// curve first (zero-phase DFT filter); negatives are then clamped to
    /// zero and the curve is trimmed to its effective window.
    pub fn new(
        time: &[f64],
        thrust_raw: &[f64],
        sample_interval_s: f64,
        cutoff_freq_hz: f64,
        mass_prop_kg: f64,
        moi_prop_kgm2: Vector3<f64>,
    ) -> Result<Self, EngineError> {
        if time.is_empty() || thrust_raw.is_empty() {
            return Err(EngineError::EmptyCurve);
        }
        if sample_interval_s <= 0.0 {
            return Err(EngineError::BadSampleInterval(sample_interval_s));
        }
        if mass_prop_kg <= 0.0 {
            return Err(EngineError::BadPropellantMass(mass_prop_kg));
        }

        let mut thrust = lowpass_zero_phase(thrust_raw, sample_interval_s, cutoff_freq_hz);
        for f in &mut thrust {
            if *f < 0.0 {
                *f = 0.0;
            }
        }

        let (t_startup, t_cutoff) = effective_window(time, &thrust, THRUST_THRESHOLD_RATE)
            .ok_or(EngineError::NoEffectiveThrust(THRUST_THRESHOLD_RATE * 100.0))?;

        // trim to the effective window and rebase time to ignition
        let (trimmed_time, trimmed_thrust): (Vec<f64>, Vec<f64>) = time
            .iter()
            .zip(&thrust)
            .filter(|&(&t, _)| t >= t_startup && t <= t_cutoff)
            .map(|(&t, &f)| (t - t_startup, f))
            .unzip();

        let impulse = cumulative_impulse(&trimmed_thrust, sample_interval_s);
        let impulse_total = *impulse.last().expect("trimmed curve is non-empty");
        let remaining: Vec<f64> = impulse.iter().map(|i| 1.0 - i / impulse_total).collect();

        let max_thrust = trimmed_thrust.iter().cloned().fold(0.0, f64::max);
        let cutoff_time = *trimmed_time.last().expect("trimmed curve is non-empty");

        Ok(PropellantProfile {
            time: trimmed_time,
            thrust: trimmed_thrust,
            impulse,
            remaining,
            mass_init_kg: mass_prop_kg,
            moi_init_kgm2: moi_prop_kgm2,
            startup_time_raw_s: t_startup,
            cutoff_time_s: cutoff_time,
            impulse_total_ns: impulse_total,
            max_thrust_n: max_thrust,
        })
    }

    /// Loads a `time,thrust` CSV (comment lines start with `$`, `#` or `%`).
    pub fn from_csv(
        path: &Path,
        sample_interval_s: f64,
        cutoff_freq_hz: f64,
        mass_prop_kg: f64,
        moi_prop_kgm2: Vector3<f64>,
    ) -> Result<Self, EngineError> {
        let (time, thrust) = read_two_column_csv(path)?;
        Self::new(
            &time,
            &thrust,
            sample_interval_s,
            cutoff_freq_hz,
            mass_prop_kg,
            moi_prop_kgm2,
        )
    }

    /// Burn start in the raw curve's time base, before rebasing.
    pub fn startup_time_raw(&self) -> f64 {
        self.startup_time_raw_s
    }

    /// End of burn relative to ignition (t = 0).
    pub fn cutoff_time(&self) -> f64 {
        self.cutoff_time_s
    }

    pub fn impulse_total(&self) -> f64 {
        self.impulse_total_ns
    }

    pub fn max_thrust(&self) -> f64 {
        self.max_thrust_n
    }

    pub fn thrust(&self, t: f64) -> f64 {
        if t >= self.cutoff_time_s {
            0.0
        } else {
            interp(&self.time, &self.thrust, t, &InterpMode::FirstLast)
        }
    }

    /// Thrust vector in the body frame (aligned with the body x axis).
    pub fn thrust_b(&self, t: f64) -> Vector3<f64> {
        Vector3::new(self.thrust(t), 0.0, 0.0)
    }

    pub fn impulse(&self, t: f64) -> f64 {
        if t >= self.cutoff_time_s {
            self.impulse_total_ns
        } else {
            interp(&self.time, &self.impulse, t, &InterpMode::FirstLast)
        }
    }

    pub fn prop_mass(&self, t: f64) -> f64 {
        self.mass_init_kg * self.remaining_fraction(t)
    }

    /// Remaining propellant inertia, the full-load inertia scaled by the
    /// remaining-mass fraction.
    pub fn prop_moi(&self, t: f64) -> Vector3<f64> {
        self.moi_init_kgm2 * self.remaining_fraction(t)
    }

    fn remaining_fraction(&self, t: f64) -> f64 {
        if t >= self.cutoff_time_s {
            0.0
        } else {
            interp(&self.time, &self.remaining, t, &InterpMode::FirstLast)
        }
    }
}

fn read_two_column_csv(path: &Path) -> Result<(Vec<f64>, Vec<f64>), EngineError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'$'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut time = Vec::new();
    let mut value = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let first = record.get(0).unwrap_or("");
        if first.starts_with('#') || first.starts_with('%') || first.is_empty() {
            continue;
        }
        let row = || EngineError::BadRow { line: i + 1 };
        let t: f64 = first.parse().map_err(|_| row())?;
        let v: f64 = record.get(1).ok_or_else(row)?.parse().map_err(|_| row())?;
        time.push(t);
        value.push(v);
    }

    Ok((time, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Synthetic curve: 3 s silence, 4 s linear ramp to 1000 N, 2 s ramp
    /// down, 1 s silence, sampled at 100 Hz.
    fn ramp_curve(dt: f64) -> (Vec<f64>, Vec<f64>) {
        let n = (10.0 / dt) as usize;
        let mut time = Vec::with_capacity(n);
        let mut thrust = Vec::with_capacity(n);
        for i in 0..n {
            let t = i as f64 * dt;
            let f = if t < 3.0 {
                0.0
            } else if t < 7.0 {
                1000.0 * (t - 3.0) / 4.0
            } else if t < 9.0 {
                1000.0 * (9.0 - t) / 2.0
            } else {
                0.0
            };
            time.push(t);
            thrust.push(f);
        }
        (time, thrust)
    }

    #[test]
    fn test_effective_window() {
        let (time, thrust) = ramp_curve(0.01);
        let (t_startup, t_cutoff) = effective_window(&time, &thrust, 0.01).unwrap();
        // the boundary samples sit exactly on the threshold; rounding in the
        // sampled ramp can push either edge off by one interval
        assert_relative_eq!(t_startup, 3.04, epsilon = 0.01 + 1e-9);
        assert_relative_eq!(t_cutoff, 8.98, epsilon = 0.01 + 1e-9);
    }

    #[test]
    fn test_cumulative_impulse() {
        let (time, thrust) = ramp_curve(0.01);
        let impulse = cumulative_impulse(&thrust, 0.01);
        let at = |t: f64| impulse[(t / 0.01).round() as usize];
        assert_relative_eq!(at(0.0), 0.0);
        assert_relative_eq!(at(3.0), 0.0);
        assert_relative_eq!(at(5.0), 502.5, epsilon = 1e-9);
        assert_relative_eq!(at(7.0), 2005.0, epsilon = 1e-9);
        assert_relative_eq!(at(8.0), 2752.5, epsilon = 1e-9);
        assert_relative_eq!(at(9.0), 3000.0, epsilon = 1e-9);
        assert_relative_eq!(at(9.99), 3000.0, epsilon = 1e-9);
    }

    fn ramp_profile() -> PropellantProfile {
        let (time, thrust) = ramp_curve(0.01);
        // cutoff_freq 0 => no filtering, keep the ramp intact
        PropellantProfile::new(&time, &thrust, 0.01, 0.0, 2.0, Vector3::new(0.0, 0.5, 0.5))
            .unwrap()
    }

    #[test]
    fn test_trim_and_rebase() {
        let profile = ramp_profile();
        // window edges are pinned only to one sample interval each
        assert_relative_eq!(profile.startup_time_raw(), 3.04, epsilon = 0.01 + 1e-9);
        assert_relative_eq!(profile.cutoff_time(), 8.98 - 3.04, epsilon = 0.02 + 1e-9);
        // thrust is zero at and beyond cutoff
        assert_eq!(profile.thrust(profile.cutoff_time()), 0.0);
        assert_eq!(profile.thrust(100.0), 0.0);
        assert!(profile.thrust(2.0) > 0.0);
    }

    #[test]
    fn test_impulse_monotone_and_saturating() {
        let profile = ramp_profile();
        let mut last = 0.0;
        let mut t = 0.0;
        while t < profile.cutoff_time() + 1.0 {
            let i = profile.impulse(t);
            assert!(i >= last - 1e-12, "impulse must be non-decreasing");
            last = i;
            t += 0.05;
        }
        assert_relative_eq!(profile.impulse(1000.0), profile.impulse_total());
    }

    #[test]
    fn test_propellant_depletes_to_zero() {
        let profile = ramp_profile();
        assert_relative_eq!(profile.prop_mass(0.0), 2.0, epsilon = 1e-2);
        assert_eq!(profile.prop_mass(profile.cutoff_time()), 0.0);
        assert_eq!(profile.prop_moi(profile.cutoff_time()), Vector3::zeros());

        // inertia scales with the same remaining fraction as mass
        let t = 2.0;
        let frac = profile.prop_mass(t) / 2.0;
        assert_relative_eq!(profile.prop_moi(t).y, 0.5 * frac, epsilon = 1e-12);
    }

    #[test]
    fn test_negative_thrust_clamped() {
        let time = [0.0, 0.1, 0.2, 0.3];
        let thrust = [-5.0, 100.0, 100.0, -5.0];
        let profile =
            PropellantProfile::new(&time, &thrust, 0.1, 0.0, 1.0, Vector3::zeros()).unwrap();
        assert!(profile.thrust(0.0) >= 0.0);
        assert_relative_eq!(profile.max_thrust(), 100.0);
    }

    #[test]
    fn test_rejects_empty_and_dead_curves() {
        assert!(matches!(
            PropellantProfile::new(&[], &[], 0.1, 0.0, 1.0, Vector3::zeros()),
            Err(EngineError::EmptyCurve)
        ));
        assert!(matches!(
            PropellantProfile::new(&[0.0, 0.1], &[0.0, 0.0], 0.1, 0.0, 1.0, Vector3::zeros()),
            Err(EngineError::NoEffectiveThrust(_))
        ));
        assert!(matches!(
            PropellantProfile::new(&[0.0], &[1.0], -0.1, 0.0, 1.0, Vector3::zeros()),
            Err(EngineError::BadSampleInterval(_))
        ));
    }
}
