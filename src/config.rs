//! TOML configuration and flight assembly.
//!
//! Every derived quantity is computed once while building the models;
//! the resulting [`FlightSetup`] is immutable and can fly any number of
//! times, so independent runs (Monte Carlo sweeps) never share mutable
//! state.

use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

use crate::judge::AreaJudgement;
use crate::sim::aero::{AeroCoefficients, AeroError, AeroModel};
use crate::sim::atmosphere::LayeredAtmosphere;
use crate::sim::engine::{EngineError, PropellantProfile};
use crate::sim::environment::Environment;
use crate::sim::launcher::{Launcher, LauncherError, RailGeometry};
use crate::sim::parachute::{DeployTrigger, Parachute, ParachuteError};
use crate::sim::rocket::{RocketError, RocketSpecification};
use crate::sim::solver::{FlightModels, TrajectoryResult, TrajectorySolver};
use crate::sim::wind::Wind;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file is not valid TOML")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Rocket(#[from] RocketError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error(transparent)]
    Aero(#[from] AeroError),

    #[error(transparent)]
    Launcher(#[from] LauncherError),

    #[error("{which} parachute: {source}")]
    Parachute {
        which: &'static str,
        #[source]
        source: ParachuteError,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub simulation: SolverConfig,
    pub environment: EnvironmentConfig,
    #[serde(default)]
    pub atmosphere: AtmosphereConfig,
    pub launcher: LauncherConfig,
    pub rocket: RocketConfig,
    pub engine: EngineConfig,
    pub aero: AeroConfig,
    pub wind: Wind,
    pub drogue: Option<ParachuteConfig>,
    pub parachute: ParachuteConfig,
    #[serde(default)]
    pub areas: AreaJudgement,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolverConfig {
    /// Integration step [s] for the coarse part of the grid.
    pub dt: f64,
    /// Simulated window [s]; the run is incomplete if landing is later.
    pub max_t: f64,
    /// Forward-difference step [s] for the inertia rate.
    #[serde(default = "default_moi_rate_dt")]
    pub moi_rate_dt: f64,
}

fn default_moi_rate_dt() -> f64 {
    1.0e-3
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvironmentConfig {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub altitude: f64,
    #[serde(default)]
    pub mag_declination: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AtmosphereConfig {
    pub temperature: f64,
    pub pressure: f64,
}

impl Default for AtmosphereConfig {
    fn default() -> Self {
        AtmosphereConfig {
            temperature: 298.0,
            pressure: 1.013e5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LauncherConfig {
    pub rail_length: f64,
    pub azimuth: f64,
    pub elevation: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RocketConfig {
    pub height: f64,
    pub diameter: f64,
    pub mass_dry: f64,
    pub cg_dry: f64,
    pub cg_prop: f64,
    pub moi_dry: [f64; 3],
    pub lug_1st: f64,
    pub lug_2nd: f64,
    /// Roll damping moment coefficient; negative opposes the roll rate.
    pub cmp: f64,
    /// Pitch/yaw damping moment coefficient; negative opposes the rate.
    pub cmq: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    pub thrust_curve_csv: PathBuf,
    /// Sample interval [s] of the thrust curve.
    pub thrust_dt: f64,
    /// Low-pass cutoff [Hz] applied to the raw curve; 0 disables filtering.
    #[serde(default)]
    pub cutoff_freq: f64,
    pub mass_prop: f64,
    pub moi_prop: [f64; 3],
}

#[derive(Debug, Clone, Deserialize)]
pub struct AeroConfig {
    pub cd0_csv: PathBuf,
    pub clalpha_csv: PathBuf,
    pub cp_csv: PathBuf,
    #[serde(default = "default_cd_amplitude")]
    pub cd_amplitude: f64,
    pub calibration: Option<AeroCalibration>,
}

fn default_cd_amplitude() -> f64 {
    0.5
}

/// Scales the coefficient tables so they reproduce measured reference
/// values at one Mach number.
#[derive(Debug, Clone, Deserialize)]
pub struct AeroCalibration {
    pub mach: f64,
    pub cd0: Option<f64>,
    pub clalpha: Option<f64>,
    pub cp: Option<f64>,
    /// AoA [deg] at which the CP reference was measured.
    #[serde(default)]
    pub cp_alpha: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParachuteConfig {
    pub cd: f64,
    pub area: f64,
    pub trigger: DeployTrigger,
}

impl ParachuteConfig {
    fn build(&self, which: &'static str) -> Result<Parachute, ConfigError> {
        Parachute::new(self.cd, self.area, self.trigger.clone())
            .map_err(|source| ConfigError::Parachute { which, source })
    }
}

impl SimulationConfig {
    /// Loads a config file, resolving the CSV paths it names relative to
    /// its own directory.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: SimulationConfig = toml::from_str(&text)?;

        if let Some(base) = path.parent() {
            for p in [
                &mut config.engine.thrust_curve_csv,
                &mut config.aero.cd0_csv,
                &mut config.aero.clalpha_csv,
                &mut config.aero.cp_csv,
            ] {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
        Ok(config)
    }

    pub fn build(&self) -> Result<FlightSetup, ConfigError> {
        self.build_with_wind(self.wind.clone())
    }

    /// Builds with a replacement wind model, for sweep runs.
    pub fn build_with_wind(&self, wind: Wind) -> Result<FlightSetup, ConfigError> {
        let r = &self.rocket;
        let spec = RocketSpecification::new(
            r.height,
            r.diameter,
            r.mass_dry,
            r.cg_dry,
            r.cg_prop,
            Vector3::from(r.moi_dry),
            r.lug_1st,
            r.lug_2nd,
            r.cmp,
            r.cmq,
        )?;

        let engine = PropellantProfile::from_csv(
            &self.engine.thrust_curve_csv,
            self.engine.thrust_dt,
            self.engine.cutoff_freq,
            self.engine.mass_prop,
            Vector3::from(self.engine.moi_prop),
        )?;

        let mut coeffs = AeroCoefficients::from_csv_files(
            &self.aero.cd0_csv,
            &self.aero.clalpha_csv,
            &self.aero.cp_csv,
            self.aero.cd_amplitude,
        )?;
        if let Some(cal) = &self.aero.calibration {
            if let Some(cd0) = cal.cd0 {
                coeffs.calibrate_cd0(cd0, cal.mach)?;
            }
            if let Some(clalpha) = cal.clalpha {
                coeffs.calibrate_clalpha(clalpha, cal.mach)?;
            }
            if let Some(cp) = cal.cp {
                coeffs.calibrate_cp(cp, cal.mach, cal.cp_alpha.to_radians())?;
            }
        }
        let aero = AeroModel::new(coeffs, r.diameter, r.height, spec.cm_damping);

        let environment = Environment::new(
            self.environment.latitude,
            self.environment.longitude,
            self.environment.altitude,
            self.environment.mag_declination,
        );
        let atmosphere =
            LayeredAtmosphere::new(self.atmosphere.temperature, self.atmosphere.pressure);

        let launcher = Launcher::new(
            self.launcher.rail_length,
            self.launcher.azimuth,
            self.launcher.elevation,
        )?;
        let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));

        let drogue = self
            .drogue
            .as_ref()
            .map(|c| c.build("drogue"))
            .transpose()?;
        let parachute = self.parachute.build("main")?;

        let solver = TrajectorySolver::new(
            self.simulation.dt,
            self.simulation.max_t,
            self.simulation.moi_rate_dt,
        );

        Ok(FlightSetup {
            spec,
            engine,
            aero,
            atmosphere,
            wind,
            environment,
            rail,
            drogue,
            parachute,
            solver,
            areas: self.areas.clone(),
        })
    }
}

/// A fully constructed, immutable flight. All validation has already
/// happened; flying cannot fail.
#[derive(Debug)]
pub struct FlightSetup {
    spec: RocketSpecification,
    engine: PropellantProfile,
    aero: AeroModel,
    atmosphere: LayeredAtmosphere,
    wind: Wind,
    environment: Environment,
    rail: RailGeometry,
    drogue: Option<Parachute>,
    parachute: Parachute,
    solver: TrajectorySolver,
    areas: AreaJudgement,
}

impl FlightSetup {
    pub fn fly(&self) -> TrajectoryResult {
        let models = FlightModels {
            spec: &self.spec,
            engine: &self.engine,
            aero: &self.aero,
            atmosphere: &self.atmosphere,
            wind: &self.wind,
            environment: &self.environment,
            rail: &self.rail,
            drogue: self.drogue.as_ref(),
            parachute: &self.parachute,
        };
        self.solver.run(&models)
    }

    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn areas(&self) -> &AreaJudgement {
        &self.areas
    }

    pub fn engine(&self) -> &PropellantProfile {
        &self.engine
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [simulation]
        dt = 0.05
        max_t = 600.0

        [environment]
        latitude = 40.2
        longitude = 140.0

        [launcher]
        rail_length = 5.0
        azimuth = 0.0
        elevation = 85.0

        [rocket]
        height = 1.8
        diameter = 0.1
        mass_dry = 8.0
        cg_dry = 0.9
        cg_prop = 1.4
        moi_dry = [0.02, 2.0, 2.0]
        lug_1st = 1.0
        lug_2nd = 1.6
        cmp = -0.02
        cmq = -2.0

        [engine]
        thrust_curve_csv = "thrust.csv"
        thrust_dt = 0.001
        mass_prop = 0.8
        moi_prop = [0.001, 0.02, 0.02]

        [aero]
        cd0_csv = "cd0.csv"
        clalpha_csv = "clalpha.csv"
        cp_csv = "cp.csv"

        [wind]
        model = "power_law"
        reference = [3.0, 1.0, 0.0]
        z0 = 5.0
        n = 6.0

        [parachute]
        cd = 1.2
        area = 0.6

        [parachute.trigger]
        fall_time = 0.5
    "#;

    #[test]
    fn test_parses_minimal_config() {
        let config: SimulationConfig = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.simulation.moi_rate_dt, 1.0e-3);
        assert_eq!(config.atmosphere.temperature, 298.0);
        assert!(config.drogue.is_none());
        assert!(config.areas.is_empty());
        assert_eq!(config.parachute.trigger.fall_time, Some(0.5));
        assert!(matches!(config.wind, Wind::PowerLaw { .. }));
    }

    #[test]
    fn test_rejects_unknown_sections() {
        let bad = format!("{MINIMAL}\n[typo_section]\nx = 1\n");
        assert!(toml::from_str::<SimulationConfig>(&bad).is_err());
    }

    #[test]
    fn test_build_fails_fast_on_missing_thrust_file() {
        let config: SimulationConfig = toml::from_str(MINIMAL).unwrap();
        let err = config.build().unwrap_err();
        assert!(matches!(err, ConfigError::Engine(_)));
    }
}
