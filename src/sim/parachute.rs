//! Recovery canopies: quadratic drag and deployment triggers.

use nalgebra::Vector3;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParachuteError {
    #[error("parachute has no deployment trigger configured")]
    NoTrigger,

    #[error("parachute drag area must be positive, got cd={cd}, area={area}")]
    BadDragArea { cd: f64, area: f64 },
}

/// Deployment conditions, OR-combined; the first satisfied one wins.
/// Fall-time and altitude conditions only arm after apogee.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeployTrigger {
    /// Elapsed flight time since ignition [s].
    pub flight_time: Option<f64>,
    /// Time since apogee [s].
    pub fall_time: Option<f64>,
    /// Descending through this altitude [m].
    pub altitude: Option<f64>,
}

impl DeployTrigger {
    pub fn is_configured(&self) -> bool {
        self.flight_time.is_some() || self.fall_time.is_some() || self.altitude.is_some()
    }

    pub fn satisfied(&self, t: f64, t_apogee: Option<f64>, alt_m: f64) -> bool {
        if let Some(t_deploy) = self.flight_time {
            if t > t_deploy {
                return true;
            }
        }
        if let (Some(t_fall), Some(t_apogee)) = (self.fall_time, t_apogee) {
            if t - t_apogee > t_fall {
                return true;
            }
        }
        if let (Some(alt_deploy), Some(_)) = (self.altitude, t_apogee) {
            if alt_m < alt_deploy {
                return true;
            }
        }
        false
    }
}

#[derive(Debug, Clone)]
pub struct Parachute {
    cd: f64,
    area_m2: f64,
    trigger: DeployTrigger,
}

impl Parachute {
    pub fn new(cd: f64, area_m2: f64, trigger: DeployTrigger) -> Result<Self, ParachuteError> {
        if cd <= 0.0 || area_m2 <= 0.0 {
            return Err(ParachuteError::BadDragArea { cd, area: area_m2 });
        }
        if !trigger.is_configured() {
            return Err(ParachuteError::NoTrigger);
        }
        Ok(Parachute {
            cd,
            area_m2,
            trigger,
        })
    }

    pub fn deploy_satisfied(&self, t: f64, t_apogee: Option<f64>, alt_m: f64) -> bool {
        self.trigger.satisfied(t, t_apogee, alt_m)
    }

    /// Canopy drag in the body frame, `½ρ‖v_air‖·v_air·S·Cd`, directed
    /// along the relative airflow.
    pub fn drag_force(&self, v_air_b: &Vector3<f64>, density_kg_m3: f64) -> Vector3<f64> {
        0.5 * density_kg_m3 * v_air_b.norm() * v_air_b * self.area_m2 * self.cd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn chute(trigger: DeployTrigger) -> Parachute {
        Parachute::new(1.2, 0.64, trigger).unwrap()
    }

    #[test]
    fn test_requires_a_trigger() {
        assert!(matches!(
            Parachute::new(1.2, 0.64, DeployTrigger::default()),
            Err(ParachuteError::NoTrigger)
        ));
        assert!(matches!(
            Parachute::new(0.0, 0.64, DeployTrigger { flight_time: Some(1.0), ..Default::default() }),
            Err(ParachuteError::BadDragArea { .. })
        ));
    }

    #[test]
    fn test_flight_time_trigger() {
        let chute = chute(DeployTrigger {
            flight_time: Some(12.0),
            ..Default::default()
        });
        assert!(!chute.deploy_satisfied(11.9, None, 500.0));
        assert!(chute.deploy_satisfied(12.1, None, 500.0));
    }

    #[test]
    fn test_fall_time_trigger_needs_apogee() {
        let chute = chute(DeployTrigger {
            fall_time: Some(3.0),
            ..Default::default()
        });
        assert!(!chute.deploy_satisfied(20.0, None, 500.0));
        assert!(!chute.deploy_satisfied(12.5, Some(10.0), 500.0));
        assert!(chute.deploy_satisfied(13.5, Some(10.0), 500.0));
    }

    #[test]
    fn test_altitude_trigger_needs_apogee() {
        let chute = chute(DeployTrigger {
            altitude: Some(300.0),
            ..Default::default()
        });
        // ascending through 300 m must not fire
        assert!(!chute.deploy_satisfied(5.0, None, 250.0));
        assert!(chute.deploy_satisfied(25.0, Some(14.0), 250.0));
        assert!(!chute.deploy_satisfied(25.0, Some(14.0), 350.0));
    }

    #[test]
    fn test_drag_opposes_relative_flow() {
        let chute = chute(DeployTrigger {
            flight_time: Some(1.0),
            ..Default::default()
        });
        // falling: airflow from below (body frame +x up the body axis)
        let v_air = Vector3::new(20.0, 0.0, 0.0);
        let force = chute.drag_force(&v_air, 1.225);
        assert_relative_eq!(force.x, 0.5 * 1.225 * 20.0 * 20.0 * 0.64 * 1.2, epsilon = 1e-9);
        assert_relative_eq!(force.y, 0.0);
        assert_relative_eq!(force.z, 0.0);
    }
}
