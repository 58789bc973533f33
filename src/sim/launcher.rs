//! Launch rail geometry and the rail-constrained launch phase thresholds.

use nalgebra::{UnitQuaternion, Vector3};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("rail length must be positive, got {0}")]
    BadLength(f64),

    #[error("rail elevation must lie in (0, 90] degrees, got {0}")]
    BadElevation(f64),
}

#[derive(Debug, Clone)]
pub struct Launcher {
    length_m: f64,
    azimuth_rad: f64,
    elevation_rad: f64,
}

impl Launcher {
    pub fn new(length_m: f64, azimuth_deg: f64, elevation_deg: f64) -> Result<Self, LauncherError> {
        if length_m <= 0.0 {
            return Err(LauncherError::BadLength(length_m));
        }
        if elevation_deg <= 0.0 || elevation_deg > 90.0 {
            return Err(LauncherError::BadElevation(elevation_deg));
        }
        Ok(Launcher {
            length_m,
            azimuth_rad: azimuth_deg.to_radians(),
            elevation_rad: elevation_deg.to_radians(),
        })
    }

    /// Binds a rocket to the rail: derives both lug clearance heights from
    /// the rail length, lug positions and the CG at ignition, and the
    /// initial attitude. Computed once; never re-derived during flight.
    pub fn bind(&self, lug_1st_m: f64, lug_2nd_m: f64, cg_initial_m: f64) -> RailGeometry {
        let travel_1st = self.length_m - (cg_initial_m - lug_1st_m);
        let travel_2nd = self.length_m + (lug_2nd_m - cg_initial_m);

        let sin_elev = self.elevation_rad.sin();

        // yaw to the launch azimuth, then pitch up to the rail elevation
        let qz = UnitQuaternion::from_axis_angle(
            &Vector3::z_axis(),
            std::f64::consts::FRAC_PI_2 - self.azimuth_rad,
        );
        let qy = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), -self.elevation_rad);

        RailGeometry {
            height_1st_lug_off_m: travel_1st * sin_elev,
            height_2nd_lug_off_m: travel_2nd * sin_elev,
            quat_initial_lb: qz * qy,
        }
    }

    pub fn length_m(&self) -> f64 {
        self.length_m
    }

    pub fn elevation_rad(&self) -> f64 {
        self.elevation_rad
    }

    pub fn azimuth_rad(&self) -> f64 {
        self.azimuth_rad
    }
}

/// Rail-derived constants bound to one rocket configuration.
#[derive(Debug, Clone)]
pub struct RailGeometry {
    /// Altitude at which the lower lug leaves the rail.
    pub height_1st_lug_off_m: f64,
    /// Altitude at which the upper lug leaves the rail.
    pub height_2nd_lug_off_m: f64,
    /// Initial attitude, rotating body-frame vectors into the local frame.
    pub quat_initial_lb: UnitQuaternion<f64>,
}

impl RailGeometry {
    pub fn is_1st_lug_off(&self, alt_m: f64) -> bool {
        alt_m > self.height_1st_lug_off_m
    }

    pub fn is_2nd_lug_off(&self, alt_m: f64) -> bool {
        alt_m > self.height_2nd_lug_off_m
    }
}
