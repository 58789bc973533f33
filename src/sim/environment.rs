//! Launch-site environment: geodesy, gravity and Coriolis.
//!
//! The simulation frame is a local tangent plane at the rail base
//! (x east, y north, z up). Geodesy uses the GRS80 ellipsoid.

use nalgebra::{Matrix3, UnitQuaternion, Vector3};

/// GRS80 semi-major axis [m].
pub const EARTH_RADIUS_A: f64 = 6378137.0;
/// GRS80 semi-minor (polar) axis [m].
pub const EARTH_RADIUS_B: f64 = 6356752.0;
/// First eccentricity of the ellipsoid.
pub const EARTH_ECCENTRICITY: f64 = 0.081819191042815790;
/// Earth rotation rate [rad/s].
pub const EARTH_OMEGA: f64 = 0.000072722052166;

/// Reduced (parametric) latitude for a geodetic latitude in degrees.
pub fn reduced_latitude(latitude_deg: f64) -> f64 {
    ((1.0 - EARTH_ECCENTRICITY.powi(2)).sqrt() * latitude_deg.to_radians().tan()).atan()
}

/// Local ellipsoid radius [m] at a geodetic latitude in degrees.
pub fn earth_radius_at(latitude_deg: f64) -> f64 {
    let reduced = reduced_latitude(latitude_deg);
    ((EARTH_RADIUS_A * reduced.cos()).powi(2) + (EARTH_RADIUS_B * reduced.sin()).powi(2)).sqrt()
}

/// Metres per degree of latitude at the given latitude.
pub fn deg_to_meters_at(latitude_deg: f64) -> f64 {
    earth_radius_at(latitude_deg) * std::f64::consts::PI / 180.0
}

/// Launch-site constants, all derived once at construction.
#[derive(Debug, Clone)]
pub struct Environment {
    latitude_deg: f64,
    longitude_deg: f64,
    altitude_m: f64,
    mag_declination_deg: f64,

    earth_radius_m: f64,
    /// Rotation from the local launch-site frame to the Earth-centred frame.
    t_el: Matrix3<f64>,
    /// Earth rotation vector expressed in the local frame.
    omega_earth_local: Vector3<f64>,
}

impl Environment {
    pub fn new(
        latitude_deg: f64,
        longitude_deg: f64,
        altitude_m: f64,
        mag_declination_deg: f64,
    ) -> Self {
        let earth_radius_m = earth_radius_at(latitude_deg);

        let (sinlat, coslat) = latitude_deg.to_radians().sin_cos();
        let (sinlon, coslon) = longitude_deg.to_radians().sin_cos();

        #[rustfmt::skip]
        let t_el = Matrix3::new(
            -sinlon, -sinlat * coslon, coslat * coslon,
             coslon, -sinlat * sinlon, coslat * sinlon,
                0.0,           coslat,          sinlat,
        );

        let omega_earth_local = t_el.transpose() * Vector3::new(0.0, 0.0, EARTH_OMEGA);

        Environment {
            latitude_deg,
            longitude_deg,
            altitude_m,
            mag_declination_deg,
            earth_radius_m,
            t_el,
            omega_earth_local,
        }
    }

    pub fn latitude_deg(&self) -> f64 {
        self.latitude_deg
    }

    pub fn longitude_deg(&self) -> f64 {
        self.longitude_deg
    }

    pub fn altitude_m(&self) -> f64 {
        self.altitude_m
    }

    pub fn earth_radius_m(&self) -> f64 {
        self.earth_radius_m
    }

    pub fn local_to_ecef(&self) -> &Matrix3<f64> {
        &self.t_el
    }

    pub fn omega_earth_local(&self) -> &Vector3<f64> {
        &self.omega_earth_local
    }

    /// Gravity vector in the local frame. Altitude dependence is a known,
    /// deliberately deferred simplification.
    pub fn gravity(&self, _alt_m: f64) -> Vector3<f64> {
        Vector3::new(0.0, 0.0, -9.81)
    }

    /// Coriolis acceleration in the body frame for a body-frame velocity,
    /// `2 (q⁻¹ ω_earth_local) × v`.
    pub fn coriolis_accel(
        &self,
        v_b_m_s: &Vector3<f64>,
        quat_lb: &UnitQuaternion<f64>,
    ) -> Vector3<f64> {
        let omega_b = quat_lb.inverse_transform_vector(&self.omega_earth_local);
        2.0 * omega_b.cross(v_b_m_s)
    }

    /// Geodetic coordinate (latitude, longitude) in degrees of a point given
    /// in the local east/north plane, correcting for magnetic declination.
    pub fn latlon_of(&self, east_m: f64, north_m: f64) -> (f64, f64) {
        let lat2met = deg_to_meters_at(self.latitude_deg);
        let lon2met = lat2met * self.latitude_deg.to_radians().cos();

        let (sinm, cosm) = self.mag_declination_deg.to_radians().sin_cos();
        let east_true = cosm * east_m - sinm * north_m;
        let north_true = sinm * east_m + cosm * north_m;

        (
            self.latitude_deg + north_true / lat2met,
            self.longitude_deg + east_true / lon2met,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::vector;

    #[test]
    fn test_earth_radius_bounds() {
        assert_relative_eq!(earth_radius_at(0.0), EARTH_RADIUS_A, epsilon = 1.0);
        assert_relative_eq!(earth_radius_at(90.0), EARTH_RADIUS_B, epsilon = 1.0);
        let r45 = earth_radius_at(45.0);
        assert!(r45 > EARTH_RADIUS_B && r45 < EARTH_RADIUS_A);
    }

    #[test]
    fn test_omega_local_at_pole_and_equator() {
        // At the north pole the rotation vector is straight up
        let env = Environment::new(90.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(env.omega_earth_local().x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(env.omega_earth_local().y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(env.omega_earth_local().z, EARTH_OMEGA, epsilon = 1e-12);

        // At the equator it lies in the horizontal plane, pointing north
        let env = Environment::new(0.0, 0.0, 0.0, 0.0);
        assert_relative_eq!(env.omega_earth_local().y, EARTH_OMEGA, epsilon = 1e-12);
        assert_relative_eq!(env.omega_earth_local().z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_coriolis_is_perpendicular_to_velocity() {
        let env = Environment::new(35.0, 139.0, 0.0, 0.0);
        let q = UnitQuaternion::identity();
        let v = vector![100.0, 5.0, -3.0];
        let a = env.coriolis_accel(&v, &q);
        assert_relative_eq!(a.dot(&v), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_latlon_roundtrip_scale() {
        let env = Environment::new(35.0, 139.0, 0.0, 0.0);
        let lat2met = deg_to_meters_at(35.0);

        // one degree of latitude north of the origin
        let (lat, lon) = env.latlon_of(0.0, lat2met);
        assert_relative_eq!(lat, 36.0, epsilon = 1e-9);
        assert_relative_eq!(lon, 139.0, epsilon = 1e-9);
    }
}
