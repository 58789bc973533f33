//! Rocket mass properties and the 13-element flight state vector.
//!
//! State layout: position in the local frame (0..3), velocity in the body
//! frame (3..6), attitude quaternion rotating body into local (6..10,
//! nalgebra `[i, j, k, w]` storage) and body angular velocity (10..13).

use nalgebra::{Quaternion, SVector, UnitQuaternion, Vector3, Vector4};
use thiserror::Error;

use super::engine::PropellantProfile;

#[derive(Debug, Error)]
pub enum RocketError {
    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("lug positions must satisfy 0 <= 1st < 2nd <= height, got {lug_1st} and {lug_2nd}")]
    BadLugOrder { lug_1st: f64, lug_2nd: f64 },
}

/// Static airframe geometry and dry mass properties.
#[derive(Debug, Clone)]
pub struct RocketSpecification {
    pub height_m: f64,
    pub diameter_m: f64,
    pub area_m2: f64,
    pub mass_dry_kg: f64,
    /// Dry CG, measured from the nose tip.
    pub cg_dry_m: f64,
    /// Propellant CG, measured from the nose tip.
    pub cg_prop_m: f64,
    pub moi_dry_kgm2: Vector3<f64>,
    /// Lower rail lug position from the nose tip.
    pub lug_1st_m: f64,
    /// Upper rail lug position from the nose tip.
    pub lug_2nd_m: f64,
    /// Aerodynamic damping moment coefficients, [roll, pitch, pitch].
    pub cm_damping: Vector3<f64>,
}

impl RocketSpecification {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        height_m: f64,
        diameter_m: f64,
        mass_dry_kg: f64,
        cg_dry_m: f64,
        cg_prop_m: f64,
        moi_dry_kgm2: Vector3<f64>,
        lug_1st_m: f64,
        lug_2nd_m: f64,
        cm_roll: f64,
        cm_pitch: f64,
    ) -> Result<Self, RocketError> {
        for (name, value) in [
            ("height", height_m),
            ("diameter", diameter_m),
            ("dry mass", mass_dry_kg),
            ("dry CG", cg_dry_m),
            ("propellant CG", cg_prop_m),
        ] {
            if value <= 0.0 {
                return Err(RocketError::NonPositive { name, value });
            }
        }
        if lug_1st_m < 0.0 || lug_1st_m >= lug_2nd_m || lug_2nd_m > height_m {
            return Err(RocketError::BadLugOrder {
                lug_1st: lug_1st_m,
                lug_2nd: lug_2nd_m,
            });
        }

        Ok(RocketSpecification {
            height_m,
            diameter_m,
            area_m2: std::f64::consts::PI * (diameter_m / 2.0).powi(2),
            mass_dry_kg,
            cg_dry_m,
            cg_prop_m,
            moi_dry_kgm2,
            lug_1st_m,
            lug_2nd_m,
            cm_damping: Vector3::new(cm_roll, cm_pitch, cm_pitch),
        })
    }

    pub fn mass_kg(&self, engine: &PropellantProfile, t: f64) -> f64 {
        self.mass_dry_kg + engine.prop_mass(t)
    }

    /// Combined CG from the nose tip, shifting forward as propellant burns.
    pub fn cg_m(&self, engine: &PropellantProfile, t: f64) -> f64 {
        let m_prop = engine.prop_mass(t);
        (self.mass_dry_kg * self.cg_dry_m + m_prop * self.cg_prop_m)
            / (self.mass_dry_kg + m_prop)
    }

    /// Combined principal moments of inertia about the instantaneous CG.
    ///
    /// Dry and propellant contributions are shifted with the parallel axis
    /// theorem; the shift only affects the transverse (pitch/yaw) axes.
    pub fn moi_kgm2(&self, engine: &PropellantProfile, t: f64) -> Vector3<f64> {
        let m_prop = engine.prop_mass(t);
        let cg = self.cg_m(engine, t);

        let yz = Vector3::new(0.0, 1.0, 1.0);
        let shift_dry = yz * self.mass_dry_kg * (cg - self.cg_dry_m).powi(2);
        let shift_prop = yz * m_prop * (cg - self.cg_prop_m).powi(2);

        self.moi_dry_kgm2 + shift_dry + engine.prop_moi(t) + shift_prop
    }
}

#[derive(Debug, Default, Clone)]
pub struct RocketState(pub SVector<f64, 13>);

impl RocketState {
    pub fn on_rail(quat_lb: &UnitQuaternion<f64>) -> Self {
        let mut state = RocketState(SVector::zeros());
        state.set_quat_lb_vec(quat_lb.as_vector());
        state
    }

    pub fn pos_l_m(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(0).clone_owned()
    }

    pub fn vel_b_m_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(3).clone_owned()
    }

    pub fn vel_l_m_s(&self) -> Vector3<f64> {
        self.quat_lb().transform_vector(&self.vel_b_m_s())
    }

    pub fn quat_lb_vec(&self) -> Vector4<f64> {
        self.0.fixed_rows::<4>(6).clone_owned()
    }

    pub fn quat_lb(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_quaternion(Quaternion::from_vector(self.quat_lb_vec()))
    }

    pub fn angvel_b_rad_s(&self) -> Vector3<f64> {
        self.0.fixed_rows::<3>(10).clone_owned()
    }

    pub fn altitude_m(&self) -> f64 {
        self.0[2]
    }

    pub fn set_pos_l(&mut self, pos_l: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(0).set_column(0, pos_l);
    }

    pub fn set_vel_b(&mut self, vel_b: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(3).set_column(0, vel_b);
    }

    pub fn set_quat_lb_vec(&mut self, quat_lb: &Vector4<f64>) {
        self.0.fixed_rows_mut::<4>(6).set_column(0, quat_lb);
    }

    pub fn set_angvel_b(&mut self, angvel_b: &Vector3<f64>) {
        self.0.fixed_rows_mut::<3>(10).set_column(0, angvel_b);
    }

    pub fn normalize_quat(&mut self) {
        let n = self.quat_lb_vec().normalize();
        self.set_quat_lb_vec(&n);
    }
}
