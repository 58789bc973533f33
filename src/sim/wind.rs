//! Deterministic wind profiles, a pure function of altitude.

use nalgebra::Vector3;
use serde::Deserialize;

use crate::math::interp::{interp, InterpMode};

/// Wind model variants. `Hybrid` composes two sub-variants with a linear
/// altitude blend, so the whole family stays a closed sum type.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum Wind {
    Constant {
        velocity: [f64; 3],
    },

    /// Power-law profile `w(h) = w_ref · (h / z0)^(1/n)`.
    PowerLaw {
        reference: [f64; 3],
        z0: f64,
        n: f64,
    },

    /// Forecast profile sampled over altitude, linearly interpolated and
    /// clamped to the first/last sample outside the sampled range.
    Table {
        altitudes: Vec<f64>,
        east: Vec<f64>,
        north: Vec<f64>,
        #[serde(default)]
        up: Vec<f64>,
    },

    /// `lower` below `h0`, `upper` above `h1`, linear weight in between.
    Hybrid {
        lower: Box<Wind>,
        upper: Box<Wind>,
        h0: f64,
        h1: f64,
        #[serde(default = "zero")]
        weight0: f64,
        #[serde(default = "one")]
        weight1: f64,
    },
}

fn zero() -> f64 {
    0.0
}

fn one() -> f64 {
    1.0
}

impl Wind {
    /// Constant wind from a speed and the compass direction it blows *from*.
    pub fn from_speed_direction(speed_m_s: f64, direction_deg: f64) -> Self {
        let dir = direction_deg.to_radians();
        Wind::Constant {
            velocity: [-speed_m_s * dir.sin(), -speed_m_s * dir.cos(), 0.0],
        }
    }

    pub fn velocity(&self, alt_m: f64) -> Vector3<f64> {
        match self {
            Wind::Constant { velocity } => Vector3::from_column_slice(velocity),

            Wind::PowerLaw { reference, z0, n } => {
                let h = alt_m.max(0.0);
                Vector3::from_column_slice(reference) * (h / z0).powf(1.0 / n)
            }

            Wind::Table {
                altitudes,
                east,
                north,
                up,
            } => Vector3::new(
                interp(altitudes, east, alt_m, &InterpMode::FirstLast),
                interp(altitudes, north, alt_m, &InterpMode::FirstLast),
                interp(altitudes, up, alt_m, &InterpMode::FirstLast),
            ),

            Wind::Hybrid {
                lower,
                upper,
                h0,
                h1,
                weight0,
                weight1,
            } => {
                let w = blend_weight(alt_m, *h0, *h1, *weight0, *weight1);
                lower.velocity(alt_m) * (1.0 - w) + upper.velocity(alt_m) * w
            }
        }
    }
}

fn blend_weight(h: f64, h0: f64, h1: f64, w0: f64, w1: f64) -> f64 {
    if h < h0 {
        w0
    } else if h < h1 {
        w0 + (w1 - w0) * (h - h0) / (h1 - h0)
    } else {
        w1
    }
}
