//! Standard atmosphere, layered up to the lower thermosphere.

/// Specific gas constant of dry air [J/(kg·K)].
const R_AIR: f64 = 287.15;
/// Gravitational acceleration used by the pressure laws [m/s²].
const G0: f64 = 9.81;
/// Heat capacity ratio of air.
const GAMMA_AIR: f64 = 1.4;

#[derive(Debug, Clone)]
pub struct AtmosphereProperties {
    pub temperature_k: f64,
    pub pressure_pa: f64,
    pub density_kg_m3: f64,
    pub speed_of_sound_m_s: f64,
}

pub trait Atmosphere {
    fn temperature_k(&self, alt_m: f64) -> f64;
    fn pressure_pa(&self, alt_m: f64) -> f64;

    fn density_kg_m3(&self, alt_m: f64) -> f64 {
        self.pressure_pa(alt_m) / (R_AIR * self.temperature_k(alt_m))
    }

    fn speed_of_sound_m_s(&self, alt_m: f64) -> f64 {
        (GAMMA_AIR * R_AIR * self.temperature_k(alt_m)).sqrt()
    }

    fn properties(&self, alt_m: f64) -> AtmosphereProperties {
        AtmosphereProperties {
            temperature_k: self.temperature_k(alt_m),
            pressure_pa: self.pressure_pa(alt_m),
            density_kg_m3: self.density_kg_m3(alt_m),
            speed_of_sound_m_s: self.speed_of_sound_m_s(alt_m),
        }
    }
}

pub fn mach_number(v_air_norm_m_s: f64, speed_of_sound_m_s: f64) -> f64 {
    v_air_norm_m_s / speed_of_sound_m_s
}

/// Piecewise standard atmosphere: each layer is either a fixed lapse rate
/// with a pressure power law, or isothermal with an exponential pressure
/// law. Layer base values are propagated recursively from the surface.
#[derive(Debug, Clone)]
pub struct LayeredAtmosphere {
    temperature_surface_k: f64,
    pressure_surface_pa: f64,
}

impl Default for LayeredAtmosphere {
    fn default() -> Self {
        LayeredAtmosphere {
            temperature_surface_k: 298.0,
            pressure_surface_pa: 1.013e5,
        }
    }
}

impl LayeredAtmosphere {
    pub fn new(temperature_surface_k: f64, pressure_surface_pa: f64) -> Self {
        LayeredAtmosphere {
            temperature_surface_k,
            pressure_surface_pa,
        }
    }

    /// Temperature [K] and pressure [Pa] at altitude `h` [m].
    fn temperature_pressure(&self, h: f64) -> (f64, f64) {
        if h <= 11.0e3 {
            // troposphere
            self.gradient_layer(h, 0.0, self.temperature_surface_k, self.pressure_surface_pa, -0.0065)
        } else if h <= 20.0e3 {
            // tropopause
            self.isothermal_layer(h, 11.0e3)
        } else if h <= 32.0e3 {
            self.gradient_from(h, 20.0e3, 0.001)
        } else if h <= 47.0e3 {
            self.gradient_from(h, 32.0e3, 0.0028)
        } else if h <= 51.0e3 {
            // stratopause
            self.isothermal_layer(h, 47.0e3)
        } else if h <= 71.0e3 {
            self.gradient_from(h, 51.0e3, -0.0028)
        } else if h <= 85.0e3 {
            self.gradient_from(h, 71.0e3, -0.002)
        } else if h <= 90.0e3 {
            // mesopause
            self.isothermal_layer(h, 85.0e3)
        } else if h <= 110.0e3 {
            self.gradient_from(h, 90.0e3, 0.0026675)
        } else {
            self.temperature_pressure(110.0e3)
        }
    }

    fn gradient_from(&self, h: f64, h_base: f64, lapse: f64) -> (f64, f64) {
        let (t_base, p_base) = self.temperature_pressure(h_base);
        self.gradient_layer(h, h_base, t_base, p_base, lapse)
    }

    fn gradient_layer(
        &self,
        h: f64,
        h_base: f64,
        t_base: f64,
        p_base: f64,
        lapse: f64,
    ) -> (f64, f64) {
        let t = t_base + lapse * (h - h_base);
        let p = p_base * (t / t_base).powf(-G0 / (lapse * R_AIR));
        (t, p)
    }

    fn isothermal_layer(&self, h: f64, h_base: f64) -> (f64, f64) {
        let (t, p_base) = self.temperature_pressure(h_base);
        let p = p_base * (-G0 / (R_AIR * t) * (h - h_base)).exp();
        (t, p)
    }
}

impl Atmosphere for LayeredAtmosphere {
    fn temperature_k(&self, alt_m: f64) -> f64 {
        self.temperature_pressure(alt_m).0
    }

    fn pressure_pa(&self, alt_m: f64) -> f64 {
        self.temperature_pressure(alt_m).1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_surface_values() {
        let atm = LayeredAtmosphere::default();
        assert_relative_eq!(atm.temperature_k(0.0), 298.0);
        assert_relative_eq!(atm.pressure_pa(0.0), 1.013e5);
        assert_relative_eq!(
            atm.density_kg_m3(0.0),
            1.013e5 / (R_AIR * 298.0),
            epsilon = 1e-9
        );
        // a = sqrt(1.4 R T) ≈ 346 m/s at 298 K
        assert_relative_eq!(atm.speed_of_sound_m_s(0.0), 346.1, epsilon = 0.1);
    }

    #[test]
    fn test_troposphere_lapse() {
        let atm = LayeredAtmosphere::default();
        assert_relative_eq!(atm.temperature_k(1000.0), 298.0 - 6.5, epsilon = 1e-9);
        assert_relative_eq!(atm.temperature_k(11.0e3), 298.0 - 71.5, epsilon = 1e-9);
    }

    #[test]
    fn test_tropopause_isothermal() {
        let atm = LayeredAtmosphere::default();
        assert_relative_eq!(atm.temperature_k(15.0e3), atm.temperature_k(11.0e3));
        assert!(atm.pressure_pa(15.0e3) < atm.pressure_pa(11.0e3));
    }

    #[test]
    fn test_pressure_monotonically_decreases() {
        let atm = LayeredAtmosphere::default();
        let mut last = atm.pressure_pa(0.0);
        for i in 1..120 {
            let p = atm.pressure_pa(i as f64 * 1000.0);
            assert!(p <= last, "pressure must not increase with altitude");
            last = p;
        }
    }

    #[test]
    fn test_clamped_above_model_top() {
        let atm = LayeredAtmosphere::default();
        assert_relative_eq!(atm.temperature_k(150.0e3), atm.temperature_k(110.0e3));
        assert_relative_eq!(atm.pressure_pa(150.0e3), atm.pressure_pa(110.0e3));
    }
}
