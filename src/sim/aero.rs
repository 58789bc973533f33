//! Aerodynamic coefficient tables and force/moment synthesis.

use std::path::Path;

use nalgebra::{vector, Vector3};
use thiserror::Error;

use crate::math::interp::{interp, BilinearTable, InterpMode, TableError};

#[derive(Debug, Error)]
pub enum AeroError {
    #[error("coefficient table must hold matching mach/value columns")]
    MismatchedColumns,

    #[error("coefficient table is empty")]
    EmptyTable,

    #[error("center-of-pressure surface: {0}")]
    Surface(#[from] TableError),

    #[error("calibration reference evaluates to zero at mach {mach}, alpha {alpha_rad} rad")]
    DegenerateCalibration { mach: f64, alpha_rad: f64 },

    #[error("reading coefficient table: {0}")]
    Io(#[from] std::io::Error),

    #[error("parsing coefficient table: {0}")]
    Csv(#[from] csv::Error),

    #[error("coefficient table line {line}: expected numeric row")]
    BadRow { line: usize },
}

/// Mach/angle-of-attack indexed coefficient sources, each independently
/// scalable by a calibration factor fitted at one reference point.
#[derive(Debug, Clone)]
pub struct AeroCoefficients {
    mach_cd0: Vec<f64>,
    cd0: Vec<f64>,
    mach_clalpha: Vec<f64>,
    clalpha: Vec<f64>,
    cp_surface: BilinearTable,

    cd0_scale: f64,
    clalpha_scale: f64,
    cp_scale: f64,

    /// Amplitude of the angle-of-attack drag augmentation.
    cd_amplitude: f64,
}

impl AeroCoefficients {
    pub fn new(
        mach_cd0: Vec<f64>,
        cd0: Vec<f64>,
        mach_clalpha: Vec<f64>,
        clalpha: Vec<f64>,
        cp_surface: BilinearTable,
        cd_amplitude: f64,
    ) -> Result<Self, AeroError> {
        if mach_cd0.is_empty() || mach_clalpha.is_empty() {
            return Err(AeroError::EmptyTable);
        }
        if mach_cd0.len() != cd0.len() || mach_clalpha.len() != clalpha.len() {
            return Err(AeroError::MismatchedColumns);
        }

        Ok(AeroCoefficients {
            mach_cd0,
            cd0,
            mach_clalpha,
            clalpha,
            cp_surface,
            cd0_scale: 1.0,
            clalpha_scale: 1.0,
            cp_scale: 1.0,
            cd_amplitude,
        })
    }

    /// Loads the three coefficient sources from CSV files: two `mach,value`
    /// tables and one Mach×AoA surface (first row AoA in degrees, first
    /// column Mach).
    pub fn from_csv_files(
        cd0_path: &Path,
        clalpha_path: &Path,
        cp_path: &Path,
        cd_amplitude: f64,
    ) -> Result<Self, AeroError> {
        let (mach_cd0, cd0) = read_mach_table(cd0_path)?;
        let (mach_clalpha, clalpha) = read_mach_table(clalpha_path)?;
        let cp_surface = read_cp_surface(cp_path)?;
        Self::new(mach_cd0, cd0, mach_clalpha, clalpha, cp_surface, cd_amplitude)
    }

    /// Fits the zero-AoA drag scale so the table reproduces `cd0_ref` at
    /// `mach_ref`.
    pub fn calibrate_cd0(&mut self, cd0_ref: f64, mach_ref: f64) -> Result<(), AeroError> {
        let base = interp(&self.mach_cd0, &self.cd0, mach_ref, &InterpMode::FirstLast);
        if base == 0.0 {
            return Err(AeroError::DegenerateCalibration {
                mach: mach_ref,
                alpha_rad: 0.0,
            });
        }
        self.cd0_scale = cd0_ref / base;
        Ok(())
    }

    pub fn calibrate_clalpha(&mut self, clalpha_ref: f64, mach_ref: f64) -> Result<(), AeroError> {
        let base = interp(
            &self.mach_clalpha,
            &self.clalpha,
            mach_ref,
            &InterpMode::FirstLast,
        );
        if base == 0.0 {
            return Err(AeroError::DegenerateCalibration {
                mach: mach_ref,
                alpha_rad: 0.0,
            });
        }
        self.clalpha_scale = clalpha_ref / base;
        Ok(())
    }

    pub fn calibrate_cp(
        &mut self,
        cp_ref: f64,
        mach_ref: f64,
        alpha_ref_rad: f64,
    ) -> Result<(), AeroError> {
        let base = self.cp_surface.value(mach_ref, alpha_ref_rad);
        if base == 0.0 {
            return Err(AeroError::DegenerateCalibration {
                mach: mach_ref,
                alpha_rad: alpha_ref_rad,
            });
        }
        self.cp_scale = cp_ref / base;
        Ok(())
    }

    pub fn cd0(&self, mach: f64) -> f64 {
        interp(&self.mach_cd0, &self.cd0, mach, &InterpMode::FirstLast) * self.cd0_scale
    }

    pub fn clalpha(&self, mach: f64) -> f64 {
        interp(
            &self.mach_clalpha,
            &self.clalpha,
            mach,
            &InterpMode::FirstLast,
        ) * self.clalpha_scale
    }

    /// Drag coefficient with the AoA augmentation
    /// `Cd0 + A·(cos(2α+π)+1)`, monotone in α and peaking at 90°.
    pub fn cd(&self, mach: f64, alpha_rad: f64) -> f64 {
        self.cd0(mach) + self.cd_amplitude * ((2.0 * alpha_rad + std::f64::consts::PI).cos() + 1.0)
    }

    /// Lift coefficient `Clalpha·½·sin(2α)`: zero at 0° and 90°, with the
    /// tabulated small-angle slope.
    pub fn cl(&self, mach: f64, alpha_rad: f64) -> f64 {
        self.clalpha(mach) * 0.5 * (2.0 * alpha_rad).sin()
    }

    /// Center of pressure offset from the nose tip [m].
    pub fn cp(&self, mach: f64, alpha_rad: f64) -> f64 {
        self.cp_surface.value(mach, alpha_rad) * self.cp_scale
    }
}

/// Flow conditions for one force/moment evaluation, all in the body frame.
#[derive(Debug, Clone)]
pub struct AeroState {
    pub v_air_b_m_s: Vector3<f64>,
    pub angvel_b_rad_s: Vector3<f64>,
    pub density_kg_m3: f64,
    pub mach: f64,
    /// Current center of gravity from the nose tip [m].
    pub cg_m: f64,
}

#[derive(Debug, Clone)]
pub struct AeroActions {
    pub force_b_n: Vector3<f64>,
    pub moment_b_nm: Vector3<f64>,
    pub alpha_rad: f64,
    pub q_dyn_pa: f64,
}

/// Body geometry plus coefficient sources; synthesizes aerodynamic force
/// and moment for a given flow state.
#[derive(Debug, Clone)]
pub struct AeroModel {
    coeffs: AeroCoefficients,
    diameter_m: f64,
    height_m: f64,
    area_m2: f64,
    /// Damping moment coefficients `[roll, pitch, yaw]`.
    cm: Vector3<f64>,
}

impl AeroModel {
    pub fn new(coeffs: AeroCoefficients, diameter_m: f64, height_m: f64, cm: Vector3<f64>) -> Self {
        AeroModel {
            coeffs,
            diameter_m,
            height_m,
            area_m2: std::f64::consts::PI * (diameter_m / 2.0).powi(2),
            cm,
        }
    }

    pub fn coefficients(&self) -> &AeroCoefficients {
        &self.coeffs
    }

    pub fn area_m2(&self) -> f64 {
        self.area_m2
    }

    /// Angle of attack between the body x axis and the relative airflow.
    /// Defined as zero at zero airspeed so no NaN can escape the `acos`.
    pub fn alpha(v_air_b: &Vector3<f64>) -> f64 {
        let norm = v_air_b.norm();
        if norm == 0.0 {
            0.0
        } else {
            (v_air_b.x.abs() / norm).clamp(-1.0, 1.0).acos()
        }
    }

    pub fn actions(&self, state: &AeroState) -> AeroActions {
        let v_norm = state.v_air_b_m_s.norm();
        let alpha = Self::alpha(&state.v_air_b_m_s);
        // roll angle of the crossflow
        let phi = f64::atan2(-state.v_air_b_m_s.y, -state.v_air_b_m_s.z);

        let cd = self.coeffs.cd(state.mach, alpha);
        let cl = self.coeffs.cl(state.mach, alpha);
        let cp = self.coeffs.cp(state.mach, alpha);

        let (sina, cosa) = alpha.sin_cos();
        let coeff = vector![
            -cl * sina + cd * cosa,
            (cl * cosa + cd * sina) * phi.sin(),
            (cl * cosa + cd * sina) * phi.cos()
        ];

        let q_dyn = 0.5 * state.density_kg_m3 * v_norm.powi(2);
        let force_b = -q_dyn * self.area_m2 * coeff;

        // restoring moment about the CG
        let moment_restoring = vector![state.cg_m - cp, 0.0, 0.0].cross(&force_b);

        // damping moment, reference lengths [d, h, h]
        let l2 = vector![
            self.diameter_m.powi(2),
            self.height_m.powi(2),
            self.height_m.powi(2)
        ];
        let moment_damping = 0.25
            * state.density_kg_m3
            * v_norm
            * self.area_m2
            * self
                .cm
                .component_mul(&l2)
                .component_mul(&state.angvel_b_rad_s);

        AeroActions {
            force_b_n: force_b,
            moment_b_nm: moment_restoring + moment_damping,
            alpha_rad: alpha,
            q_dyn_pa: q_dyn,
        }
    }
}

fn read_mach_table(path: &Path) -> Result<(Vec<f64>, Vec<f64>), AeroError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'$'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut mach = Vec::new();
    let mut value = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let first = record.get(0).unwrap_or("");
        if first.starts_with('#') || first.starts_with('%') || first.is_empty() {
            continue;
        }
        let row = || AeroError::BadRow { line: i + 1 };
        mach.push(first.parse().map_err(|_| row())?);
        value.push(record.get(1).ok_or_else(row)?.parse().map_err(|_| row())?);
    }

    Ok((mach, value))
}

/// Surface CSV: first row is the AoA axis in degrees (first cell ignored),
/// each following row is a Mach value followed by CP samples.
fn read_cp_surface(path: &Path) -> Result<BilinearTable, AeroError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'$'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut alpha_axis_rad: Vec<f64> = Vec::new();
    let mut mach_axis = Vec::new();
    let mut rows = Vec::new();

    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let row = || AeroError::BadRow { line: i + 1 };

        if alpha_axis_rad.is_empty() {
            for field in record.iter().skip(1) {
                let deg: f64 = field.parse().map_err(|_| row())?;
                alpha_axis_rad.push(deg.to_radians());
            }
            continue;
        }

        let first = record.get(0).unwrap_or("");
        if first.is_empty() {
            continue;
        }
        mach_axis.push(first.parse().map_err(|_| row())?);
        let mut values = Vec::with_capacity(alpha_axis_rad.len());
        for field in record.iter().skip(1) {
            values.push(field.parse().map_err(|_| row())?);
        }
        rows.push(values);
    }

    Ok(BilinearTable::new(mach_axis, alpha_axis_rad, rows)?)
}
