use itertools::Itertools;
use num_traits::Num;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TableError {
    #[error("table axis must hold at least 2 samples, got {0}")]
    AxisTooShort(usize),

    #[error("table row count {rows} does not match axis length {axis}")]
    ShapeMismatch { rows: usize, axis: usize },
}

/// Behaviour of [`interp`] for query points outside the sampled domain.
#[derive(Debug, Clone, Copy)]
pub enum InterpMode<T: PartialOrd + Copy> {
    Extrapolate,

    FirstLast,

    Constant(T),
}

/// Piecewise-linear interpolation of `y(x)` at `xp`. `x` must be ascending.
pub fn interp<T>(x: &[T], y: &[T], xp: T, mode: &InterpMode<T>) -> T
where
    T: Num + PartialOrd + Copy,
{
    let n = x.len().min(y.len());

    if n == 0 {
        return T::zero();
    }
    if n == 1 {
        return y[0];
    }

    if xp < x[0] {
        match mode {
            InterpMode::FirstLast => return y[0],
            InterpMode::Constant(c) => return *c,
            InterpMode::Extrapolate => {}
        }
    } else if xp > x[n - 1] {
        match mode {
            InterpMode::FirstLast => return y[n - 1],
            InterpMode::Constant(c) => return *c,
            InterpMode::Extrapolate => {}
        }
    }

    let i = segment(&x[..n], xp);
    let slope = (y[i + 1] - y[i]) / (x[i + 1] - x[i]);
    y[i] + slope * (xp - x[i])
}

/// Index of the segment `[x[i], x[i+1]]` bracketing `xp`, clamped to the
/// first/last segment for points outside the domain.
fn segment<T>(x: &[T], xp: T) -> usize
where
    T: Num + PartialOrd + Copy,
{
    x.iter()
        .tuple_windows()
        .position(|(&a, &b)| a <= xp && xp <= b)
        .unwrap_or(if xp < x[0] { 0 } else { x.len() - 2 })
}

/// A 2-D surface `z(x, y)` sampled on a rectilinear grid, queried with
/// bilinear blending. Queries outside the grid clamp to the border values.
#[derive(Debug, Clone)]
pub struct BilinearTable {
    x: Vec<f64>,
    y: Vec<f64>,
    // row-major, rows follow `x`
    z: Vec<Vec<f64>>,
}

impl BilinearTable {
    pub fn new(x: Vec<f64>, y: Vec<f64>, z: Vec<Vec<f64>>) -> Result<Self, TableError> {
        if x.len() < 2 {
            return Err(TableError::AxisTooShort(x.len()));
        }
        if y.len() < 2 {
            return Err(TableError::AxisTooShort(y.len()));
        }
        if z.len() != x.len() {
            return Err(TableError::ShapeMismatch {
                rows: z.len(),
                axis: x.len(),
            });
        }
        for row in &z {
            if row.len() != y.len() {
                return Err(TableError::ShapeMismatch {
                    rows: row.len(),
                    axis: y.len(),
                });
            }
        }

        Ok(BilinearTable { x, y, z })
    }

    pub fn value(&self, xp: f64, yp: f64) -> f64 {
        let xp = xp.clamp(self.x[0], self.x[self.x.len() - 1]);
        let yp = yp.clamp(self.y[0], self.y[self.y.len() - 1]);

        let i = segment(&self.x, xp);
        let j = segment(&self.y, yp);

        let tx = (xp - self.x[i]) / (self.x[i + 1] - self.x[i]);
        let ty = (yp - self.y[j]) / (self.y[j + 1] - self.y[j]);

        let z00 = self.z[i][j];
        let z01 = self.z[i][j + 1];
        let z10 = self.z[i + 1][j];
        let z11 = self.z[i + 1][j + 1];

        z00 * (1.0 - tx) * (1.0 - ty)
            + z10 * tx * (1.0 - ty)
            + z01 * (1.0 - tx) * ty
            + z11 * tx * ty
    }
}
