use nalgebra::SVector;

/// A fixed-size system of first order ODEs, `dy/dt = f(t, y)`.
pub trait OdeProblem<const S: usize> {
    fn odefun(&self, t: f64, y: SVector<f64, S>) -> SVector<f64, S>;
}

/// Single-step integrator advancing a state by `dt`.
pub trait OdeSolver<const S: usize> {
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: SVector<f64, S>,
    ) -> SVector<f64, S>;
}

pub struct ForwardEuler;

impl<const S: usize> OdeSolver<S> for ForwardEuler {
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: SVector<f64, S>,
    ) -> SVector<f64, S> {
        y0 + problem.odefun(t0, y0) * dt
    }
}

pub struct RungeKutta4;

impl<const S: usize> OdeSolver<S> for RungeKutta4 {
    fn solve(
        &self,
        problem: &dyn OdeProblem<S>,
        t0: f64,
        dt: f64,
        y0: SVector<f64, S>,
    ) -> SVector<f64, S> {
        let hdt = dt / 2.0;
        let k1 = problem.odefun(t0, y0);
        let k2 = problem.odefun(t0 + hdt, y0 + k1 * hdt);
        let k3 = problem.odefun(t0 + hdt, y0 + k2 * hdt);
        let k4 = problem.odefun(t0 + dt, y0 + k3 * dt);

        y0 + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * dt / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    struct Decay;

    impl OdeProblem<1> for Decay {
        fn odefun(&self, _t: f64, y: SVector<f64, 1>) -> SVector<f64, 1> {
            -y
        }
    }

    #[test]
    fn test_rk4_decay() {
        let mut y = SVector::<f64, 1>::new(1.0);
        let dt = 0.01;
        for i in 0..100 {
            y = RungeKutta4.solve(&Decay, i as f64 * dt, dt, y);
        }
        assert_relative_eq!(y[0], (-1.0f64).exp(), epsilon = 1e-9);
    }

    #[test]
    fn test_euler_decay() {
        let mut y = SVector::<f64, 1>::new(1.0);
        let dt = 0.001;
        for i in 0..1000 {
            y = ForwardEuler.solve(&Decay, i as f64 * dt, dt, y);
        }
        assert_relative_eq!(y[0], (-1.0f64).exp(), epsilon = 1e-3);
    }
}
