//! Flight phase machine and trajectory integration.
//!
//! The 13-state dynamics are integrated with a fixed-step RK4. Phase
//! transitions are evaluated exactly once per accepted step, against the
//! state the previous step produced, so the derivative function itself
//! stays side-effect free.

use nalgebra::{Quaternion, SVector, Vector3, vector};
use serde::Serialize;
use strum::AsRefStr;

use crate::math::ode::{OdeProblem, OdeSolver, RungeKutta4};
use crate::sim::aero::{AeroModel, AeroState};
use crate::sim::atmosphere::{mach_number, Atmosphere};
use crate::sim::engine::PropellantProfile;
use crate::sim::environment::Environment;
use crate::sim::events::{FlightEvent, FlightEventLog, FlightMilestone};
use crate::sim::launcher::RailGeometry;
use crate::sim::parachute::Parachute;
use crate::sim::rocket::{RocketSpecification, RocketState};
use crate::sim::wind::Wind;

/// Progression of a nominal flight. Transitions only ever move forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, AsRefStr, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FlightPhase {
    /// Both lugs constrained to the rail, motion along the body x axis only.
    OnRail,
    /// Lower lug free, vehicle pivots about the upper lug.
    FirstLugOff,
    /// Free flight under thrust.
    Powered,
    /// Free flight after burnout.
    Coasting,
    /// Drogue out, attitude frozen.
    DrogueDeployed,
    /// Main canopy out, attitude frozen.
    ParachuteDeployed,
    /// Touchdown, state held constant.
    Landed,
}

/// Everything the derivative function needs, borrowed for one flight.
pub struct FlightModels<'a> {
    pub spec: &'a RocketSpecification,
    pub engine: &'a PropellantProfile,
    pub aero: &'a AeroModel,
    pub atmosphere: &'a dyn Atmosphere,
    pub wind: &'a Wind,
    pub environment: &'a Environment,
    pub rail: &'a RailGeometry,
    pub drogue: Option<&'a Parachute>,
    pub parachute: &'a Parachute,
}

/// The flight dynamics at a fixed phase. The solver updates `phase`
/// between steps; within a step the derivative is a pure function.
pub struct FlightDynamics<'a> {
    models: &'a FlightModels<'a>,
    phase: FlightPhase,
    moi_rate_dt_s: f64,
}

const MOI_FLOOR: f64 = 1e-10;

impl<'a> FlightDynamics<'a> {
    pub fn new(models: &'a FlightModels<'a>, moi_rate_dt_s: f64) -> Self {
        FlightDynamics {
            models,
            phase: FlightPhase::OnRail,
            moi_rate_dt_s,
        }
    }

    pub fn phase(&self) -> FlightPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: FlightPhase) {
        self.phase = phase;
    }

    /// Airflow velocity relative to the vehicle, in the body frame.
    fn v_air_b(&self, state: &RocketState) -> Vector3<f64> {
        let wind_l = self.models.wind.velocity(state.altitude_m());
        state.quat_lb().inverse_transform_vector(&wind_l) - state.vel_b_m_s()
    }
}

impl OdeProblem<13> for FlightDynamics<'_> {
    fn odefun(&self, t: f64, y: SVector<f64, 13>) -> SVector<f64, 13> {
        if self.phase == FlightPhase::Landed {
            return SVector::zeros();
        }

        let m = self.models;
        let state = RocketState(y);
        let v_b = state.vel_b_m_s();
        let quat = state.quat_lb();
        let omega = state.angvel_b_rad_s();
        let alt = state.altitude_m();

        let mass = m.spec.mass_kg(m.engine, t);
        let cg = m.spec.cg_m(m.engine, t);
        let moi = m.spec.moi_kgm2(m.engine, t);
        // forward difference over the burn tables
        let dmoi_dt = (m.spec.moi_kgm2(m.engine, t + self.moi_rate_dt_s) - moi)
            / self.moi_rate_dt_s;

        let v_air = self.v_air_b(&state);
        let props = m.atmosphere.properties(alt);
        let mach = mach_number(v_air.norm(), props.speed_of_sound_m_s);

        let aero = m.aero.actions(&AeroState {
            v_air_b_m_s: v_air,
            angvel_b_rad_s: omega,
            density_kg_m3: props.density_kg_m3,
            mach,
            cg_m: cg,
        });

        let g_b = quat.inverse_transform_vector(&m.environment.gravity(alt));
        let coriolis = m.environment.coriolis_accel(&v_b, &quat);

        // translational dynamics, body frame
        let dv_dt = match self.phase {
            FlightPhase::OnRail | FlightPhase::FirstLugOff => {
                let f_body = aero.force_b_n + m.engine.thrust_b(t);
                let mut dv = -omega.cross(&v_b) + g_b + f_body / mass;
                // lugs constrain motion to the rail axis, forward only
                dv.y = 0.0;
                dv.z = 0.0;
                if dv.x < 0.0 {
                    dv.x = 0.0;
                }
                dv
            }
            FlightPhase::Powered => {
                -omega.cross(&v_b)
                    + g_b
                    + coriolis
                    + (aero.force_b_n + m.engine.thrust_b(t)) / mass
            }
            FlightPhase::Coasting => {
                -omega.cross(&v_b) + g_b + coriolis + aero.force_b_n / mass
            }
            FlightPhase::DrogueDeployed => {
                let drogue = self.models.drogue.expect("phase requires a drogue");
                g_b + coriolis + drogue.drag_force(&v_air, props.density_kg_m3) / mass
            }
            FlightPhase::ParachuteDeployed => {
                g_b + coriolis + m.parachute.drag_force(&v_air, props.density_kg_m3) / mass
            }
            FlightPhase::Landed => unreachable!(),
        };

        // attitude stops evolving once a canopy is out
        let under_canopy = matches!(
            self.phase,
            FlightPhase::DrogueDeployed | FlightPhase::ParachuteDeployed
        );
        let omega_attitude = if under_canopy { Vector3::zeros() } else { omega };
        let dq_dt =
            (quat.into_inner() * Quaternion::from_imag(omega_attitude) * 0.5).coords;

        // angular dynamics, diagonal inertia
        let domega_dt = match self.phase {
            FlightPhase::OnRail
            | FlightPhase::DrogueDeployed
            | FlightPhase::ParachuteDeployed => Vector3::zeros(),
            _ => {
                let mut moment = aero.moment_b_nm;
                let mut moi_eff = moi;
                if self.phase == FlightPhase::FirstLugOff {
                    // upper lug still on the rail: moments and inertia are
                    // taken about the lug instead of the CG
                    let lug_to_cg = vector![m.spec.lug_2nd_m - cg, 0.0, 0.0];
                    moment += lug_to_cg.cross(&aero.force_b_n);
                    moment += lug_to_cg.cross(&(mass * g_b));
                    let r2 = (m.spec.lug_2nd_m - cg).powi(2);
                    moi_eff += mass * vector![0.0, r2, r2];
                }
                let floored = moi_eff.add_scalar(MOI_FLOOR);
                (-omega.cross(&moi_eff.component_mul(&omega))
                    - dmoi_dt.component_mul(&omega)
                    + moment)
                    .component_div(&floored)
            }
        };

        let dx_dt = quat.transform_vector(&v_b);

        let mut du = SVector::<f64, 13>::zeros();
        du.fixed_rows_mut::<3>(0).set_column(0, &dx_dt);
        du.fixed_rows_mut::<3>(3).set_column(0, &dv_dt);
        du.fixed_rows_mut::<4>(6).set_column(0, &dq_dt);
        du.fixed_rows_mut::<3>(10).set_column(0, &domega_dt);
        du
    }
}

/// One sampled point of the flight, the full 13-element state flattened
/// for CSV export. Velocity is reported in the local frame; the quaternion
/// rotates body into local (`[i, j, k, w]`); angular rates are body-frame.
#[derive(Debug, Clone, Serialize)]
pub struct TrajectorySample {
    pub t_s: f64,
    pub phase: FlightPhase,
    pub x_m: f64,
    pub y_m: f64,
    pub z_m: f64,
    pub vx_m_s: f64,
    pub vy_m_s: f64,
    pub vz_m_s: f64,
    pub qx: f64,
    pub qy: f64,
    pub qz: f64,
    pub qw: f64,
    pub wx_rad_s: f64,
    pub wy_rad_s: f64,
    pub wz_rad_s: f64,
    pub mach: f64,
    pub q_dyn_pa: f64,
}

#[derive(Debug)]
pub struct TrajectoryResult {
    pub samples: Vec<TrajectorySample>,
    pub events: FlightEventLog,
    pub final_phase: FlightPhase,
}

impl TrajectoryResult {
    /// True when the flight reached the ground within the simulated window.
    pub fn is_complete(&self) -> bool {
        self.final_phase == FlightPhase::Landed
    }

    pub fn landing_pos_l_m(&self) -> Option<Vector3<f64>> {
        self.events
            .get(FlightMilestone::Landing)
            .map(|e| Vector3::from(e.pos_l_m))
    }

    pub fn max_altitude_m(&self) -> Option<f64> {
        self.events.get(FlightMilestone::Apogee).map(|e| e.altitude_m)
    }

    pub fn max_mach(&self) -> Option<f64> {
        self.events.get(FlightMilestone::MaxMach).and_then(|e| e.mach)
    }

    pub fn max_dynamic_pressure(&self) -> Option<f64> {
        self.events
            .get(FlightMilestone::MaxDynamicPressure)
            .and_then(|e| e.q_dyn_pa)
    }

    /// Geodetic landing point in degrees, `(lat, lon)`.
    pub fn landing_latlon(&self) -> Option<(f64, f64)> {
        self.events
            .get(FlightMilestone::Landing)
            .and_then(|e| e.latlon_deg)
            .map(|ll| (ll[0], ll[1]))
    }

    pub fn flight_duration_s(&self) -> Option<f64> {
        self.events.get(FlightMilestone::Landing).map(|e| e.t_s)
    }
}

#[derive(Debug, Clone)]
pub struct TrajectorySolver {
    dt_s: f64,
    max_t_s: f64,
    moi_rate_dt_s: f64,
}

/// The rail and lug-off transients need a finer grid than the rest of
/// the flight; the first seconds are stepped at a tenth of `dt`.
const FINE_GRID_END_S: f64 = 3.0;

impl TrajectorySolver {
    pub fn new(dt_s: f64, max_t_s: f64, moi_rate_dt_s: f64) -> Self {
        TrajectorySolver {
            dt_s,
            max_t_s,
            moi_rate_dt_s,
        }
    }

    fn time_grid(&self) -> Vec<f64> {
        let mut t = Vec::new();
        let fine = self.dt_s / 10.0;
        let mut x = 0.0;
        while x < FINE_GRID_END_S.min(self.max_t_s) {
            t.push(x);
            x += fine;
        }
        let mut x = FINE_GRID_END_S;
        while x < self.max_t_s {
            t.push(x);
            x += self.dt_s;
        }
        t
    }

    pub fn run(&self, models: &FlightModels<'_>) -> TrajectoryResult {
        let grid = self.time_grid();
        let solver = RungeKutta4;
        let mut dynamics = FlightDynamics::new(models, self.moi_rate_dt_s);
        let mut events = FlightEventLog::new();
        let mut t_apogee: Option<f64> = None;
        let mut max_mach = f64::NEG_INFINITY;
        let mut max_q = f64::NEG_INFINITY;
        let mut max_air_speed = f64::NEG_INFINITY;

        let mut state = RocketState::on_rail(&models.rail.quat_initial_lb);
        let mut samples = Vec::with_capacity(grid.len());

        let ignition = FlightEvent::at(0.0, &state.pos_l_m());
        events
            .record(FlightMilestone::Ignition, ignition)
            .expect("first event of the log");

        for (i, &t) in grid.iter().enumerate() {
            let phase = self.advance_phase(
                &mut dynamics,
                t,
                &state,
                models,
                &mut events,
                t_apogee,
            );

            // apogee fires once, at the first downward vertical velocity
            if t_apogee.is_none() && phase > FlightPhase::OnRail {
                let v_l = state.vel_l_m_s();
                if v_l.z < 0.0 {
                    t_apogee = Some(t);
                    events
                        .record(
                            FlightMilestone::Apogee,
                            FlightEvent::at(t, &state.pos_l_m()).with_velocity(&v_l),
                        )
                        .expect("apogee flag guards the milestone");
                }
            }

            let (air_speed, mach, q_dyn) = self.airflow_numbers(models, &dynamics, &state);
            if mach > max_mach {
                max_mach = mach;
                events.record_or_replace(
                    FlightMilestone::MaxMach,
                    FlightEvent::at(t, &state.pos_l_m()).with_mach(mach),
                );
            }
            if q_dyn > max_q {
                max_q = q_dyn;
                events.record_or_replace(
                    FlightMilestone::MaxDynamicPressure,
                    FlightEvent::at(t, &state.pos_l_m()).with_q_dyn(q_dyn),
                );
            }
            if air_speed > max_air_speed {
                max_air_speed = air_speed;
                events.record_or_replace(
                    FlightMilestone::MaxAirSpeed,
                    FlightEvent::at(t, &state.pos_l_m()).with_air_speed(air_speed),
                );
            }

            let pos = state.pos_l_m();
            let vel = state.vel_l_m_s();
            let quat = state.quat_lb_vec();
            let angvel = state.angvel_b_rad_s();
            samples.push(TrajectorySample {
                t_s: t,
                phase,
                x_m: pos.x,
                y_m: pos.y,
                z_m: pos.z,
                vx_m_s: vel.x,
                vy_m_s: vel.y,
                vz_m_s: vel.z,
                qx: quat.x,
                qy: quat.y,
                qz: quat.z,
                qw: quat.w,
                wx_rad_s: angvel.x,
                wy_rad_s: angvel.y,
                wz_rad_s: angvel.z,
                mach,
                q_dyn_pa: q_dyn,
            });

            if phase == FlightPhase::Landed {
                break;
            }

            let dt = match grid.get(i + 1) {
                Some(&next) => next - t,
                None => break,
            };
            state = RocketState(solver.solve(&dynamics, t, dt, state.0));
            state.normalize_quat();
        }

        TrajectoryResult {
            samples,
            events,
            final_phase: dynamics.phase(),
        }
    }

    fn airflow_numbers(
        &self,
        models: &FlightModels<'_>,
        dynamics: &FlightDynamics<'_>,
        state: &RocketState,
    ) -> (f64, f64, f64) {
        let v_air = dynamics.v_air_b(state);
        let props = models.atmosphere.properties(state.altitude_m());
        let air_speed = v_air.norm();
        let mach = mach_number(air_speed, props.speed_of_sound_m_s);
        let q_dyn = 0.5 * props.density_kg_m3 * v_air.norm_squared();
        (air_speed, mach, q_dyn)
    }

    /// Applies at most one phase transition per step and records its
    /// milestone. Returns the phase in effect for this step.
    fn advance_phase(
        &self,
        dynamics: &mut FlightDynamics<'_>,
        t: f64,
        state: &RocketState,
        models: &FlightModels<'_>,
        events: &mut FlightEventLog,
        t_apogee: Option<f64>,
    ) -> FlightPhase {
        let alt = state.altitude_m();
        let phase = dynamics.phase();

        let next = match phase {
            FlightPhase::OnRail if models.rail.is_1st_lug_off(alt) => {
                Some((FlightPhase::FirstLugOff, FlightMilestone::FirstLugOff))
            }
            FlightPhase::FirstLugOff if models.rail.is_2nd_lug_off(alt) => {
                Some((FlightPhase::Powered, FlightMilestone::SecondLugOff))
            }
            FlightPhase::OnRail | FlightPhase::FirstLugOff | FlightPhase::Powered
                if t >= models.engine.cutoff_time() =>
            {
                Some((FlightPhase::Coasting, FlightMilestone::Burnout))
            }
            FlightPhase::Coasting => match models.drogue {
                Some(drogue) if drogue.deploy_satisfied(t, t_apogee, alt) => {
                    Some((FlightPhase::DrogueDeployed, FlightMilestone::DrogueDeploy))
                }
                None if models.parachute.deploy_satisfied(t, t_apogee, alt) => Some((
                    FlightPhase::ParachuteDeployed,
                    FlightMilestone::ParachuteDeploy,
                )),
                _ => None,
            },
            FlightPhase::DrogueDeployed
                if models.parachute.deploy_satisfied(t, t_apogee, alt) =>
            {
                Some((
                    FlightPhase::ParachuteDeployed,
                    FlightMilestone::ParachuteDeploy,
                ))
            }
            _ => None,
        };

        // touchdown pre-empts everything once the vehicle is off the rail
        if phase > FlightPhase::OnRail && phase < FlightPhase::Landed && alt < 0.0 && t > 0.0
        {
            let v_l = state.vel_l_m_s();
            let (lat, lon) = models.environment.latlon_of(state.pos_l_m().x, state.pos_l_m().y);
            events.record_or_replace(
                FlightMilestone::Landing,
                FlightEvent::at(t, &state.pos_l_m())
                    .with_velocity(&v_l)
                    .with_latlon(lat, lon),
            );
            dynamics.set_phase(FlightPhase::Landed);
            return FlightPhase::Landed;
        }

        if let Some((next_phase, milestone)) = next {
            let event = FlightEvent::at(t, &state.pos_l_m()).with_velocity(&state.vel_l_m_s());
            events.record_or_replace(milestone, event);
            dynamics.set_phase(next_phase);
            return next_phase;
        }

        phase
    }
}
