//! End-to-end flight scenarios with analytically checkable outcomes.

use approx::assert_relative_eq;
use nalgebra::Vector3;

use ballista::math::interp::BilinearTable;
use ballista::math::ode::{OdeSolver, RungeKutta4};
use ballista::sim::aero::{AeroCoefficients, AeroModel};
use ballista::sim::atmosphere::LayeredAtmosphere;
use ballista::sim::engine::PropellantProfile;
use ballista::sim::environment::Environment;
use ballista::sim::launcher::Launcher;
use ballista::sim::parachute::{DeployTrigger, Parachute};
use ballista::sim::rocket::{RocketSpecification, RocketState};
use ballista::sim::solver::{
    FlightDynamics, FlightModels, FlightPhase, TrajectorySolver,
};
use ballista::sim::events::FlightMilestone;
use ballista::sim::wind::Wind;

fn test_spec() -> RocketSpecification {
    RocketSpecification::new(
        1.8,
        0.1,
        8.0,
        0.9,
        1.4,
        Vector3::new(0.02, 2.0, 2.0),
        1.0,
        1.6,
        -0.02,
        -2.0,
    )
    .unwrap()
}

fn test_engine() -> PropellantProfile {
    let time: Vec<f64> = (0..=400).map(|i| i as f64 * 0.01).collect();
    let thrust: Vec<f64> = time
        .iter()
        .map(|&t| if t < 2.0 { 400.0 } else { 0.0 })
        .collect();
    PropellantProfile::new(
        &time,
        &thrust,
        0.01,
        0.0,
        0.8,
        Vector3::new(0.001, 0.02, 0.02),
    )
    .unwrap()
}

fn flat_cp_table() -> BilinearTable {
    BilinearTable::new(
        vec![0.0, 2.0],
        vec![0.0, std::f64::consts::PI],
        vec![vec![0.9, 0.9], vec![0.9, 0.9]],
    )
    .unwrap()
}

fn drag_aero() -> AeroModel {
    let coeffs = AeroCoefficients::new(
        vec![0.0, 2.0],
        vec![0.4, 0.4],
        vec![0.0, 2.0],
        vec![8.0, 8.0],
        flat_cp_table(),
        0.5,
    )
    .unwrap();
    AeroModel::new(coeffs, 0.1, 1.8, Vector3::new(-0.02, -2.0, -2.0))
}

fn zero_aero() -> AeroModel {
    let coeffs = AeroCoefficients::new(
        vec![0.0, 2.0],
        vec![0.0, 0.0],
        vec![0.0, 2.0],
        vec![0.0, 0.0],
        flat_cp_table(),
        0.0,
    )
    .unwrap();
    AeroModel::new(coeffs, 0.1, 1.8, Vector3::zeros())
}

fn main_chute() -> Parachute {
    Parachute::new(
        1.2,
        0.6,
        DeployTrigger {
            fall_time: Some(0.5),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn vertical_launch_tracks_rail_geometry() {
    let spec = test_spec();
    let engine = test_engine();
    let aero = zero_aero();
    let atmosphere = LayeredAtmosphere::default();
    let wind = Wind::Constant {
        velocity: [0.0, 0.0, 0.0],
    };
    let environment = Environment::new(35.0, 139.0, 0.0, 0.0);
    let launcher = Launcher::new(5.0, 0.0, 90.0).unwrap();
    let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));
    let parachute = main_chute();

    let models = FlightModels {
        spec: &spec,
        engine: &engine,
        aero: &aero,
        atmosphere: &atmosphere,
        wind: &wind,
        environment: &environment,
        rail: &rail,
        drogue: None,
        parachute: &parachute,
    };

    let result = TrajectorySolver::new(0.05, 600.0, 1e-3).run(&models);
    assert!(result.is_complete());

    // lug release altitudes bracket the rail-derived clearances, within
    // one fine-grid step of climb
    let first = result.events.get(FlightMilestone::FirstLugOff).unwrap();
    let second = result.events.get(FlightMilestone::SecondLugOff).unwrap();
    assert!(first.altitude_m > rail.height_1st_lug_off_m);
    assert!(first.altitude_m < rail.height_1st_lug_off_m + 0.5);
    assert!(second.altitude_m > rail.height_2nd_lug_off_m);
    assert!(second.altitude_m < rail.height_2nd_lug_off_m + 0.5);

    // no lateral drift through powered flight without wind or asymmetry
    let t_burnout = result.events.get(FlightMilestone::Burnout).unwrap().t_s;
    for s in result.samples.iter().filter(|s| s.t_s <= t_burnout) {
        assert_relative_eq!(s.x_m, 0.0, epsilon = 1e-6);
        assert_relative_eq!(s.y_m, 0.0, epsilon = 1e-6);
    }
}

#[test]
fn free_fall_apogee_matches_analytic_time() {
    // pure gravity: launch site at the pole aligns the vertical with the
    // spin axis, so the Coriolis term vanishes for vertical motion
    let spec = test_spec();
    let engine = test_engine();
    let aero = zero_aero();
    let atmosphere = LayeredAtmosphere::default();
    let wind = Wind::Constant {
        velocity: [0.0, 0.0, 0.0],
    };
    let environment = Environment::new(90.0, 0.0, 0.0, 0.0);
    let launcher = Launcher::new(5.0, 0.0, 90.0).unwrap();
    let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));
    let parachute = main_chute();

    let models = FlightModels {
        spec: &spec,
        engine: &engine,
        aero: &aero,
        atmosphere: &atmosphere,
        wind: &wind,
        environment: &environment,
        rail: &rail,
        drogue: None,
        parachute: &parachute,
    };

    let mut dynamics = FlightDynamics::new(&models, 1e-3);
    dynamics.set_phase(FlightPhase::Coasting);

    let v0 = 50.0;
    let mut state = RocketState::on_rail(&rail.quat_initial_lb);
    // body x is up on a vertical rail
    state.set_vel_b(&Vector3::new(v0, 0.0, 0.0));
    state.set_pos_l(&Vector3::new(0.0, 0.0, 100.0));

    // start past burnout so thrust, mass flow and inertia rate are zero
    let t0 = engine.cutoff_time() + 1.0;
    let dt = 1e-3;
    let rk4 = RungeKutta4;
    let mut t = t0;
    while state.vel_l_m_s().z > 0.0 {
        state = RocketState(rk4.solve(&dynamics, t, dt, state.0));
        t += dt;
        assert!(t - t0 < 10.0, "apogee never reached");
    }

    assert_relative_eq!(t - t0, v0 / 9.81, epsilon = 5e-3);
}

#[test]
fn unforced_rotation_keeps_quaternion_normalized() {
    let spec = test_spec();
    let engine = test_engine();
    let aero = zero_aero();
    let atmosphere = LayeredAtmosphere::default();
    let wind = Wind::Constant {
        velocity: [0.0, 0.0, 0.0],
    };
    let environment = Environment::new(90.0, 0.0, 0.0, 0.0);
    let launcher = Launcher::new(5.0, 0.0, 90.0).unwrap();
    let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));
    let parachute = main_chute();

    let models = FlightModels {
        spec: &spec,
        engine: &engine,
        aero: &aero,
        atmosphere: &atmosphere,
        wind: &wind,
        environment: &environment,
        rail: &rail,
        drogue: None,
        parachute: &parachute,
    };

    let mut dynamics = FlightDynamics::new(&models, 1e-3);
    dynamics.set_phase(FlightPhase::Coasting);

    let mut state = RocketState::on_rail(&rail.quat_initial_lb);
    state.set_pos_l(&Vector3::new(0.0, 0.0, 2000.0));
    state.set_angvel_b(&Vector3::new(1.0, 0.4, -0.2));

    let t0 = engine.cutoff_time() + 1.0;
    let dt = 1e-3;
    let rk4 = RungeKutta4;
    for i in 0..10_000 {
        state = RocketState(rk4.solve(&dynamics, t0 + i as f64 * dt, dt, state.0));
        state.normalize_quat();
        let norm = state.quat_lb_vec().norm();
        assert!((norm - 1.0).abs() < 1e-6, "norm drifted to {norm}");
    }
}

#[test]
fn steady_wind_drifts_descent_downwind() {
    let spec = test_spec();
    let engine = test_engine();
    let aero = zero_aero();
    let atmosphere = LayeredAtmosphere::default();
    // wind from the north
    let wind = Wind::from_speed_direction(5.0, 0.0);
    let environment = Environment::new(35.0, 139.0, 0.0, 0.0);
    let launcher = Launcher::new(5.0, 0.0, 90.0).unwrap();
    let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));
    let parachute = main_chute();

    let models = FlightModels {
        spec: &spec,
        engine: &engine,
        aero: &aero,
        atmosphere: &atmosphere,
        wind: &wind,
        environment: &environment,
        rail: &rail,
        drogue: None,
        parachute: &parachute,
    };

    let result = TrajectorySolver::new(0.05, 600.0, 1e-3).run(&models);
    assert!(result.is_complete());

    // a canopy carried by northerly wind lands south of the pad
    let landing = result.landing_pos_l_m().unwrap();
    assert!(landing.y < 0.0, "expected southward drift, got {landing:?}");
}

#[test]
fn short_grid_reports_incomplete_run() {
    let spec = test_spec();
    let engine = test_engine();
    let aero = drag_aero();
    let atmosphere = LayeredAtmosphere::default();
    let wind = Wind::Constant {
        velocity: [0.0, 0.0, 0.0],
    };
    let environment = Environment::new(35.0, 139.0, 0.0, 0.0);
    let launcher = Launcher::new(5.0, 0.0, 90.0).unwrap();
    let rail = launcher.bind(spec.lug_1st_m, spec.lug_2nd_m, spec.cg_m(&engine, 0.0));
    let parachute = main_chute();

    let models = FlightModels {
        spec: &spec,
        engine: &engine,
        aero: &aero,
        atmosphere: &atmosphere,
        wind: &wind,
        environment: &environment,
        rail: &rail,
        drogue: None,
        parachute: &parachute,
    };

    // grid ends during ascent
    let result = TrajectorySolver::new(0.05, 4.0, 1e-3).run(&models);
    assert!(!result.is_complete());
    assert!(result.events.get(FlightMilestone::Landing).is_none());
    assert!(result.flight_duration_s().is_none());
}
