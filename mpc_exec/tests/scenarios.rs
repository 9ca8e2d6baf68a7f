//! End-to-end controller scenarios, driven through the telemetry processor
//! without the network layer.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use mpc_lib::mpc_ctrl::{
    InputData, MpcCtrl, Params, MAX_STEER_RAD, MAX_THROTTLE, N, REF_V, SOLVE_CPU_TIME_S,
};
use mpc_lib::ref_traj;
use mpc_lib::telem_proc;
use sim_if::telemetry::Telemetry;
use util::maths::poly_val;
use util::module::State;
use util::session::Session;

// ------------------------------------------------------------------------------------------------
// HELPERS
// ------------------------------------------------------------------------------------------------

/// Build an initialised controller with the given parameters.
fn init_mpc(params: Params) -> MpcCtrl {
    let session =
        Session::new("scenarios", "target/test_sessions").expect("session creation failed");

    let mut mpc = MpcCtrl::default();
    mpc.init(params, &session).expect("MpcCtrl init failed");

    mpc
}

/// Telemetry for a straight track along +x with the car at the origin.
fn straight_line_telemetry(speed: f64) -> Telemetry {
    Telemetry {
        ptsx: vec![0.0, 10.0, 20.0, 30.0, 40.0],
        ptsy: vec![0.0, 0.0, 0.0, 0.0, 0.0],
        x: 0.0,
        y: 0.0,
        psi: 0.0,
        speed,
        steering_angle: 0.0,
        throttle: 0.0,
    }
}

/// Telemetry for a parabolic left bend.
fn left_curve_telemetry(speed: f64) -> Telemetry {
    Telemetry {
        ptsx: vec![0.0, 10.0, 20.0, 30.0, 40.0],
        ptsy: vec![0.0, 1.0, 4.0, 9.0, 16.0],
        x: 0.0,
        y: 0.0,
        psi: 0.0,
        speed,
        steering_angle: 0.0,
        throttle: 0.0,
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[test]
fn test_straight_line() {
    let mut mpc = init_mpc(Params::default());
    let tm = straight_line_telemetry(0.0);

    let cmd = telem_proc::exec(&mut mpc, &tm, 0.0).expect("processing failed");

    // On a straight track from rest the car holds its heading and opens the
    // throttle toward cruise speed
    assert!(
        cmd.steering_angle.abs() < 0.05,
        "steering {} not near zero",
        cmd.steering_angle
    );
    assert!(cmd.throttle > 0.0, "throttle {} not positive", cmd.throttle);

    // The predicted trajectory covers every horizon step after the first
    assert_eq!(cmd.mpc_x.len(), N - 1);
    assert_eq!(cmd.mpc_y.len(), N - 1);

    // The reference line is sampled at exact 2.5 m spacing
    assert_eq!(cmd.next_x.len(), 25);
    for (i, x) in cmd.next_x.iter().enumerate() {
        assert_eq!(*x, i as f64 * 2.5);
    }
    for y in &cmd.next_y {
        assert!(y.abs() < 1e-9, "reference sample {} off a straight track", y);
    }
}

#[test]
fn test_actuations_respect_bounds() {
    let mut mpc = init_mpc(Params::default());

    let scenarios = [
        (straight_line_telemetry(0.0), 0.0),
        (straight_line_telemetry(30.0), 0.1),
        (left_curve_telemetry(10.0), 0.1),
        (left_curve_telemetry(45.0), 0.25),
    ];

    for (tm, latency_s) in scenarios.iter() {
        let cmd = telem_proc::exec(&mut mpc, tm, *latency_s).expect("processing failed");

        assert!(cmd.steering_angle.abs() <= 1.0);
        assert!(cmd.throttle.abs() <= MAX_THROTTLE + 1e-6);
    }
}

#[test]
fn test_left_curve() {
    // A short delay shifts the fit origin forward along the curve, which is
    // what gives the tangent its positive slope at the car
    let tm = left_curve_telemetry(10.0);
    let latency_s = 0.1;

    let px = tm.speed * latency_s;
    let (xs, ys) = ref_traj::to_vehicle_frame(&tm.ptsx, &tm.ptsy, px, 0.0, 0.0);
    let coeffs = ref_traj::polyfit(&xs, &ys, 3).expect("fit failed");

    // Leftward bend: positive curvature, heading error below zero
    assert!(coeffs[2] > 0.0, "c2 {} not positive", coeffs[2]);
    assert!(-coeffs[1].atan() < 0.0, "epsi not negative");

    let mut mpc = init_mpc(Params::default());
    let cmd = telem_proc::exec(&mut mpc, &tm, latency_s).expect("processing failed");

    // A left turn is negative in the outbound convention
    assert!(
        cmd.steering_angle < 0.0,
        "steering {} should be negative for a left bend",
        cmd.steering_angle
    );

    // The reference line samples are the fitted curve evaluated on the
    // 2.5 m grid
    for (i, y) in cmd.next_y.iter().enumerate() {
        let expected = poly_val(i as f64 * 2.5, &coeffs);
        assert!(
            (y - expected).abs() < 1e-12,
            "reference sample {} is {}, expected {}",
            i,
            y,
            expected
        );
    }
}

#[test]
fn test_latency_compensation_shifts_the_fit() {
    let tm = left_curve_telemetry(10.0);

    let (xs, ys) = ref_traj::to_vehicle_frame(&tm.ptsx, &tm.ptsy, 0.0, 0.0, 0.0);
    let cte_uncompensated = poly_val(0.0, &ref_traj::polyfit(&xs, &ys, 3).unwrap());

    // Zero delay leaves the transform untouched
    let (xs, ys) = ref_traj::to_vehicle_frame(&tm.ptsx, &tm.ptsy, tm.speed * 0.0, 0.0, 0.0);
    let cte_zero_delay = poly_val(0.0, &ref_traj::polyfit(&xs, &ys, 3).unwrap());
    assert_eq!(cte_uncompensated, cte_zero_delay);

    // A 0.2 s delay at 10 units/s advances the car 2 units along the track
    // and changes the error it should be solving against
    let (xs, ys) = ref_traj::to_vehicle_frame(&tm.ptsx, &tm.ptsy, tm.speed * 0.2, 0.0, 0.0);
    let cte_compensated = poly_val(0.0, &ref_traj::polyfit(&xs, &ys, 3).unwrap());
    assert!((cte_compensated - cte_uncompensated).abs() > 1e-6);
}

#[test]
fn test_solve_within_budget() {
    let mut mpc = init_mpc(Params::default());

    let input = InputData {
        state: [0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        coeffs: [0.0; 4],
    };

    let (out, report) = mpc.proc(&input).expect("proc failed");

    assert!(
        report.solver_status.is_success(),
        "solver status {:?}",
        report.solver_status
    );
    assert!(
        report.solve_time_s <= SOLVE_CPU_TIME_S,
        "solve took {} s",
        report.solve_time_s
    );
    assert!(out.steer_rad.abs() <= MAX_STEER_RAD + 1e-6);
}

#[test]
fn test_cruise_state_is_near_optimal() {
    // Already on the line at cruise speed: the solver should leave
    // everything alone
    let mut mpc = init_mpc(Params::default());

    let input = InputData {
        state: [0.0, 0.0, 0.0, REF_V, 0.0, 0.0],
        coeffs: [0.0; 4],
    };

    let (out, report) = mpc.proc(&input).expect("proc failed");

    assert!(report.obj_value < 1.0, "cost {} not near zero", report.obj_value);
    assert!(out.steer_rad.abs() < 1e-3);
    assert!(out.throttle.abs() < 1e-2);
}

#[test]
fn test_steering_saturates_on_extreme_curvature() {
    // A violent left bend with the steering penalties effectively disabled:
    // the demand must pin to the 25 degree limit, not pass it
    let mut params = Params::default();
    params.cte_weight = 500.0;
    params.heading_weight = 500.0;
    params.steer_weight = 0.01;
    params.steer_rate_weight = 0.01;

    let mut mpc = init_mpc(params);

    let input = InputData {
        state: [0.0, 0.0, 0.0, 30.0, 0.0, 0.0],
        coeffs: [0.0, 0.0, 0.2, 0.0],
    };

    let (out, report) = mpc.proc(&input).expect("proc failed");

    assert!(
        out.steer_rad <= MAX_STEER_RAD + 1e-6,
        "steering {} exceeds the bound",
        out.steer_rad
    );
    assert!(
        out.steer_rad >= MAX_STEER_RAD - 1e-3,
        "steering {} should sit on the bound",
        out.steer_rad
    );
    assert!(report.steer_saturated);
}

#[test]
fn test_tracking_weight_override_changes_priorities() {
    // Disabling the tracking weight mimics launching with `0` as the first
    // CLI argument
    let mut args_params = Params::default();
    args_params
        .apply_cli_overrides(&["0".to_string()])
        .expect("override failed");
    assert_eq!(args_params.cte_weight, 0.0);

    let tm = left_curve_telemetry(10.0);

    let mut tracking = init_mpc({
        let mut p = Params::default();
        p.cte_weight = 1000.0;
        p
    });
    let mut no_tracking = init_mpc(args_params);

    let cmd_tracking = telem_proc::exec(&mut tracking, &tm, 0.1).expect("processing failed");
    let cmd_no_tracking = telem_proc::exec(&mut no_tracking, &tm, 0.1).expect("processing failed");

    // Chasing the line costs steering effort; without the tracking term the
    // optimiser spends less of it, and still drives toward cruise speed
    assert!(cmd_tracking.steering_angle.abs() >= cmd_no_tracking.steering_angle.abs());
    assert!(cmd_no_tracking.throttle > 0.0);
}
