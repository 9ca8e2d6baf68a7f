//! # Telemetry processor module
//!
//! The telemetry processor runs the full control pipeline for one telemetry
//! message: latency compensation, vehicle-frame transform, reference fit,
//! the MPC solve, and assembly of the outbound steer command.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, warn};
use thiserror::Error;

// Internal
use crate::latency;
use crate::mpc_ctrl::{InputData, MpcCtrl, MpcCtrlError};
use crate::ref_traj::{self, TrajFitError};
use sim_if::telemetry::{SteerCmd, Telemetry};
use util::maths::{clamp, deg_to_rad, poly_val};
use util::module::State;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Order of the reference curve fitted through the waypoints.
const REF_FIT_ORDER: usize = 3;

/// Number of reference line samples sent back for visualisation.
const NUM_REF_SAMPLES: usize = 25;

/// Spacing of the reference line samples along the vehicle-frame x axis.
///
/// Units: meters
const REF_SAMPLE_SPACING: f64 = 2.5;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised while processing a telemetry message.
#[derive(Debug, Error)]
pub enum TelemProcError {
    #[error("Reference fit failed: {0}")]
    Fit(#[from] TrajFitError),

    #[error("Control processing failed: {0}")]
    Ctrl(#[from] MpcCtrlError),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Process one telemetry message into a steer command.
///
/// `latency_s` is the measured delay between the previous response and this
/// message; the reported state is advanced by it before anything else
/// happens.
pub fn exec(
    mpc: &mut MpcCtrl,
    telemetry: &Telemetry,
    latency_s: f64,
) -> Result<SteerCmd, TelemProcError> {
    // Advance the reported state to where the car will be once this
    // command takes effect
    let (px, py, psi, v) = latency::predict_state(
        telemetry.x,
        telemetry.y,
        telemetry.psi,
        telemetry.speed,
        telemetry.steering_angle,
        telemetry.throttle,
        latency_s,
    );

    // Transform the waypoints into the vehicle frame and fit the reference
    // curve
    let (way_xs, way_ys) = ref_traj::to_vehicle_frame(&telemetry.ptsx, &telemetry.ptsy, px, py, psi);
    let coeffs = ref_traj::polyfit(&way_xs, &way_ys, REF_FIT_ORDER)?;

    // With the car at the vehicle-frame origin the cross track error is the
    // curve height at x = 0 and the heading error the negated tangent angle
    let cte = poly_val(0.0, &coeffs);
    let epsi = -coeffs[1].atan();

    debug!(
        "latency = {:.0} ms, cte = {:.3}, epsi = {:.4}",
        latency_s * 1.0e3,
        cte,
        epsi
    );

    let input = InputData {
        state: [0.0, 0.0, 0.0, v, cte, epsi],
        coeffs: [coeffs[0], coeffs[1], coeffs[2], coeffs[3]],
    };

    let (output, report) = mpc.proc(&input)?;

    if !report.solver_status.is_success() {
        warn!(
            "Solve finished as {:?} in {:.1} ms, forwarding best-effort command",
            report.solver_status,
            report.solve_time_s * 1.0e3
        );
    }

    // The simulator treats positive steering as a right turn and expects it
    // normalised by the 25 degree limit, so negate and scale
    let steering_angle = clamp(
        &(-output.steer_rad / deg_to_rad(25.0)),
        &-1.0,
        &1.0,
    );

    // Sample the fitted curve for the reference line display
    let mut next_x = Vec::with_capacity(NUM_REF_SAMPLES);
    let mut next_y = Vec::with_capacity(NUM_REF_SAMPLES);
    for i in 0..NUM_REF_SAMPLES {
        let x = i as f64 * REF_SAMPLE_SPACING;
        next_x.push(x);
        next_y.push(poly_val(x, &coeffs));
    }

    Ok(SteerCmd {
        steering_angle,
        throttle: output.throttle,
        mpc_x: output.traj_x,
        mpc_y: output.traj_y,
        next_x,
        next_y,
    })
}
