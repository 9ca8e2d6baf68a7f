//! # Model predictive control module
//!
//! MpcCtrl turns a latency-compensated vehicle state and a fitted reference
//! curve into the next steering and throttle demands. Each processing cycle
//! formulates a nonlinear program over a short prediction horizon - the
//! decision variables are the future vehicle states and actuations - and
//! solves it under the kinematic bicycle model, returning the first
//! actuation pair together with the predicted trajectory for visualisation.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod objective;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use objective::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of predicted states in the horizon.
///
/// `N * DT` should stay near 2 seconds.
pub const N: usize = 8;

/// Horizon timestep.
///
/// Units: seconds
pub const DT: f64 = 0.1;

/// Distance from the front axle to the centre of gravity.
///
/// Units: meters
pub const LF: f64 = 2.67;

/// Target cruise speed, in the simulator's speed units.
pub const REF_V: f64 = 50.0;

/// Number of state variables per horizon step.
pub const NUM_STATES: usize = 6;

/// Number of actuator variables per horizon step.
pub const NUM_ACTUATORS: usize = 2;

// The solver takes all state and actuator variables in a single vector laid
// out as one block per variable. These offsets make any entry addressable in
// O(1).
pub const X_START: usize = 0;
pub const Y_START: usize = X_START + N;
pub const PSI_START: usize = Y_START + N;
pub const V_START: usize = PSI_START + N;
pub const CTE_START: usize = V_START + N;
pub const EPSI_START: usize = CTE_START + N;
pub const DELTA_START: usize = EPSI_START + N;
pub const A_START: usize = DELTA_START + N - 1;

/// Total number of decision variables. N timesteps means N - 1 actuations.
pub const NUM_VARS: usize = NUM_STATES * N + NUM_ACTUATORS * (N - 1);

/// Total number of equality constraints: one block per state variable, with
/// the first entry of each block pinning the initial state and the remainder
/// holding the kinematic model residuals.
pub const NUM_CONSTRAINTS: usize = NUM_STATES * N;

/// Steering actuator limit (25 degrees).
///
/// Units: radians
pub const MAX_STEER_RAD: f64 = 0.436332;

/// Throttle actuator limit, unitless.
pub const MAX_THROTTLE: f64 = 1.0;

/// Bound magnitude used for the effectively unbounded state variables.
pub const STATE_BOUND: f64 = 1.0e19;

/// Wall-clock budget for a single solve.
///
/// Debug builds run the numerics well over an order of magnitude slower and
/// share the machine with parallel test threads, so they get a much larger
/// budget rather than a guaranteed timeout.
///
/// Units: seconds
#[cfg(not(debug_assertions))]
pub const SOLVE_CPU_TIME_S: f64 = 0.05;
#[cfg(debug_assertions)]
pub const SOLVE_CPU_TIME_S: f64 = 2.0;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during MpcCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum MpcCtrlError {
    #[error("Cost weights must be finite and non-negative, got {0:?}")]
    InvalidWeights([f64; NUM_WEIGHTS]),

    #[error("The input state or reference coefficients contain non-finite values")]
    NonFiniteInput,
}
