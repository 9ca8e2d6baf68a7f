//! # Controller library.
//!
//! This library allows the executable, tests and benches to access the items
//! defined inside the controller crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Latency compensation - advances the reported vehicle state by the measured actuation delay
pub mod latency;

/// Model predictive control module - turns a reference curve and vehicle state into actuations
pub mod mpc_ctrl;

/// Nonlinear program solver - bounded interior-point optimisation with exact derivatives
pub mod nlp;

/// Reference trajectory fitting - vehicle-frame transform and polynomial fit of the waypoints
pub mod ref_traj;

/// Telemetry processor - runs the full control pipeline for one telemetry message
pub mod telem_proc;
