//! # Simulator Interface
//!
//! This crate provides the interface between the controller executable and
//! the driving simulator: the telemetry and command message types, the
//! socket.io-style `42[...]` envelope codec, and a blocking WebSocket server
//! wrapper.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod net;
pub mod telemetry;
