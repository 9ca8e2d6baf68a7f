//! # Latency compensation
//!
//! Commands reach the actuators roughly one actuation delay after the
//! telemetry they were computed from was sensed. Solving against the raw
//! reported state would therefore steer the car it used to be, not the car
//! it will be. This module measures the real round-trip delay and advances
//! the reported state through one step of the kinematic model before the
//! controller sees it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::time::Instant;

// Internal
use crate::mpc_ctrl::LF;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Wall-clock measurement of the delay between handling one telemetry
/// message and the next.
pub struct LatencyClock {
    then: Instant,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl LatencyClock {
    /// Start the clock.
    pub fn start() -> Self {
        Self {
            then: Instant::now(),
        }
    }

    /// Seconds elapsed since the clock was last restarted.
    pub fn measure(&self) -> f64 {
        self.then.elapsed().as_secs_f64()
    }

    /// Restart the clock, marking the handling time of the current message.
    pub fn restart(&mut self) {
        self.then = Instant::now();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Advance a world-frame state one kinematic step of `dt_s` seconds under
/// the last commanded actuation.
///
/// Returns the advanced `(x, y, psi, v)`. Cross-track and heading errors are
/// not propagated here - they are re-derived after the waypoint transform.
///
/// The heading integrates the negated steering because the commanded angle
/// arrives in the simulator's right-positive convention, while the horizon
/// model in `mpc_ctrl` integrates the raw left-positive value. The asymmetry
/// is intentional and matches observed simulator behaviour; see the module
/// notes in `mpc_ctrl::objective`.
pub fn predict_state(
    x: f64,
    y: f64,
    psi: f64,
    v: f64,
    steer_rad: f64,
    throttle: f64,
    dt_s: f64,
) -> (f64, f64, f64, f64) {
    let new_x = x + v * psi.cos() * dt_s;
    let new_y = y + v * psi.sin() * dt_s;
    let new_psi = psi + (v / LF) * (-steer_rad) * dt_s;
    let new_v = v + throttle * dt_s;

    (new_x, new_y, new_psi, new_v)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_straight_advance() {
        // Driving straight at 10 units/s for 0.2 s moves 2 units along +x
        let (x, y, psi, v) = predict_state(0.0, 0.0, 0.0, 10.0, 0.0, 0.0, 0.2);

        assert!((x - 2.0).abs() < 1e-12);
        assert_eq!(y, 0.0);
        assert_eq!(psi, 0.0);
        assert_eq!(v, 10.0);
    }

    #[test]
    fn test_zero_delay_is_identity() {
        let (x, y, psi, v) = predict_state(3.0, -1.0, 0.4, 12.0, 0.1, 0.5, 0.0);

        assert_eq!((x, y, psi, v), (3.0, -1.0, 0.4, 12.0));
    }

    #[test]
    fn test_steering_turns_against_command_sign() {
        // A positive (right, simulator convention) steering command must
        // reduce the heading
        let (_, _, psi, _) = predict_state(0.0, 0.0, 0.0, 10.0, 0.2, 0.0, 0.1);

        assert!(psi < 0.0);
    }

    #[test]
    fn test_throttle_changes_speed() {
        let (_, _, _, v) = predict_state(0.0, 0.0, 0.0, 10.0, 0.0, 0.5, 0.2);

        assert!((v - 10.1).abs() < 1e-12);
    }
}
