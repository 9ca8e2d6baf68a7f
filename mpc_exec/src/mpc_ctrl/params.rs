//! Parameters structure for MpcCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::warn;
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of tunable cost weights.
pub const NUM_WEIGHTS: usize = 7;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for model predictive control.
///
/// The seven weights scale the quadratic terms of the horizon cost. Their
/// spread over three orders of magnitude is intentional - the terms are
/// quadratic in differently-scaled physical quantities - and they must reach
/// the solver exactly as given, since external tuning relies on the raw
/// values.
#[derive(Debug, Clone, Copy)]
pub struct Params {
    /// Cross-track error weight (w0).
    pub cte_weight: f64,

    /// Heading error weight (w1).
    pub heading_weight: f64,

    /// Velocity error weight (w2).
    pub velocity_weight: f64,

    /// Steering magnitude weight (w3).
    pub steer_weight: f64,

    /// Throttle magnitude weight (w4).
    pub throttle_weight: f64,

    /// Steering smoothness weight (w5), applied to sequential differences.
    pub steer_rate_weight: f64,

    /// Throttle smoothness weight (w6), applied to sequential differences.
    pub throttle_rate_weight: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised while building the parameters.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("Weight argument {index} (\"{value}\") is not a number")]
    InvalidWeight { index: usize, value: String },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Params {
            cte_weight: 2.0,
            heading_weight: 10.0,
            velocity_weight: 5.0,
            steer_weight: 3000.0,
            throttle_weight: 100.0,
            steer_rate_weight: 500.0,
            throttle_rate_weight: 100.0,
        }
    }
}

impl Params {
    /// Return the weights as an array ordered by weight index.
    pub fn weights(&self) -> [f64; NUM_WEIGHTS] {
        [
            self.cte_weight,
            self.heading_weight,
            self.velocity_weight,
            self.steer_weight,
            self.throttle_weight,
            self.steer_rate_weight,
            self.throttle_rate_weight,
        ]
    }

    /// Override weights positionally from command line arguments.
    ///
    /// Arguments map onto weight indices in order, so passing fewer than
    /// [`NUM_WEIGHTS`] arguments keeps the remaining defaults. Surplus
    /// arguments are ignored with a warning.
    pub fn apply_cli_overrides(&mut self, args: &[String]) -> Result<(), ParamsError> {
        if args.len() > NUM_WEIGHTS {
            warn!(
                "Expected at most {} weight arguments, ignoring {} surplus",
                NUM_WEIGHTS,
                args.len() - NUM_WEIGHTS
            );
        }

        for (index, arg) in args.iter().take(NUM_WEIGHTS).enumerate() {
            let weight: f64 = arg.parse().map_err(|_| ParamsError::InvalidWeight {
                index,
                value: arg.clone(),
            })?;

            self.set_weight(index, weight);
        }

        Ok(())
    }

    /// Set the weight at the given index.
    fn set_weight(&mut self, index: usize, weight: f64) {
        match index {
            0 => self.cte_weight = weight,
            1 => self.heading_weight = weight,
            2 => self.velocity_weight = weight,
            3 => self.steer_weight = weight,
            4 => self.throttle_weight = weight,
            5 => self.steer_rate_weight = weight,
            6 => self.throttle_rate_weight = weight,
            _ => unreachable!("weight index out of range"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_default_weights() {
        let params = Params::default();
        assert_eq!(
            params.weights(),
            [2.0, 10.0, 5.0, 3000.0, 100.0, 500.0, 100.0]
        );
    }

    #[test]
    fn test_partial_cli_override() {
        let mut params = Params::default();
        let args: Vec<String> = vec!["0".into(), "20.5".into()];

        params.apply_cli_overrides(&args).unwrap();

        assert_eq!(
            params.weights(),
            [0.0, 20.5, 5.0, 3000.0, 100.0, 500.0, 100.0]
        );
    }

    #[test]
    fn test_invalid_cli_override() {
        let mut params = Params::default();
        let args: Vec<String> = vec!["2".into(), "fast".into()];

        assert!(params.apply_cli_overrides(&args).is_err());
    }
}
