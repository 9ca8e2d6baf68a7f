//! Horizon cost and kinematic model constraints.
//!
//! This is the callback handed to the solver. Entry 0 of `fg` is the scalar
//! cost; the remaining entries hold one constraint value per state variable
//! per horizon step. The body is written over a generic dual-number scalar
//! so the solver can extract exact derivatives from it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use num_dual::DualNum;

// Internal
use super::{
    A_START, CTE_START, DELTA_START, DT, EPSI_START, LF, N, NUM_CONSTRAINTS, NUM_WEIGHTS,
    PSI_START, REF_V, V_START, X_START, Y_START,
};
use crate::nlp::FgEval;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Cost and constraint evaluation over one prediction horizon.
pub struct HorizonEval {
    /// Reference curve coefficients, `coeffs[i]` the degree-i coefficient.
    coeffs: [f64; 4],

    /// Cost weights by weight index.
    weights: [f64; NUM_WEIGHTS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HorizonEval {
    /// Create a new evaluation over the given reference curve and weights.
    pub fn new(coeffs: [f64; 4], weights: [f64; NUM_WEIGHTS]) -> Self {
        Self { coeffs, weights }
    }
}

impl FgEval for HorizonEval {
    fn fg_len(&self) -> usize {
        1 + NUM_CONSTRAINTS
    }

    fn eval<D: DualNum<f64> + Copy>(&self, vars: &[D], fg: &mut [D]) {
        let zero = D::from(0.0);
        for entry in fg.iter_mut() {
            *entry = zero;
        }

        // The cost lives in entry 0. Reference errors first - these carry
        // the tracking weights
        for t in 0..N {
            let cte = vars[CTE_START + t];
            let epsi = vars[EPSI_START + t];
            let dv = vars[V_START + t] - REF_V;

            fg[0] += cte * cte * self.weights[0];
            fg[0] += epsi * epsi * self.weights[1];
            fg[0] += dv * dv * self.weights[2];
        }

        // Actuator magnitudes
        for t in 0..N - 1 {
            let delta = vars[DELTA_START + t];
            let a = vars[A_START + t];

            fg[0] += delta * delta * self.weights[3];
            fg[0] += a * a * self.weights[4];
        }

        // The gap between sequential actuations
        for t in 0..N - 2 {
            let ddelta = vars[DELTA_START + t + 1] - vars[DELTA_START + t];
            let da = vars[A_START + t + 1] - vars[A_START + t];

            fg[0] += ddelta * ddelta * self.weights[5];
            fg[0] += da * da * self.weights[6];
        }

        // Entry 0 of each constraint block pins the initial state
        fg[1 + X_START] = vars[X_START];
        fg[1 + Y_START] = vars[Y_START];
        fg[1 + PSI_START] = vars[PSI_START];
        fg[1 + V_START] = vars[V_START];
        fg[1 + CTE_START] = vars[CTE_START];
        fg[1 + EPSI_START] = vars[EPSI_START];

        // Kinematic model residuals: state at t must equal the state at
        // t - 1 advanced by the model under the actuation at t - 1. The
        // caller constrains every residual to zero.
        for t in 1..N {
            let x1 = vars[X_START + t];
            let y1 = vars[Y_START + t];
            let psi1 = vars[PSI_START + t];
            let v1 = vars[V_START + t];
            let cte1 = vars[CTE_START + t];
            let epsi1 = vars[EPSI_START + t];

            let x0 = vars[X_START + t - 1];
            let y0 = vars[Y_START + t - 1];
            let psi0 = vars[PSI_START + t - 1];
            let v0 = vars[V_START + t - 1];
            let epsi0 = vars[EPSI_START + t - 1];

            let delta0 = vars[DELTA_START + t - 1];
            let a0 = vars[A_START + t - 1];

            // Reference curve and its tangent angle at x0
            let f0 = x0 * x0 * x0 * self.coeffs[3]
                + x0 * x0 * self.coeffs[2]
                + x0 * self.coeffs[1]
                + self.coeffs[0];

            let psides0 = (x0 * x0 * (3.0 * self.coeffs[3])
                + x0 * (2.0 * self.coeffs[2])
                + self.coeffs[1])
                .atan();

            // Positive delta turns left here; the message layer flips the
            // sign for the simulator's convention
            fg[1 + X_START + t] = x1 - (x0 + v0 * psi0.cos() * DT);
            fg[1 + Y_START + t] = y1 - (y0 + v0 * psi0.sin() * DT);
            fg[1 + PSI_START + t] = psi1 - (psi0 + v0 * delta0 / LF * DT);
            fg[1 + V_START + t] = v1 - (v0 + a0 * DT);
            fg[1 + CTE_START + t] = cte1 - ((f0 - y0) + v0 * epsi0.sin() * DT);
            fg[1 + EPSI_START + t] = epsi1 - ((psi0 - psides0) + v0 * delta0 / LF * DT);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::mpc_ctrl::{Params, NUM_VARS};
    use crate::nlp::derivs;

    fn zero_vars() -> Vec<f64> {
        vec![0.0; NUM_VARS]
    }

    #[test]
    fn test_cruise_state_has_zero_cost() {
        // On the reference line at cruise speed with idle actuators the cost
        // vanishes entirely
        let eval = HorizonEval::new([0.0; 4], Params::default().weights());

        let mut vars = zero_vars();
        for t in 0..N {
            vars[V_START + t] = REF_V;
        }

        let fg = derivs::eval_fg(&eval, &vars);
        assert_eq!(fg[0], 0.0);
    }

    #[test]
    fn test_velocity_term_vanishes_at_ref_v() {
        // Only the velocity error is non-zero, so the cost is w2 * dv^2
        let eval = HorizonEval::new([0.0; 4], Params::default().weights());

        let mut vars = zero_vars();
        vars[V_START] = REF_V;
        for t in 1..N {
            vars[V_START + t] = REF_V - 2.0;
        }

        let fg = derivs::eval_fg(&eval, &vars);
        assert!((fg[0] - 5.0 * 4.0 * (N - 1) as f64).abs() < 1e-9);
    }

    #[test]
    fn test_weight_indices_match_terms() {
        let mut weights = [0.0; NUM_WEIGHTS];
        weights[0] = 1.0;

        let eval = HorizonEval::new([0.0; 4], weights);

        let mut vars = zero_vars();
        for t in 0..N {
            vars[V_START + t] = REF_V;
        }
        vars[CTE_START + 2] = 3.0;

        // Tracking term only: w0 * cte^2
        let fg = derivs::eval_fg(&eval, &vars);
        assert!((fg[0] - 9.0).abs() < 1e-12);

        let mut weights = [0.0; NUM_WEIGHTS];
        weights[5] = 1.0;

        let eval = HorizonEval::new([0.0; 4], weights);

        let mut vars = zero_vars();
        for t in 0..N {
            vars[V_START + t] = REF_V;
        }
        vars[DELTA_START] = 0.1;
        vars[DELTA_START + 1] = 0.3;

        // Steer smoothness: w5 * (0.2^2 + 0.3^2), the second gap being the
        // fall back to zero at the following step
        let fg = derivs::eval_fg(&eval, &vars);
        assert!((fg[0] - (0.04 + 0.09)).abs() < 1e-12);
    }

    #[test]
    fn test_residuals_vanish_on_model_rollout() {
        // Roll the model forward by hand and check every residual is zero
        let coeffs = [0.5, 0.01, 0.002, -0.0001];
        let eval = HorizonEval::new(coeffs, Params::default().weights());

        let mut vars = zero_vars();

        // Constant actuation over the horizon
        let delta = 0.05;
        let a = 0.3;
        for t in 0..N - 1 {
            vars[DELTA_START + t] = delta;
            vars[A_START + t] = a;
        }

        // Initial state
        vars[X_START] = 1.0;
        vars[Y_START] = -0.5;
        vars[PSI_START] = 0.1;
        vars[V_START] = 12.0;
        vars[CTE_START] = 0.4;
        vars[EPSI_START] = -0.05;

        for t in 1..N {
            let x0 = vars[X_START + t - 1];
            let y0 = vars[Y_START + t - 1];
            let psi0 = vars[PSI_START + t - 1];
            let v0 = vars[V_START + t - 1];
            let epsi0 = vars[EPSI_START + t - 1];

            let f0 = coeffs[0] + coeffs[1] * x0 + coeffs[2] * x0 * x0 + coeffs[3] * x0 * x0 * x0;
            let psides0 = (coeffs[1] + 2.0 * coeffs[2] * x0 + 3.0 * coeffs[3] * x0 * x0).atan();

            vars[X_START + t] = x0 + v0 * psi0.cos() * DT;
            vars[Y_START + t] = y0 + v0 * psi0.sin() * DT;
            vars[PSI_START + t] = psi0 + v0 * delta / LF * DT;
            vars[V_START + t] = v0 + a * DT;
            vars[CTE_START + t] = (f0 - y0) + v0 * epsi0.sin() * DT;
            vars[EPSI_START + t] = (psi0 - psides0) + v0 * delta / LF * DT;
        }

        let fg = derivs::eval_fg(&eval, &vars);

        for (k, residual) in fg[1..].iter().enumerate() {
            // The first entry of each block pins the state rather than a
            // residual, skip those
            if k % N == 0 {
                continue;
            }
            assert!(
                residual.abs() < 1e-12,
                "residual {} is {}",
                k,
                residual
            );
        }
    }
}
