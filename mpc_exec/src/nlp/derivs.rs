//! Exact derivatives of the objective-and-constraint callback.
//!
//! First derivatives come from seeding one dual perturbation per variable
//! and reading the dual parts back out of the callback's output. Second
//! derivatives of the objective come from hyper-dual seeding over variable
//! pairs.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::DMatrix;
use num_dual::{Dual64, HyperDual64};

// Internal
use super::FgEval;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate the callback with plain floats.
pub fn eval_fg<E: FgEval>(eval: &E, x: &[f64]) -> Vec<f64> {
    let mut fg = vec![0.0f64; eval.fg_len()];
    eval.eval(x, &mut fg);
    fg
}

/// Evaluate the callback values and the full Jacobian at `x`.
///
/// Returns the value vector and a `fg_len x n` matrix whose row 0 is the
/// objective gradient and whose remaining rows form the constraint Jacobian.
pub fn jacobian<E: FgEval>(eval: &E, x: &[f64]) -> (Vec<f64>, DMatrix<f64>) {
    let n = x.len();
    let rows = eval.fg_len();

    let mut values = vec![0.0f64; rows];
    let mut jac = DMatrix::zeros(rows, n);

    let mut vars: Vec<Dual64> = x.iter().map(|&v| Dual64::from(v)).collect();
    let mut fg = vec![Dual64::from(0.0); rows];

    for i in 0..n {
        vars[i].eps = 1.0;

        eval.eval(&vars, &mut fg);

        for r in 0..rows {
            jac[(r, i)] = fg[r].eps;
        }

        if i == 0 {
            for r in 0..rows {
                values[r] = fg[r].re;
            }
        }

        vars[i].eps = 0.0;
    }

    (values, jac)
}

/// Evaluate the Hessian of the objective entry at `x`.
pub fn objective_hessian<E: FgEval>(eval: &E, x: &[f64]) -> DMatrix<f64> {
    let n = x.len();

    let mut hess = DMatrix::zeros(n, n);

    let mut vars: Vec<HyperDual64> = x.iter().map(|&v| HyperDual64::from(v)).collect();
    let mut fg = vec![HyperDual64::from(0.0); eval.fg_len()];

    for i in 0..n {
        for j in i..n {
            vars[i].eps1 = 1.0;
            vars[j].eps2 = 1.0;

            eval.eval(&vars, &mut fg);

            hess[(i, j)] = fg[0].eps1eps2;
            hess[(j, i)] = fg[0].eps1eps2;

            vars[i].eps1 = 0.0;
            vars[j].eps2 = 0.0;
        }
    }

    hess
}
