//! Newton-KKT interior-point iteration.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::trace;
use nalgebra::{DMatrix, DVector};
use std::time::Instant;

// Internal
use super::{derivs, FgEval, Options, Solution, Status};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Bounds with magnitude at or above this threshold carry no barrier term.
const UNBOUNDED: f64 = 1.0e18;

/// Fraction-to-boundary factor keeping iterates strictly interior.
const BOUNDARY_FRACTION: f64 = 0.995;

/// Initial barrier parameter.
const MU_INIT: f64 = 1.0;

/// Floor for the barrier parameter.
const MU_MIN: f64 = 1.0e-7;

/// Factor applied to the barrier parameter on each reduction.
const MU_SHRINK: f64 = 0.1;

/// Smallest line search step attempted before giving up on a direction.
const ALPHA_MIN: f64 = 1.0e-10;

/// Number of increases of the primal regularisation before declaring the
/// KKT system unsolvable.
const MAX_REG_ATTEMPTS: usize = 6;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Run the interior-point iteration.
///
/// `g_target` holds the equality constraint right-hand sides, so the solver
/// drives `g(x) - g_target` to zero.
pub(super) fn interior_point<E: FgEval>(
    options: &Options,
    x0: &[f64],
    x_lower: &[f64],
    x_upper: &[f64],
    g_target: &[f64],
    eval: &E,
) -> Solution {
    let start = Instant::now();
    let n = x0.len();
    let m = g_target.len();

    // Nudge the start point strictly inside the bounds, the barrier is
    // undefined on them
    let mut x = DVector::from_column_slice(x0);
    for i in 0..n {
        if bounded(x_lower[i]) || bounded(x_upper[i]) {
            let margin = 1.0e-4 * (x_upper[i] - x_lower[i]);
            x[i] = x[i].max(x_lower[i] + margin).min(x_upper[i] - margin);
        }
    }

    // The objective Hessian is evaluated once per solve. The horizon costs
    // this solver is built for are quadratic in the decision variables, so
    // the Hessian is constant; constraint curvature is left to the
    // Gauss-Newton term structure of the KKT step.
    let hess = derivs::objective_hessian(eval, x.as_slice());

    let mut mu = MU_INIT;
    let mut nu = 10.0;
    let mut status = Status::MaxIterReached;
    let mut iterations = 0;

    for iter in 0..options.max_iter {
        iterations = iter + 1;

        if start.elapsed().as_secs_f64() > options.max_cpu_time_s {
            status = Status::CpuTimeExceeded;
            break;
        }

        let (fg, jac) = derivs::jacobian(eval, x.as_slice());

        let mut c_res = DVector::zeros(m);
        for k in 0..m {
            c_res[k] = fg[1 + k] - g_target[k];
        }

        // Assemble the KKT system
        //
        //   [ W  A^T ] [ dx     ]   [ -(grad f + grad barrier) ]
        //   [ A   0  ] [ lambda ] = [ -c                       ]
        //
        // where W is the objective Hessian plus the barrier diagonal, and
        // lambda are the multipliers at the new iterate.
        let dim = n + m;
        let mut kkt = DMatrix::zeros(dim, dim);
        let mut rhs = DVector::zeros(dim);

        for i in 0..n {
            for j in 0..n {
                kkt[(i, j)] = hess[(i, j)];
            }
        }

        for k in 0..m {
            for j in 0..n {
                kkt[(n + k, j)] = jac[(1 + k, j)];
                kkt[(j, n + k)] = jac[(1 + k, j)];
            }
            rhs[n + k] = -c_res[k];
        }

        for i in 0..n {
            let mut grad = jac[(0, i)];

            if bounded(x_lower[i]) {
                let slack = x[i] - x_lower[i];
                grad -= mu / slack;
                kkt[(i, i)] += mu / (slack * slack);
            }
            if bounded(x_upper[i]) {
                let slack = x_upper[i] - x[i];
                grad += mu / slack;
                kkt[(i, i)] += mu / (slack * slack);
            }

            rhs[i] = -grad;
        }

        // Factorise, regularising the primal block if the system turns out
        // singular
        let mut step = None;
        let mut reg = 0.0;
        for _ in 0..MAX_REG_ATTEMPTS {
            let mut kkt_reg = kkt.clone();
            for i in 0..n {
                kkt_reg[(i, i)] += reg;
            }

            match kkt_reg.lu().solve(&rhs) {
                Some(s) => {
                    step = Some(s);
                    break;
                }
                None => reg = if reg == 0.0 { 1.0e-8 } else { reg * 100.0 },
            }
        }

        let step = match step {
            Some(s) => s,
            None => {
                status = Status::NumericalProblem;
                break;
            }
        };

        let dx = step.rows(0, n).into_owned();
        let lambda = step.rows(n, m).into_owned();

        let dx_inf = dx.amax();
        let c_inf = if m > 0 { c_res.amax() } else { 0.0 };

        // Converged at the current barrier level: either finish or tighten
        // the barrier and re-centre
        if dx_inf <= options.tol && c_inf <= options.tol {
            if mu <= MU_MIN * 10.0 {
                status = Status::Success;
                break;
            }
            mu = (mu * MU_SHRINK).max(MU_MIN);
            continue;
        }

        // Fraction-to-boundary limit on the step
        let mut alpha_max: f64 = 1.0;
        for i in 0..n {
            if dx[i] < 0.0 && bounded(x_lower[i]) {
                alpha_max = alpha_max.min(BOUNDARY_FRACTION * (x_lower[i] - x[i]) / dx[i]);
            }
            if dx[i] > 0.0 && bounded(x_upper[i]) {
                alpha_max = alpha_max.min(BOUNDARY_FRACTION * (x_upper[i] - x[i]) / dx[i]);
            }
        }

        // Keep the merit penalty above the multiplier scale so the merit
        // function stays exact
        let lambda_inf = if m > 0 { lambda.amax() } else { 0.0 };
        if nu < 2.0 * lambda_inf {
            nu = 2.0 * lambda_inf;
        }

        // Backtracking line search on the l1 merit function
        let merit_current = merit(eval, x.as_slice(), x_lower, x_upper, g_target, mu, nu);

        let mut alpha = alpha_max;
        let mut accepted = false;
        while alpha >= ALPHA_MIN {
            let trial = &x + &dx * alpha;
            let merit_trial = merit(eval, trial.as_slice(), x_lower, x_upper, g_target, mu, nu);

            if merit_trial < merit_current {
                x = trial;
                accepted = true;
                break;
            }

            alpha *= 0.5;
        }

        if !accepted {
            if mu <= MU_MIN * 10.0 {
                // At the barrier floor with a feasible, nearly stationary
                // iterate the merit function has hit the limit of float
                // resolution, which is convergence rather than failure
                if c_inf <= options.tol * 100.0 && dx_inf <= 1.0e-3 {
                    status = Status::Success;
                } else {
                    status = Status::NumericalProblem;
                }
                break;
            }

            // No productive step at this barrier level, tighten it and
            // re-centre
            mu = (mu * MU_SHRINK).max(MU_MIN);
            continue;
        }

        // Shrink the barrier once the iterate tracks it closely
        if dx_inf.max(c_inf) <= 100.0 * mu {
            mu = (mu * MU_SHRINK).max(MU_MIN);
        }

        trace!(
            "iter {}: |dx| = {:.3e}, |c| = {:.3e}, mu = {:.1e}, alpha = {:.3e}",
            iterations,
            dx_inf,
            c_inf,
            mu,
            alpha
        );
    }

    let fg = derivs::eval_fg(eval, x.as_slice());

    Solution {
        status,
        vars: x.iter().copied().collect(),
        obj_value: fg[0],
        iterations,
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// True if the given bound value is an actual bound rather than an
/// unbounded marker.
fn bounded(bound: f64) -> bool {
    bound.abs() < UNBOUNDED
}

/// The l1 merit function: objective plus barrier plus penalised constraint
/// violation.
///
/// Returns infinity for points outside the open bound region, which the
/// line search treats as a rejection.
fn merit<E: FgEval>(
    eval: &E,
    x: &[f64],
    x_lower: &[f64],
    x_upper: &[f64],
    g_target: &[f64],
    mu: f64,
    nu: f64,
) -> f64 {
    let fg = derivs::eval_fg(eval, x);

    let mut merit = fg[0];

    for i in 0..x.len() {
        if bounded(x_lower[i]) {
            let slack = x[i] - x_lower[i];
            if slack <= 0.0 {
                return f64::INFINITY;
            }
            merit -= mu * slack.ln();
        }
        if bounded(x_upper[i]) {
            let slack = x_upper[i] - x[i];
            if slack <= 0.0 {
                return f64::INFINITY;
            }
            merit -= mu * slack.ln();
        }
    }

    for (k, target) in g_target.iter().enumerate() {
        merit += nu * (fg[1 + k] - target).abs();
    }

    merit
}
