//! # Nonlinear program solver
//!
//! This module solves bounded nonlinear programs of the shape the MPC module
//! produces: minimise a smooth scalar objective subject to equality
//! constraints and simple variable bounds,
//!
//! ```text
//!     min  f(z)
//!     s.t. g(z) = b
//!          l <= z <= u
//! ```
//!
//! The caller supplies variable bounds, per-constraint bounds, an initial
//! guess and a callback which evaluates the objective (entry 0) and every
//! constraint value (entries 1..) in one pass. The callback is generic over a
//! dual-number scalar, so the solver differentiates it exactly by forward
//! seeding - never by finite differences, which would not fit the per-solve
//! wall-clock budget.
//!
//! Internally this is a log-barrier interior-point method: the variable
//! bounds become barrier terms, and each outer iterate takes a Newton-KKT
//! step on the equality-constrained barrier problem. The solver self-limits
//! by wall clock and always returns its current iterate, whatever the status.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod derivs;
mod newton;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use num_dual::DualNum;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Objective-and-constraint callback.
///
/// Implementations fill `fg` with the objective at entry 0 and the
/// constraint values at entries 1 onward. The scalar type carries the
/// derivative information, so the body must be written in plain arithmetic
/// over `D`.
pub trait FgEval {
    /// Number of entries in the `fg` vector, i.e. one plus the number of
    /// constraints.
    fn fg_len(&self) -> usize;

    /// Evaluate the objective and constraints at `vars`.
    fn eval<D: DualNum<f64> + Copy>(&self, vars: &[D], fg: &mut [D]);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Solver options.
#[derive(Debug, Clone, Copy)]
pub struct Options {
    /// Wall-clock budget for one solve.
    ///
    /// Units: seconds
    pub max_cpu_time_s: f64,

    /// Iteration cap.
    pub max_iter: usize,

    /// Convergence tolerance on the Newton step and constraint residuals.
    pub tol: f64,
}

/// The result of a solve: the final iterate is returned regardless of
/// status, so a caller under a hard deadline can still act on it.
#[derive(Debug, Clone)]
pub struct Solution {
    /// How the solve finished.
    pub status: Status,

    /// The final iterate.
    pub vars: Vec<f64>,

    /// Objective value at the final iterate.
    pub obj_value: f64,

    /// Number of iterations taken.
    pub iterations: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Solve outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// Converged to the requested tolerance.
    Success,

    /// The iteration cap was reached first.
    MaxIterReached,

    /// The wall-clock budget was exhausted first.
    CpuTimeExceeded,

    /// The KKT system could not be factorised or no productive step was
    /// found.
    NumericalProblem,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Options {
    fn default() -> Self {
        Options {
            max_cpu_time_s: 0.05,
            max_iter: 100,
            tol: 1.0e-6,
        }
    }
}

impl Status {
    /// True if the solve converged.
    pub fn is_success(&self) -> bool {
        matches!(self, Status::Success)
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Solve a bounded nonlinear program.
///
/// # Inputs
/// - `x0`: initial guess, one entry per variable.
/// - `x_lower`/`x_upper`: variable bounds. Magnitudes of 1e18 or above are
///   treated as unbounded.
/// - `g_lower`/`g_upper`: per-constraint bounds. Only the equality case
///   (lower equal to upper) is supported, which is what the MPC formulation
///   produces.
/// - `eval`: the objective-and-constraint callback.
pub fn solve<E: FgEval>(
    options: &Options,
    x0: &[f64],
    x_lower: &[f64],
    x_upper: &[f64],
    g_lower: &[f64],
    g_upper: &[f64],
    eval: &E,
) -> Solution {
    let n = x0.len();
    let m = g_lower.len();

    debug_assert_eq!(x_lower.len(), n);
    debug_assert_eq!(x_upper.len(), n);
    debug_assert_eq!(g_upper.len(), m);
    debug_assert_eq!(eval.fg_len(), 1 + m);
    debug_assert!(
        g_lower
            .iter()
            .zip(g_upper.iter())
            .all(|(l, u)| (l - u).abs() == 0.0),
        "only equality constraints are supported"
    );

    newton::interior_point(options, x0, x_lower, x_upper, g_lower, eval)
}

#[cfg(test)]
mod test {
    use super::*;

    /// min (x0 - 2)^2 + x1^2  s.t.  x0 + x1 = 1
    struct ConstrainedQuadratic;

    impl FgEval for ConstrainedQuadratic {
        fn fg_len(&self) -> usize {
            2
        }

        fn eval<D: DualNum<f64> + Copy>(&self, vars: &[D], fg: &mut [D]) {
            let e = vars[0] - 2.0;
            fg[0] = e * e + vars[1] * vars[1];
            fg[1] = vars[0] + vars[1];
        }
    }

    #[test]
    fn test_equality_constrained_minimum() {
        // Stationarity gives x0 - 2 = x1, so x0 = 1.5, x1 = -0.5
        let solution = solve(
            &Options::default(),
            &[0.0, 0.0],
            &[-1.0e19, -10.0],
            &[1.0e19, 10.0],
            &[1.0],
            &[1.0],
            &ConstrainedQuadratic,
        );

        assert!(solution.status.is_success(), "status {:?}", solution.status);
        assert!((solution.vars[0] - 1.5).abs() < 1e-4);
        assert!((solution.vars[1] + 0.5).abs() < 1e-4);
        assert!((solution.obj_value - 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_active_bound_pins_the_solution() {
        // The unconstrained stationary point has x1 = -0.5, outside the
        // bound, so the solution sits on it
        let solution = solve(
            &Options::default(),
            &[0.0, 0.0],
            &[-1.0e19, -0.2],
            &[1.0e19, 0.2],
            &[1.0],
            &[1.0],
            &ConstrainedQuadratic,
        );

        assert!(solution.status.is_success(), "status {:?}", solution.status);
        assert!((solution.vars[1] + 0.2).abs() < 1e-3);
        assert!((solution.vars[0] - 1.2).abs() < 1e-3);
    }

    #[test]
    fn test_returned_iterate_respects_bounds_under_iteration_cap() {
        // Starve the solver of iterations: whatever it returns must still be
        // a usable iterate inside the bounds
        let options = Options {
            max_iter: 2,
            ..Default::default()
        };

        let solution = solve(
            &options,
            &[0.0, 0.0],
            &[-1.0e19, -0.2],
            &[1.0e19, 0.2],
            &[1.0],
            &[1.0],
            &ConstrainedQuadratic,
        );

        assert!(!solution.status.is_success());
        assert!(solution.vars[1] >= -0.2 && solution.vars[1] <= 0.2);
        assert_eq!(solution.vars.len(), 2);
    }
}
