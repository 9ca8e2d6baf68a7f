//! # Reference trajectory fitting
//!
//! The simulator supplies the upcoming waypoints in the world frame. This
//! module transforms them into the vehicle frame - car at the origin,
//! heading along +x - and fits a polynomial through them by least squares.
//! Working in the vehicle frame keeps the fitted curve close to a function
//! of x and makes the error definitions of the controller trivial at the
//! origin.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Relative threshold on the R diagonal below which the fit system is
/// treated as rank deficient.
const RANK_EPSILON: f64 = 1.0e-10;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors raised while fitting the reference trajectory.
#[derive(Debug, Error)]
pub enum TrajFitError {
    #[error("Cannot fit a degree {order} polynomial through {count} waypoints")]
    TooFewPoints { order: usize, count: usize },

    #[error("The waypoint geometry is rank deficient, no unique fit exists")]
    IllConditioned,
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Transform world-frame waypoints into the vehicle frame.
///
/// Each waypoint is translated by the negated vehicle position and rotated
/// by the negated heading.
pub fn to_vehicle_frame(
    ptsx: &[f64],
    ptsy: &[f64],
    px: f64,
    py: f64,
    psi: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut xs = Vec::with_capacity(ptsx.len());
    let mut ys = Vec::with_capacity(ptsy.len());

    for (wx, wy) in ptsx.iter().zip(ptsy.iter()) {
        let dx = wx - px;
        let dy = wy - py;

        xs.push(dx * (-psi).cos() - dy * (-psi).sin());
        ys.push(dx * (-psi).sin() + dy * (-psi).cos());
    }

    (xs, ys)
}

/// Transform vehicle-frame points back into the world frame.
///
/// The exact inverse of [`to_vehicle_frame`], used to close the loop in
/// tests and visualisation.
pub fn to_world_frame(
    xs: &[f64],
    ys: &[f64],
    px: f64,
    py: f64,
    psi: f64,
) -> (Vec<f64>, Vec<f64>) {
    let mut wxs = Vec::with_capacity(xs.len());
    let mut wys = Vec::with_capacity(ys.len());

    for (x, y) in xs.iter().zip(ys.iter()) {
        wxs.push(x * psi.cos() - y * psi.sin() + px);
        wys.push(x * psi.sin() + y * psi.cos() + py);
    }

    (wxs, wys)
}

/// Fit a polynomial of the given order through the points by least squares.
///
/// Returns the coefficients with `coeffs[i]` the degree-i coefficient. The
/// normal system is solved through a Householder QR factorisation for
/// numerical stability.
pub fn polyfit(xs: &[f64], ys: &[f64], order: usize) -> Result<Vec<f64>, TrajFitError> {
    let count = xs.len();

    if count < order + 1 || ys.len() != count {
        return Err(TrajFitError::TooFewPoints { order, count });
    }

    // Vandermonde matrix, one row per waypoint
    let vandermonde = DMatrix::from_fn(count, order + 1, |r, c| xs[r].powi(c as i32));
    let rhs = DVector::from_column_slice(ys);

    let qr = vandermonde.qr();
    let r = qr.r();

    // A vanishing R diagonal means the waypoints cannot pin down the
    // requested order, e.g. repeated x positions
    let max_diag = r
        .diagonal()
        .iter()
        .fold(0.0f64, |acc, d| acc.max(d.abs()));

    if r.diagonal()
        .iter()
        .any(|d| d.abs() < RANK_EPSILON * max_diag.max(1.0))
    {
        return Err(TrajFitError::IllConditioned);
    }

    let projected = qr.q().transpose() * rhs;

    let coeffs = r
        .solve_upper_triangular(&projected)
        .ok_or(TrajFitError::IllConditioned)?;

    Ok(coeffs.iter().copied().collect())
}
