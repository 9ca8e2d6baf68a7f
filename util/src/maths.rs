//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Evaluate a polynomial at the given value.
///
/// `coeffs[i]` is the coefficient of the degree-`i` term. This ordering is
/// shared with the trajectory fitter, which produces its coefficients in the
/// same order.
pub fn poly_val<T>(value: T, coeffs: &[T]) -> T
where
    T: Float + std::ops::AddAssign,
{
    let mut res = T::from(0).unwrap();

    for (i, c) in coeffs.iter().enumerate() {
        res += *c * value.powi(i as i32);
    }

    res
}

/// Evaluate the first derivative of a polynomial at the given value.
///
/// Coefficient ordering as for [`poly_val`].
pub fn poly_slope<T>(value: T, coeffs: &[T]) -> T
where
    T: Float + std::ops::AddAssign,
{
    let mut res = T::from(0).unwrap();

    for (i, c) in coeffs.iter().enumerate().skip(1) {
        res += *c * T::from(i).unwrap() * value.powi(i as i32 - 1);
    }

    res
}

/// Limit a value to the given range.
pub fn clamp<T>(value: &T, min: &T, max: &T) -> T
where
    T: Float,
{
    let mut ret = *value;

    if ret > *max {
        ret = *max
    }
    if ret < *min {
        ret = *min
    }

    ret
}

/// Convert an angle in degrees to radians.
pub fn deg_to_rad<T>(deg: T) -> T
where
    T: Float,
{
    deg * T::from(std::f64::consts::PI).unwrap() / T::from(180).unwrap()
}

/// Convert an angle in radians to degrees.
pub fn rad_to_deg<T>(rad: T) -> T
where
    T: Float,
{
    rad * T::from(180).unwrap() / T::from(std::f64::consts::PI).unwrap()
}
