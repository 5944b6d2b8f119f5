//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::{Float, FloatConst};

/// Limit a value to the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    if value > max {
        max
    }
    else if value < min {
        min
    }
    else {
        value
    }
}

/// Limit a value to the symmetric range `[-limit, limit]`.
pub fn clamp_abs<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(value, -limit, limit)
}

/// Get the signed angular step from `curr` to `next`, taking the shorter way around the circle.
///
/// Both angles are expected to lie within one turn of each other, so a single correction of
/// `2pi` is applied if the raw difference is beyond `pi` in either direction.
pub fn short_ang_delta<T>(curr: T, next: T) -> T
where
    T: Float + FloatConst
{
    let pi = T::PI();
    let tau = pi + pi;

    let delta = next - curr;

    if delta < -pi {
        delta + tau
    }
    else if delta > pi {
        delta - tau
    }
    else {
        delta
    }
}
