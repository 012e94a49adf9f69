//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Map a value from one range into another.
///
/// The value is not clamped, values outside the source range extrapolate.
pub fn lin_map<T>(source_range: (T, T), target_range: (T, T), value: T) -> T
where
    T: Float,
{
    target_range.0
        + ((value - source_range.0) * (target_range.1 - target_range.0)
            / (source_range.1 - source_range.0))
}

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float,
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_lin_map() {
        assert_eq!(lin_map((0.0, 10.0), (0.0, 100.0), 5.0), 50.0);
        assert_eq!(lin_map((-90.0, 90.0), (3968.0, 8000.0), -90.0), 3968.0);
        assert_eq!(lin_map((-90.0, 90.0), (3968.0, 8000.0), 90.0), 8000.0);
        assert_eq!(lin_map((-90.0, 90.0), (3968.0, 8000.0), 0.0), 5984.0);

        // Inverted target ranges map in reverse
        assert_eq!(lin_map((0.0, 1.0), (10.0, 0.0), 0.25), 7.5);
    }

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(1.5f64, -1.0, 1.0), 1.0);
        assert_eq!(clamp(-1.5f64, -1.0, 1.0), -1.0);
        assert_eq!(clamp(0.5f64, -1.0, 1.0), 0.5);
    }
}
