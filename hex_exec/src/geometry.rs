//! # Geometry primitives
//!
//! Thin layer over nalgebra's fixed size vectors providing the handful of
//! planar operations the gait and kinematics code rely on. All angles here
//! are in degrees, all lengths in millimetres.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use nalgebra::{Rotation2, Vector2, Vector3};
use util::maths::clamp;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// Planar vector, used for directions and foot positions projected onto the
/// ground plane.
pub type Vector2D = Vector2<f64>;

/// Spatial vector, used for foot positions in a leg's local frame.
pub type Vector3D = Vector3<f64>;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Operations shared by the 2D and 3D vectors.
pub trait VectorExt: Sized {
    /// Normalise the vector, returning the zero vector if its magnitude is 0.
    fn normalized_or_zero(&self) -> Self;

    /// The vector pointing the opposite way.
    fn inverse(&self) -> Self;
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl VectorExt for Vector2D {
    fn normalized_or_zero(&self) -> Self {
        let mag = self.norm();
        if mag == 0.0 {
            Vector2D::zeros()
        } else {
            self / mag
        }
    }

    fn inverse(&self) -> Self {
        -self
    }
}

impl VectorExt for Vector3D {
    fn normalized_or_zero(&self) -> Self {
        let mag = self.norm();
        if mag == 0.0 {
            Vector3D::zeros()
        } else {
            self / mag
        }
    }

    fn inverse(&self) -> Self {
        -self
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Unsigned angle between two planar vectors in degrees, in `[0, 180]`.
///
/// The cosine is clamped to `[-1, 1]` so rounding can never produce NaN. If
/// either vector is zero the angle is 0.
pub fn angle_between(a: &Vector2D, b: &Vector2D) -> f64 {
    let mag = a.norm() * b.norm();
    if mag == 0.0 {
        return 0.0;
    }

    clamp(a.dot(b) / mag, -1.0, 1.0).acos().to_degrees()
}

/// Rotate a planar vector counter-clockwise by `angle_deg`.
pub fn rotate(v: &Vector2D, angle_deg: f64) -> Vector2D {
    Rotation2::new(angle_deg.to_radians()) * v
}

/// Project a spatial vector onto the XY plane.
pub fn to_2d(v: &Vector3D) -> Vector2D {
    v.xy()
}

/// Lift a planar vector into space at the given height.
pub fn to_3d(v: &Vector2D, z: f64) -> Vector3D {
    Vector3D::new(v.x, v.y, z)
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    const TOL: f64 = 1e-9;

    #[test]
    fn test_normalize() {
        let v = Vector2D::new(3.0, 4.0).normalized_or_zero();
        assert!((v.norm() - 1.0).abs() < TOL);
        assert!((v.x - 0.6).abs() < TOL);

        assert_eq!(Vector2D::zeros().normalized_or_zero(), Vector2D::zeros());
        assert_eq!(Vector3D::zeros().normalized_or_zero(), Vector3D::zeros());
    }

    #[test]
    fn test_inverse() {
        assert_eq!(Vector2D::new(1.0, -2.0).inverse(), Vector2D::new(-1.0, 2.0));
        assert_eq!(
            Vector3D::new(1.0, -2.0, 3.0).inverse(),
            Vector3D::new(-1.0, 2.0, -3.0)
        );
    }

    #[test]
    fn test_angle_between() {
        let x = Vector2D::new(1.0, 0.0);
        let y = Vector2D::new(0.0, 1.0);

        assert!((angle_between(&x, &y) - 90.0).abs() < TOL);
        assert!((angle_between(&x, &x.inverse()) - 180.0).abs() < TOL);
        assert!(angle_between(&x, &(x * 5.0)).abs() < TOL);
        assert_eq!(angle_between(&x, &Vector2D::zeros()), 0.0);

        // Nearly parallel vectors must not produce NaN from rounding
        let a = Vector2D::new(0.1 + 0.2, 0.3);
        let b = Vector2D::new(0.3, 0.3);
        assert!(!angle_between(&a, &b).is_nan());
    }

    #[test]
    fn test_rotate() {
        let v = rotate(&Vector2D::new(1.0, 0.0), 90.0);
        assert!(v.x.abs() < TOL);
        assert!((v.y - 1.0).abs() < TOL);

        let v = rotate(&Vector2D::new(0.0, 2.0), -90.0);
        assert!((v.x - 2.0).abs() < TOL);
        assert!(v.y.abs() < TOL);
    }

    #[test]
    fn test_conversions() {
        let v = Vector3D::new(1.0, 2.0, 3.0);
        assert_eq!(to_2d(&v), Vector2D::new(1.0, 2.0));
        assert_eq!(to_3d(&to_2d(&v), -5.0), Vector3D::new(1.0, 2.0, -5.0));
    }
}
