//! # Inertial measurement unit
//!
//! The locomotion core only needs raw acceleration and angular rate, so the IMU is a small trait
//! the board driver implements.

use crate::geometry::Vector3D;

/// Standard gravity.
///
/// Units: meters/second^2
pub const GRAVITY_MS2: f64 = 9.81;

/// An inertial measurement unit.
pub trait Imu: Send {
    /// Linear acceleration including gravity.
    ///
    /// Units: meters/second^2
    fn get_acceleration(&mut self) -> Result<Vector3D, ImuError>;

    /// Angular rate.
    ///
    /// Units: radians/second
    fn get_gyroscope(&mut self) -> Result<Vector3D, ImuError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ImuError {
    #[error("IMU communication error: {0}")]
    Io(#[from] std::io::Error),

    #[error("IMU returned no data")]
    NoData,
}

/// Returns true if the body is close to resting: gravity only on the accelerometer and almost no
/// rotation.
pub fn is_stable(accel: &Vector3D, gyro: &Vector3D, threshold: f64) -> bool {
    (accel.norm() - GRAVITY_MS2).abs() < threshold && gyro.norm() < threshold
}
