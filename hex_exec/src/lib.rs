//! # Hexapod library.
//!
//! Locomotion core of the hexapod, shared by the executable and the benchmarks.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Planar and spatial vector helpers used by every other module
pub mod geometry;

/// Servo controller drivers - the Maestro serial protocol and a simulated controller
pub mod servo_ctrl;

/// Robot model - joints, legs, the hexapod aggregate and its sensors
pub mod robot;

/// Gaits - phase tables, foot targeting and swing path planning
pub mod gait;

/// Gait generator - executes a gait on the robot in a background thread
pub mod gait_gen;
