//! # Robot Module
//!
//! Hardware facing model of the hexapod: joints, legs, the aggregate robot and the sensors the
//! locomotion core reads.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod calibration;
pub mod hexapod;
pub mod imu;
pub mod joint;
pub mod leg;
pub mod params;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use hexapod::{Hexapod, HexapodError, PredefinedPosition, SharedHexapod};
pub use imu::{Imu, ImuError};
pub use joint::{Joint, JointError, JointParams};
pub use leg::{JointAngles, Leg, LegError, LegParams};
pub use params::HexapodParams;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::geometry::Vector3D;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of legs on the robot.
pub const NUM_LEGS: usize = 6;

// ---------------------------------------------------------------------------
// TYPES
// ---------------------------------------------------------------------------

/// One foot position per leg, each in that leg's local frame.
pub type LegPositions = [Vector3D; NUM_LEGS];

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Read access to the current foot positions, passed to the gait planners when they need it.
pub trait LegPositionSource {
    /// Position of the given leg's foot in its local frame.
    fn leg_position(&self, leg_index: usize) -> Vector3D;
}

impl LegPositionSource for LegPositions {
    fn leg_position(&self, leg_index: usize) -> Vector3D {
        self.get(leg_index).copied().unwrap_or_else(Vector3D::zeros)
    }
}

// ---------------------------------------------------------------------------
// TEST UTILITIES
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::servo_ctrl::SimServo;

    /// A hexapod on a simulated controller with fast motion polling.
    pub(crate) fn test_hexapod() -> Result<(Hexapod, SimServo), HexapodError> {
        let sim = SimServo::new(24);
        let params = HexapodParams {
            motion_poll_period_s: 0.001,
            motion_start_timeout_s: 0.01,
            motion_timeout_s: 0.5,
            ..Default::default()
        };
        Ok((Hexapod::new(&params, Box::new(sim.clone()))?, sim))
    }
}
