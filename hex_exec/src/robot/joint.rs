//! # Joint
//!
//! A single servo driven joint. Converts angles in degrees into servo targets using the joint's
//! calibrated pulse range, enforcing the hard angle limits and optionally the softer custom
//! limits.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use util::maths::{clamp, lin_map};

use crate::servo_ctrl::{ServoDriver, ServoError};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Controller targets are in quarter-microseconds.
pub const SERVO_UNIT_MULTIPLIER: u16 = 4;

/// Smallest pulse width accepted from calibration, in microseconds.
pub const SERVO_INPUT_MIN: u16 = 992;

/// Largest pulse width accepted from calibration, in microseconds.
pub const SERVO_INPUT_MAX: u16 = 2000;

/// Default speed limit in controller units.
pub const DEFAULT_SPEED: u16 = 32;

/// Default acceleration limit in controller units.
pub const DEFAULT_ACCEL: u16 = 5;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters describing one joint type, shared by the same joint of every leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JointParams {
    /// Length of the link driven by this joint.
    ///
    /// Units: millimeters
    pub length_mm: f64,

    /// Lowest mechanically allowed angle.
    ///
    /// Units: degrees
    pub angle_min_deg: f64,

    /// Highest mechanically allowed angle.
    ///
    /// Units: degrees
    pub angle_max_deg: f64,

    /// Optional tighter lower bound, only enforced when requested.
    ///
    /// Units: degrees
    pub angle_limit_min_deg: Option<f64>,

    /// Optional tighter upper bound, only enforced when requested.
    ///
    /// Units: degrees
    pub angle_limit_max_deg: Option<f64>,

    /// Pulse width at `angle_min_deg`.
    ///
    /// Units: quarter-microseconds
    pub servo_min: u16,

    /// Pulse width at `angle_max_deg`.
    ///
    /// Units: quarter-microseconds
    pub servo_max: u16,

    /// Negate angles before mapping, for servos mounted mirrored.
    pub invert: bool,
}

/// A servo driven joint.
#[derive(Debug, Clone)]
pub struct Joint {
    channel: u8,
    length_mm: f64,
    angle_min_deg: f64,
    angle_max_deg: f64,
    angle_limit_min_deg: Option<f64>,
    angle_limit_max_deg: Option<f64>,
    servo_min: u16,
    servo_max: u16,
    invert: bool,
    speed: u16,
    accel: u16,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JointError {
    #[error("Angle {angle:.2}° is out of bounds ({min:.2}° to {max:.2}°)")]
    OutOfBounds { angle: f64, min: f64, max: f64 },

    #[error("Angle {angle:.2}° is below custom limit ({limit:.2}°)")]
    BelowCustomLimit { angle: f64, limit: f64 },

    #[error("Angle {angle:.2}° is above custom limit ({limit:.2}°)")]
    AboveCustomLimit { angle: f64, limit: f64 },

    #[error("Could not command the servo: {0}")]
    ServoError(#[from] ServoError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for JointParams {
    fn default() -> Self {
        Self {
            length_mm: 0.0,
            angle_min_deg: -90.0,
            angle_max_deg: 90.0,
            angle_limit_min_deg: None,
            angle_limit_max_deg: None,
            servo_min: SERVO_INPUT_MIN * SERVO_UNIT_MULTIPLIER,
            servo_max: SERVO_INPUT_MAX * SERVO_UNIT_MULTIPLIER,
            invert: false,
        }
    }
}

impl Joint {
    /// Create a joint on the given controller channel.
    pub fn new(channel: u8, params: &JointParams) -> Self {
        Self {
            channel,
            length_mm: params.length_mm,
            angle_min_deg: params.angle_min_deg,
            angle_max_deg: params.angle_max_deg,
            angle_limit_min_deg: params.angle_limit_min_deg,
            angle_limit_max_deg: params.angle_limit_max_deg,
            servo_min: params.servo_min,
            servo_max: params.servo_max,
            invert: params.invert,
            speed: DEFAULT_SPEED,
            accel: DEFAULT_ACCEL,
        }
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn length_mm(&self) -> f64 {
        self.length_mm
    }

    pub fn invert(&self) -> bool {
        self.invert
    }

    pub fn angle_range_deg(&self) -> (f64, f64) {
        (self.angle_min_deg, self.angle_max_deg)
    }

    /// Current calibration as `(servo_min, servo_max)`.
    pub fn calibration(&self) -> (u16, u16) {
        (self.servo_min, self.servo_max)
    }

    /// Current motion profile as `(speed, accel)`.
    pub fn motion_profile(&self) -> (u16, u16) {
        (self.speed, self.accel)
    }

    /// Set the speed and acceleration sent with every `set_angle`.
    pub fn set_motion_profile(&mut self, speed: u16, accel: u16) {
        self.speed = speed;
        self.accel = accel;
    }

    /// Replace the calibrated pulse range.
    pub fn update_calibration(&mut self, servo_min: u16, servo_max: u16) {
        self.servo_min = servo_min;
        self.servo_max = servo_max;
    }

    /// Apply the inversion and check the angle against the limits.
    ///
    /// Returns the angle which should be mapped onto the servo range.
    pub fn validate_angle(&self, angle_deg: f64, check_custom_limits: bool) -> Result<f64, JointError> {
        let angle = if self.invert { -angle_deg } else { angle_deg };

        if !(self.angle_min_deg..=self.angle_max_deg).contains(&angle) {
            return Err(JointError::OutOfBounds {
                angle,
                min: self.angle_min_deg,
                max: self.angle_max_deg,
            });
        }

        if check_custom_limits {
            if let Some(limit) = self.angle_limit_min_deg {
                if angle < limit {
                    return Err(JointError::BelowCustomLimit { angle, limit });
                }
            }
            if let Some(limit) = self.angle_limit_max_deg {
                if angle > limit {
                    return Err(JointError::AboveCustomLimit { angle, limit });
                }
            }
        }

        Ok(angle)
    }

    /// Map an already validated angle onto the calibrated servo range.
    pub fn angle_to_servo(&self, angle_deg: f64) -> u16 {
        let target = lin_map(
            (self.angle_min_deg, self.angle_max_deg),
            (self.servo_min as f64, self.servo_max as f64),
            angle_deg,
        );

        clamp(target.round(), 0.0, u16::MAX as f64) as u16
    }

    /// Validate the angle and return `(channel, target)` without sending anything.
    pub fn servo_target(&self, angle_deg: f64, check_custom_limits: bool) -> Result<(u8, u16), JointError> {
        let angle = self.validate_angle(angle_deg, check_custom_limits)?;
        Ok((self.channel, self.angle_to_servo(angle)))
    }

    /// Move the joint to the given angle.
    ///
    /// Speed and acceleration are sent before the target so they apply to this move.
    pub fn set_angle(
        &self,
        driver: &mut dyn ServoDriver,
        angle_deg: f64,
        check_custom_limits: bool,
    ) -> Result<(), JointError> {
        let (channel, target) = self.servo_target(angle_deg, check_custom_limits)?;

        driver.set_speed(channel, self.speed)?;
        driver.set_acceleration(channel, self.accel)?;
        driver.set_target(channel, target)?;

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::servo_ctrl::SimServo;

    fn params() -> JointParams {
        JointParams {
            length_mm: 50.0,
            angle_min_deg: -90.0,
            angle_max_deg: 90.0,
            angle_limit_min_deg: Some(-45.0),
            angle_limit_max_deg: Some(45.0),
            servo_min: 4000,
            servo_max: 8000,
            invert: false,
        }
    }

    #[test]
    fn test_angle_to_servo() {
        let joint = Joint::new(0, &params());

        assert_eq!(joint.angle_to_servo(-90.0), 4000);
        assert_eq!(joint.angle_to_servo(0.0), 6000);
        assert_eq!(joint.angle_to_servo(90.0), 8000);
        assert_eq!(joint.angle_to_servo(45.0), 7000);
    }

    #[test]
    fn test_hard_limits() {
        let joint = Joint::new(0, &params());

        assert!(joint.validate_angle(90.0, false).is_ok());
        assert!(matches!(
            joint.validate_angle(90.1, false),
            Err(JointError::OutOfBounds { .. })
        ));
        assert!(matches!(
            joint.validate_angle(-91.0, true),
            Err(JointError::OutOfBounds { .. })
        ));
    }

    #[test]
    fn test_custom_limits_only_when_requested() {
        let joint = Joint::new(0, &params());

        assert!(joint.validate_angle(60.0, false).is_ok());
        assert!(joint.validate_angle(-60.0, false).is_ok());
        assert!(matches!(
            joint.validate_angle(60.0, true),
            Err(JointError::AboveCustomLimit { .. })
        ));
        assert!(matches!(
            joint.validate_angle(-60.0, true),
            Err(JointError::BelowCustomLimit { .. })
        ));
        assert!(joint.validate_angle(30.0, true).is_ok());
    }

    #[test]
    fn test_invert() -> Result<(), JointError> {
        let joint = Joint::new(
            0,
            &JointParams {
                invert: true,
                angle_min_deg: -10.0,
                angle_max_deg: 90.0,
                ..params()
            },
        );

        // 45 is inverted to -45 which is below the hard minimum
        assert!(joint.validate_angle(45.0, false).is_err());
        assert_eq!(joint.validate_angle(-45.0, false)?, 45.0);

        Ok(())
    }

    #[test]
    fn test_set_angle() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimServo::new(24);
        let mut driver = sim.clone();
        let mut joint = Joint::new(5, &params());
        joint.set_motion_profile(10, 3);

        joint.set_angle(&mut driver, 45.0, true)?;

        let state = sim.snapshot()?;
        assert_eq!(state.positions[5], 7000);
        assert_eq!(state.speeds[5], 10);
        assert_eq!(state.accels[5], 3);

        // Rejected angles never reach the driver
        assert!(joint.set_angle(&mut driver, 60.0, true).is_err());
        assert_eq!(sim.snapshot()?.positions[5], 7000);

        Ok(())
    }

    #[test]
    fn test_update_calibration() {
        let mut joint = Joint::new(0, &params());
        joint.update_calibration(5000, 7000);

        assert_eq!(joint.calibration(), (5000, 7000));
        assert_eq!(joint.angle_to_servo(0.0), 6000);
        assert_eq!(joint.angle_to_servo(-90.0), 5000);
    }
}
