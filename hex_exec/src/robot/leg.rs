//! # Leg
//!
//! A three joint leg and its inverse kinematics.
//!
//! Leg frame: `+y` points outward from the body along the leg's mounting axis, `+x` is 90°
//! clockwise from it (looking down) and `+z` is up. Foot targets are given relative to the leg's
//! neutral foothold; the end-effector offset is the position of the coxa pivot relative to that
//! foothold, so subtracting it gives the foot relative to the pivot.
//!
//! The femur/tibia solve takes the knee-below-the-line branch: the femur is rotated down from the
//! pivot-to-foot line by the angle the law of cosines gives.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::trace;
use serde::{Deserialize, Serialize};
use util::maths::clamp;

use super::joint::{Joint, JointError, JointParams};
use crate::geometry::Vector3D;
use crate::servo_ctrl::ServoDriver;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Joint angles of one leg.
///
/// Units: degrees
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct JointAngles {
    pub coxa_deg: f64,
    pub femur_deg: f64,
    pub tibia_deg: f64,
}

/// Per-leg parameters: which channels drive it and where the foot origin is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LegParams {
    /// Controller channels of the coxa, femur and tibia servos.
    pub channels: [u8; 3],

    /// Position of the coxa pivot relative to the neutral foothold.
    ///
    /// Units: millimeters
    pub end_effector_offset_mm: [f64; 3],
}

/// A leg made of coxa, femur and tibia joints.
#[derive(Debug, Clone)]
pub struct Leg {
    pub coxa: Joint,
    pub femur: Joint,
    pub tibia: Joint,

    coxa_z_offset_mm: f64,
    end_effector_offset: Vector3D,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LegError {
    #[error(
        "Target ({:.1}, {:.1}, {:.1}) is unreachable: femur-to-foot distance {distance:.2} mm \
         is outside the reach [{min_reach:.2}, {max_reach:.2}] mm",
        .target.x, .target.y, .target.z
    )]
    Unreachable {
        target: Vector3D,
        distance: f64,
        min_reach: f64,
        max_reach: f64,
    },

    #[error("Joint error: {0}")]
    JointError(#[from] JointError),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Leg {
    pub fn new(
        params: &LegParams,
        coxa: &JointParams,
        femur: &JointParams,
        tibia: &JointParams,
        coxa_z_offset_mm: f64,
    ) -> Self {
        let [c, f, t] = params.channels;
        let [ox, oy, oz] = params.end_effector_offset_mm;

        Self {
            coxa: Joint::new(c, coxa),
            femur: Joint::new(f, femur),
            tibia: Joint::new(t, tibia),
            coxa_z_offset_mm,
            end_effector_offset: Vector3D::new(ox, oy, oz),
        }
    }

    pub fn end_effector_offset(&self) -> &Vector3D {
        &self.end_effector_offset
    }

    /// Solve the joint angles placing the foot at `target`.
    pub fn solve(&self, target: &Vector3D) -> Result<JointAngles, LegError> {
        let coxa_len = self.coxa.length_mm();
        let femur_len = self.femur.length_mm();
        let tibia_len = self.tibia.length_mm();

        let adj = target - self.end_effector_offset;

        let coxa = adj.x.atan2(adj.y);

        // Femur-to-foot triangle in the leg's vertical plane
        let planar = adj.x.hypot(adj.y) - coxa_len;
        let vertical = adj.z - self.coxa_z_offset_mm;
        let reach = planar.hypot(vertical);

        let max_reach = femur_len + tibia_len;
        let min_reach = (femur_len - tibia_len).abs();
        if reach > max_reach || reach < min_reach || reach == 0.0 {
            return Err(LegError::Unreachable {
                target: *target,
                distance: reach,
                min_reach,
                max_reach,
            });
        }

        let tibia = cos_rule(femur_len, tibia_len, reach);
        let femur = vertical.atan2(planar) - cos_rule(femur_len, reach, tibia_len);

        let angles = JointAngles {
            coxa_deg: coxa.to_degrees(),
            femur_deg: femur.to_degrees(),
            tibia_deg: tibia.to_degrees(),
        };

        trace!(
            "IK ({:.1}, {:.1}, {:.1}) -> {:?}",
            target.x,
            target.y,
            target.z,
            angles
        );

        Ok(angles)
    }

    /// Foot position produced by the given joint angles, the inverse of [`Leg::solve`].
    pub fn forward_kinematics(&self, angles: &JointAngles) -> Vector3D {
        let coxa = angles.coxa_deg.to_radians();
        let femur = angles.femur_deg.to_radians();
        let tibia = angles.tibia_deg.to_radians();

        // Tibia direction is the reversed femur turned back by the knee angle
        let tibia_dir = femur + std::f64::consts::PI - tibia;

        let planar = self.coxa.length_mm()
            + self.femur.length_mm() * femur.cos()
            + self.tibia.length_mm() * tibia_dir.cos();
        let vertical = self.coxa_z_offset_mm
            + self.femur.length_mm() * femur.sin()
            + self.tibia.length_mm() * tibia_dir.sin();

        Vector3D::new(planar * coxa.sin(), planar * coxa.cos(), vertical) + self.end_effector_offset
    }

    /// Validate the angles against every joint and map them to `(channel, target)` pairs.
    pub fn servo_targets(
        &self,
        angles: &JointAngles,
        check_custom_limits: bool,
    ) -> Result<[(u8, u16); 3], LegError> {
        Ok([
            self.coxa.servo_target(angles.coxa_deg, check_custom_limits)?,
            self.femur.servo_target(angles.femur_deg, check_custom_limits)?,
            self.tibia.servo_target(angles.tibia_deg, check_custom_limits)?,
        ])
    }

    /// Solve and move the leg to `target` one joint at a time.
    ///
    /// All three angles are validated before any joint is commanded.
    pub fn move_to(
        &self,
        driver: &mut dyn ServoDriver,
        target: &Vector3D,
        check_custom_limits: bool,
    ) -> Result<JointAngles, LegError> {
        let angles = self.solve(target)?;
        self.servo_targets(&angles, check_custom_limits)?;

        self.coxa.set_angle(driver, angles.coxa_deg, check_custom_limits)?;
        self.femur.set_angle(driver, angles.femur_deg, check_custom_limits)?;
        self.tibia.set_angle(driver, angles.tibia_deg, check_custom_limits)?;

        Ok(angles)
    }

    /// Apply a motion profile to all three joints.
    pub fn set_motion_profile(&mut self, speed: u16, accel: u16) {
        self.coxa.set_motion_profile(speed, accel);
        self.femur.set_motion_profile(speed, accel);
        self.tibia.set_motion_profile(speed, accel);
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Angle opposite side `c` in a triangle with sides `a`, `b`, `c`.
fn cos_rule(a: f64, b: f64, c: f64) -> f64 {
    clamp((a * a + b * b - c * c) / (2.0 * a * b), -1.0, 1.0).acos()
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::servo_ctrl::SimServo;

    fn leg() -> Leg {
        let coxa = JointParams {
            length_mm: 27.5,
            ..Default::default()
        };
        let femur = JointParams {
            length_mm: 52.5,
            angle_min_deg: -160.0,
            angle_max_deg: 20.0,
            ..Default::default()
        };
        let tibia = JointParams {
            length_mm: 140.0,
            angle_min_deg: 0.0,
            angle_max_deg: 180.0,
            ..Default::default()
        };
        Leg::new(
            &LegParams {
                channels: [0, 1, 2],
                end_effector_offset_mm: [0.0, -120.0, 120.0],
            },
            &coxa,
            &femur,
            &tibia,
            0.0,
        )
    }

    #[test]
    fn test_ik_round_trip() -> Result<(), LegError> {
        let leg = leg();

        let targets = [
            Vector3D::new(0.0, 0.0, 0.0),
            Vector3D::new(25.0, 10.0, 0.0),
            Vector3D::new(-20.0, -15.0, 10.0),
            Vector3D::new(5.0, 20.0, -25.0),
            Vector3D::new(-30.0, 0.0, 5.0),
        ];

        for target in targets.iter() {
            let angles = leg.solve(target)?;
            let reached = leg.forward_kinematics(&angles);
            assert!(
                (reached - target).norm() < 1.0,
                "target {:?} reached {:?}",
                target,
                reached
            );

            // Every target in the gait workspace maps onto valid servo targets
            leg.servo_targets(&angles, true)?;
        }

        Ok(())
    }

    #[test]
    fn test_ik_known_pose() -> Result<(), LegError> {
        let leg = leg();

        // Straight out along the leg axis at pivot height, fully extended less a little
        let reach = 27.5 + 52.5 + 140.0 - 1e-6;
        let angles = leg.solve(&Vector3D::new(0.0, reach - 120.0, 120.0))?;

        assert!(angles.coxa_deg.abs() < 1e-6);
        assert!(angles.femur_deg.abs() < 0.1);
        assert!((angles.tibia_deg - 180.0).abs() < 0.5);

        Ok(())
    }

    #[test]
    fn test_unreachable_boundary() {
        let leg = leg();
        let max_reach = 52.5 + 140.0;

        // Foot placed straight out from the femur pivot at pivot height
        let at = |reach: f64| Vector3D::new(0.0, 27.5 + reach - 120.0, 120.0);

        assert!(leg.solve(&at(max_reach - 1e-3)).is_ok());
        assert!(matches!(
            leg.solve(&at(max_reach + 1e-3)),
            Err(LegError::Unreachable { .. })
        ));

        // Too close to the femur pivot is unreachable as well
        assert!(matches!(
            leg.solve(&at(10.0)),
            Err(LegError::Unreachable { .. })
        ));
    }

    #[test]
    fn test_coxa_convention() -> Result<(), LegError> {
        let leg = leg();

        // Moving the foot towards +x swings the coxa positive
        assert!(leg.solve(&Vector3D::new(20.0, 0.0, 0.0))?.coxa_deg > 0.0);
        assert!(leg.solve(&Vector3D::new(-20.0, 0.0, 0.0))?.coxa_deg < 0.0);

        Ok(())
    }

    #[test]
    fn test_move_to() -> Result<(), Box<dyn std::error::Error>> {
        let sim = SimServo::new(24);
        let mut driver = sim.clone();
        let leg = leg();

        let angles = leg.move_to(&mut driver, &Vector3D::zeros(), true)?;
        let state = sim.snapshot()?;

        assert_eq!(state.positions[0], leg.coxa.angle_to_servo(angles.coxa_deg));
        assert_eq!(state.positions[1], leg.femur.angle_to_servo(angles.femur_deg));
        assert_eq!(state.positions[2], leg.tibia.angle_to_servo(angles.tibia_deg));

        Ok(())
    }
}
