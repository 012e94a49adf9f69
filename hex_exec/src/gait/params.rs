//! Parameters structure for the gaits

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::robot::NUM_LEGS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gait parameters, loaded from `gait.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitParams {
    /// Radius of the circle each foot may move within, centred on its neutral foothold.
    ///
    /// Units: millimeters
    pub step_radius_mm: f64,

    /// Height swing legs are lifted above their target.
    ///
    /// Units: millimeters
    pub leg_lift_distance_mm: f64,

    /// Slope of the lift and lower segments of a swing, height per horizontal distance.
    pub leg_lift_incline: f64,

    /// Body height offset, planted feet sit at `-stance_height_mm`.
    ///
    /// Units: millimeters
    pub stance_height_mm: f64,

    /// Time each phase holds before the next.
    ///
    /// Units: seconds
    pub dwell_time_s: f64,

    /// Tolerance of the stability gate, applied to both acceleration and rotation rate.
    pub stability_threshold: f64,

    /// Angle of each leg's outward axis, counter-clockwise from the body's `+x`.
    ///
    /// Units: degrees
    pub leg_mount_angles_deg: [f64; NUM_LEGS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for GaitParams {
    fn default() -> Self {
        Self {
            step_radius_mm: 30.0,
            leg_lift_distance_mm: 10.0,
            leg_lift_incline: 2.0,
            stance_height_mm: 0.0,
            dwell_time_s: 0.5,
            stability_threshold: 0.2,
            leg_mount_angles_deg: [0.0, 60.0, 120.0, 180.0, 240.0, 300.0],
        }
    }
}
