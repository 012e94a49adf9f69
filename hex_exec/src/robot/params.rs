//! Parameters structure for the Hexapod

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::joint::JointParams;
use super::leg::LegParams;
use super::NUM_LEGS;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the Hexapod, loaded from `hexapod.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HexapodParams {
    // ---- CONTROLLER ----
    pub controller: ControllerParams,

    /// Default speed of all servos as a percentage, 0 for unlimited.
    pub speed_pct: u8,

    /// Default acceleration of all servos as a percentage, 0 for unlimited.
    pub accel_pct: u8,

    /// How long to wait for the servos to start moving after a command.
    ///
    /// Units: seconds
    pub motion_start_timeout_s: f64,

    /// Period between moving-state queries.
    ///
    /// Units: seconds
    pub motion_poll_period_s: f64,

    /// Longest a single move may take before it is considered stuck.
    ///
    /// Units: seconds
    pub motion_timeout_s: f64,

    // ---- GEOMETRY ----
    /// Side length of the regular hexagon formed by the coxa pivots.
    ///
    /// Units: millimeters
    pub hexagon_side_length_mm: f64,

    /// Height of the femur pivot above the coxa pivot.
    ///
    /// Units: millimeters
    pub coxa_z_offset_mm: f64,

    pub coxa: JointParams,
    pub femur: JointParams,
    pub tibia: JointParams,

    /// One entry per leg, numbered counter-clockwise from the right-hand leg.
    pub legs: Vec<LegParams>,

    // ---- STANCES ----
    pub predefined_positions: PredefinedPositionsParams,
}

/// Serial controller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerParams {
    /// Serial device the controller is attached to.
    pub device: String,

    pub baud_rate: u32,

    /// Number of channels on the controller board.
    pub num_channels: u8,

    /// Serial read timeout.
    ///
    /// Units: seconds
    pub read_timeout_s: f64,
}

/// Foot positions of each predefined stance, in the legs' local frames.
///
/// Units: millimeters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PredefinedPositionsParams {
    pub zero: [[f64; 3]; NUM_LEGS],
    pub low_profile: [[f64; 3]; NUM_LEGS],
    pub high_profile: [[f64; 3]; NUM_LEGS],
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for HexapodParams {
    fn default() -> Self {
        Self {
            controller: ControllerParams::default(),
            speed_pct: 25,
            accel_pct: 25,
            motion_start_timeout_s: 1.0,
            motion_poll_period_s: 0.2,
            motion_timeout_s: 10.0,
            hexagon_side_length_mm: 137.0,
            coxa_z_offset_mm: 0.0,
            coxa: JointParams {
                length_mm: 27.5,
                angle_min_deg: -90.0,
                angle_max_deg: 90.0,
                ..Default::default()
            },
            femur: JointParams {
                length_mm: 52.5,
                angle_min_deg: -160.0,
                angle_max_deg: 20.0,
                ..Default::default()
            },
            tibia: JointParams {
                length_mm: 140.0,
                angle_min_deg: 0.0,
                angle_max_deg: 180.0,
                ..Default::default()
            },
            legs: (0..NUM_LEGS as u8)
                .map(|i| LegParams {
                    channels: [3 * i, 3 * i + 1, 3 * i + 2],
                    end_effector_offset_mm: [0.0, -120.0, 120.0],
                })
                .collect(),
            predefined_positions: PredefinedPositionsParams::default(),
        }
    }
}

impl Default for ControllerParams {
    fn default() -> Self {
        Self {
            device: "/dev/ttyAMA0".into(),
            baud_rate: 9600,
            num_channels: 24,
            read_timeout_s: 0.1,
        }
    }
}

impl Default for PredefinedPositionsParams {
    fn default() -> Self {
        Self {
            zero: [[0.0, 0.0, 0.0]; NUM_LEGS],
            low_profile: [[0.0, 10.0, 40.0]; NUM_LEGS],
            high_profile: [[0.0, -10.0, -30.0]; NUM_LEGS],
        }
    }
}
