//! Parameters for the gait generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::robot::PredefinedPosition;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gait generator parameters, loaded from `gait_gen.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GaitGenParams {
    /// Pause after each grouped move before the next waypoint is commanded.
    ///
    /// Units: seconds
    pub settle_delay_s: f64,

    /// Period at which cancellation and stability are checked while waiting.
    ///
    /// Units: seconds
    pub poll_period_s: f64,

    /// Longest `stop` waits for the worker to exit before detaching it.
    ///
    /// Units: seconds
    pub stop_timeout_s: f64,

    /// How long the body may stay unstable during a dwell before the run is aborted.
    ///
    /// Units: seconds
    pub unstable_timeout_s: f64,

    /// Stance driven to when a run fails.
    pub recovery_position: PredefinedPosition,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for GaitGenParams {
    fn default() -> Self {
        Self {
            settle_delay_s: 0.5,
            poll_period_s: 0.01,
            stop_timeout_s: 10.0,
            unstable_timeout_s: 2.0,
            recovery_position: PredefinedPosition::HighProfile,
        }
    }
}
