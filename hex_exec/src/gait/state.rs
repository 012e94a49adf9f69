//! Gait phases and the per-phase leg assignment

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::BTreeSet;
use std::fmt;

use serde::Serialize;

use crate::robot::NUM_LEGS;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A phase of one of the gaits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum GaitPhase {
    TripodA,
    TripodB,
    Wave1,
    Wave2,
    Wave3,
    Wave4,
    Wave5,
    Wave6,
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Which legs swing and which stay planted during a phase, and how long the phase holds.
///
/// The swing and stance sets always partition the six legs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitState {
    pub phase: GaitPhase,
    pub swing_legs: BTreeSet<usize>,
    pub stance_legs: BTreeSet<usize>,

    /// Units: seconds
    pub dwell_time_s: f64,

    pub stability_threshold: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl GaitPhase {
    /// Wave phase in which the given leg swings.
    pub fn wave(leg_index: usize) -> Option<Self> {
        match leg_index {
            0 => Some(Self::Wave1),
            1 => Some(Self::Wave2),
            2 => Some(Self::Wave3),
            3 => Some(Self::Wave4),
            4 => Some(Self::Wave5),
            5 => Some(Self::Wave6),
            _ => None,
        }
    }
}

impl fmt::Display for GaitPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl GaitState {
    /// Build a state from its swing legs, every other leg is in stance.
    ///
    /// Indices outside `0..NUM_LEGS` are ignored.
    pub fn new(
        phase: GaitPhase,
        swing_legs: &[usize],
        dwell_time_s: f64,
        stability_threshold: f64,
    ) -> Self {
        let swing_legs: BTreeSet<usize> = swing_legs
            .iter()
            .copied()
            .filter(|&i| i < NUM_LEGS)
            .collect();
        let stance_legs = (0..NUM_LEGS).filter(|i| !swing_legs.contains(i)).collect();

        Self {
            phase,
            swing_legs,
            stance_legs,
            dwell_time_s,
            stability_threshold,
        }
    }

    pub fn is_swing(&self, leg_index: usize) -> bool {
        self.swing_legs.contains(&leg_index)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
