//! # Gaits
//!
//! A gait is a cyclic graph of phases. Each phase splits the legs into a swing group, which
//! lifts and steps, and a stance group, which stays planted and pushes the body along.
//!
//! The gaits only plan: given the current foot positions they produce a target and a waypoint
//! path for every leg. Driving the legs along those paths is left to the
//! [`GaitGenerator`](crate::gait_gen::GaitGenerator).

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod base;
mod direction;
mod params;
mod path;
mod state;
mod tripod;
mod wave;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use base::{project_point_to_circle, GaitCore, PhaseGraph};
pub use direction::{Direction, NamedDirection};
pub use params::GaitParams;
pub use path::LegPath;
pub use state::{GaitPhase, GaitState};
pub use tripod::TripodGait;
pub use wave::WaveGait;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The available gaits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaitKind {
    Tripod,
    Wave,
}

#[derive(Debug, thiserror::Error)]
pub enum GaitError {
    #[error(
        "Unknown direction \"{0}\", expected one of forward, backward, left, right, \
         diagonal-fr, diagonal-fl, diagonal-br, diagonal-bl or stop"
    )]
    UnknownDirection(String),

    #[error("Phase {0} is not part of this gait")]
    InvalidPhase(GaitPhase),

    #[error("Leg index {0} is out of range")]
    InvalidLegIndex(usize),

    #[error("Unknown gait \"{0}\", expected tripod or wave")]
    UnknownGait(String),
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A walking pattern.
///
/// Implementors provide the phase table, the shared planning lives in [`GaitCore`].
pub trait Gait: Send {
    fn name(&self) -> &'static str;

    fn core(&self) -> &GaitCore;

    fn core_mut(&mut self) -> &mut GaitCore;

    /// Build the phase transition graph.
    fn setup_graph(&self) -> PhaseGraph;

    /// Phase a fresh run starts in.
    fn initial_phase(&self) -> GaitPhase;

    /// Swing and stance assignment of a phase.
    fn get_state(&self, phase: GaitPhase) -> Result<GaitState, GaitError>;

    fn next_phase(&self, phase: GaitPhase) -> Result<GaitPhase, GaitError> {
        self.core().next_phase(phase)
    }

    fn set_direction(&mut self, direction: Direction, rotation: f64) {
        self.core_mut().set_direction(direction, rotation)
    }
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl FromStr for GaitKind {
    type Err = GaitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tripod" => Ok(Self::Tripod),
            "wave" => Ok(Self::Wave),
            _ => Err(GaitError::UnknownGait(s.into())),
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Create a gait of the given kind.
pub fn create_gait(kind: GaitKind, params: GaitParams) -> Box<dyn Gait> {
    match kind {
        GaitKind::Tripod => Box::new(TripodGait::new(params)),
        GaitKind::Wave => Box::new(WaveGait::new(params)),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Vector3D;
    use crate::robot::{LegPositions, NUM_LEGS};

    #[test]
    fn test_create_gait() -> Result<(), GaitError> {
        let tripod = create_gait("Tripod".parse()?, GaitParams::default());
        assert_eq!(tripod.name(), "tripod");
        assert_eq!(tripod.initial_phase(), GaitPhase::TripodA);

        let wave = create_gait("wave".parse()?, GaitParams::default());
        assert_eq!(wave.name(), "wave");
        assert_eq!(wave.core().graph().len(), 6);

        assert!(matches!(
            "ripple".parse::<GaitKind>(),
            Err(GaitError::UnknownGait(_))
        ));

        Ok(())
    }

    /// A full tripod phase planned from the neutral stance.
    #[test]
    fn test_plan_tripod_phase() -> Result<(), GaitError> {
        let mut gait = create_gait(GaitKind::Tripod, GaitParams::default());
        gait.set_direction("forward".parse()?, 0.0);

        let positions: LegPositions = [Vector3D::zeros(); NUM_LEGS];
        let state = gait.get_state(gait.initial_phase())?;
        gait.core_mut().plan_phase(&positions, &state)?;

        for leg in 0..NUM_LEGS {
            let path = gait
                .core()
                .leg_path(leg)
                .ok_or(GaitError::InvalidLegIndex(leg))?;
            let target = path.last().ok_or(GaitError::InvalidLegIndex(leg))?;

            assert!((target.xy().norm() - 30.0).abs() < 1e-6);
            assert_eq!(target.z, 0.0);

            if state.is_swing(leg) {
                assert_eq!(path.len(), 4);
                assert!(path.waypoints()[1..3].iter().all(|w| w.z > 0.0));
            } else {
                assert_eq!(path.len(), 2);
            }
        }

        Ok(())
    }
}
