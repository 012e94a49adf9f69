//! Tripod gait, two alternating groups of three legs

use super::{Gait, GaitCore, GaitError, GaitParams, GaitPhase, GaitState, PhaseGraph};

/// Legs swinging in the first tripod phase, the other three swing in the second.
const TRIPOD_A_LEGS: [usize; 3] = [0, 2, 4];
const TRIPOD_B_LEGS: [usize; 3] = [1, 3, 5];

pub struct TripodGait {
    core: GaitCore,
}

impl TripodGait {
    pub fn new(params: GaitParams) -> Self {
        let mut gait = Self {
            core: GaitCore::new(params),
        };
        let graph = gait.setup_graph();
        gait.core.set_graph(graph);
        gait
    }
}

impl Gait for TripodGait {
    fn name(&self) -> &'static str {
        "tripod"
    }

    fn core(&self) -> &GaitCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaitCore {
        &mut self.core
    }

    fn setup_graph(&self) -> PhaseGraph {
        let mut graph = PhaseGraph::new();
        graph.insert(GaitPhase::TripodA, vec![GaitPhase::TripodB]);
        graph.insert(GaitPhase::TripodB, vec![GaitPhase::TripodA]);
        graph
    }

    fn initial_phase(&self) -> GaitPhase {
        GaitPhase::TripodA
    }

    fn get_state(&self, phase: GaitPhase) -> Result<GaitState, GaitError> {
        let swing = match phase {
            GaitPhase::TripodA => &TRIPOD_A_LEGS,
            GaitPhase::TripodB => &TRIPOD_B_LEGS,
            _ => return Err(GaitError::InvalidPhase(phase)),
        };

        let params = self.core.params();
        Ok(GaitState::new(
            phase,
            swing,
            params.dwell_time_s,
            params.stability_threshold,
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_states() -> Result<(), GaitError> {
        let gait = TripodGait::new(GaitParams::default());

        let a = gait.get_state(GaitPhase::TripodA)?;
        assert_eq!(a.swing_legs.iter().copied().collect::<Vec<_>>(), vec![0, 2, 4]);
        assert_eq!(a.stance_legs.iter().copied().collect::<Vec<_>>(), vec![1, 3, 5]);
        assert_eq!(a.dwell_time_s, 0.5);

        let b = gait.get_state(GaitPhase::TripodB)?;
        assert_eq!(b.swing_legs, a.stance_legs);

        assert!(matches!(
            gait.get_state(GaitPhase::Wave1),
            Err(GaitError::InvalidPhase(GaitPhase::Wave1))
        ));

        Ok(())
    }

    #[test]
    fn test_period() -> Result<(), GaitError> {
        let gait = TripodGait::new(GaitParams::default());

        let start = gait.initial_phase();
        let next = gait.next_phase(start)?;
        assert_ne!(next, start);
        assert_eq!(gait.next_phase(next)?, start);

        Ok(())
    }
}
