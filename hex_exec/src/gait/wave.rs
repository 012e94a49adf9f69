//! Wave gait, one leg swings at a time while the other five stay planted

use super::{Gait, GaitCore, GaitError, GaitParams, GaitPhase, GaitState, PhaseGraph};
use crate::robot::NUM_LEGS;

pub struct WaveGait {
    core: GaitCore,
}

impl WaveGait {
    pub fn new(params: GaitParams) -> Self {
        let mut gait = Self {
            core: GaitCore::new(params),
        };
        let graph = gait.setup_graph();
        gait.core.set_graph(graph);
        gait
    }
}

impl Gait for WaveGait {
    fn name(&self) -> &'static str {
        "wave"
    }

    fn core(&self) -> &GaitCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut GaitCore {
        &mut self.core
    }

    /// Wave1 -> Wave2 -> ... -> Wave6 -> Wave1
    fn setup_graph(&self) -> PhaseGraph {
        let phases: Vec<GaitPhase> = (0..NUM_LEGS).filter_map(GaitPhase::wave).collect();

        phases
            .iter()
            .zip(phases.iter().cycle().skip(1))
            .map(|(&from, &to)| (from, vec![to]))
            .collect()
    }

    fn initial_phase(&self) -> GaitPhase {
        GaitPhase::Wave1
    }

    fn get_state(&self, phase: GaitPhase) -> Result<GaitState, GaitError> {
        let swing_leg = (0..NUM_LEGS)
            .find(|&i| GaitPhase::wave(i) == Some(phase))
            .ok_or(GaitError::InvalidPhase(phase))?;

        let params = self.core.params();
        Ok(GaitState::new(
            phase,
            &[swing_leg],
            params.dwell_time_s,
            params.stability_threshold,
        ))
    }
}
