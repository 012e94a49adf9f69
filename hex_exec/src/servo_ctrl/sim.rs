//! Simulated servo controller.
//!
//! Servos reach their targets instantly, but the controller reports itself as moving for a
//! configurable number of polls after each command so motion-complete waits behave like they do
//! on hardware. The state is shared between clones, so a handle kept aside can inspect what a
//! driver owned by a [`crate::robot::Hexapod`] was told to do.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

use log::trace;

use super::{validate_batch, ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Handle onto a simulated controller.
#[derive(Debug, Clone)]
pub struct SimServo {
    state: Arc<Mutex<SimState>>,
}

/// Everything the simulated controller has been told.
#[derive(Debug, Clone)]
pub struct SimState {
    pub num_channels: u8,

    /// Current pulse width of each channel.
    pub positions: Vec<u16>,

    /// Last speed limit set on each channel.
    pub speeds: Vec<u16>,

    /// Last acceleration limit set on each channel.
    pub accels: Vec<u16>,

    /// Every batch sent with `set_multiple_targets`, oldest first.
    pub batches: Vec<Vec<(u8, u16)>>,

    /// Number of successfully handled commands.
    pub num_commands: usize,

    /// How many `get_moving_state` polls report `true` after each motion command.
    pub moving_polls_per_move: u32,

    /// If set, every command after this many more successful ones fails.
    pub fail_after: Option<usize>,

    moving_polls_remaining: u32,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServo {
    pub fn new(num_channels: u8) -> Self {
        Self {
            state: Arc::new(Mutex::new(SimState {
                num_channels,
                positions: vec![0; num_channels as usize],
                speeds: vec![0; num_channels as usize],
                accels: vec![0; num_channels as usize],
                batches: Vec::new(),
                num_commands: 0,
                moving_polls_per_move: 1,
                fail_after: None,
                moving_polls_remaining: 0,
            })),
        }
    }

    /// Take a copy of the simulated controller's state.
    pub fn snapshot(&self) -> Result<SimState, ServoError> {
        Ok(self.lock()?.clone())
    }

    /// Make every command fail once `n` more commands have succeeded.
    pub fn fail_after(&self, n: usize) -> Result<(), ServoError> {
        self.lock()?.fail_after = Some(n);
        Ok(())
    }

    /// Set how many moving-state polls report motion after each command.
    pub fn set_moving_polls(&self, polls: u32) -> Result<(), ServoError> {
        self.lock()?.moving_polls_per_move = polls;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, SimState>, ServoError> {
        self.state.lock().map_err(|_| ServoError::Poisoned)
    }

    /// Lock the state, checking the channel and the injected failure.
    fn command(&self, channel: Option<u8>) -> Result<MutexGuard<'_, SimState>, ServoError> {
        let mut state = self.lock()?;

        if let Some(remaining) = state.fail_after {
            if remaining == 0 {
                return Err(ServoError::Io(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "simulated controller failure",
                )));
            }
            state.fail_after = Some(remaining - 1);
        }

        if let Some(channel) = channel {
            if channel >= state.num_channels {
                return Err(ServoError::ChannelOutOfRange {
                    channel,
                    num_channels: state.num_channels,
                });
            }
        }

        state.num_commands += 1;
        Ok(state)
    }
}

impl ServoDriver for SimServo {
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), ServoError> {
        let mut state = self.command(Some(channel))?;
        state.positions[channel as usize] = target;
        state.moving_polls_remaining = state.moving_polls_per_move;
        Ok(())
    }

    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), ServoError> {
        self.command(Some(channel))?.speeds[channel as usize] = speed;
        Ok(())
    }

    fn set_acceleration(&mut self, channel: u8, accel: u16) -> Result<(), ServoError> {
        self.command(Some(channel))?.accels[channel as usize] = accel;
        Ok(())
    }

    fn set_multiple_targets(&mut self, targets: &[(u8, u16)]) -> Result<(), ServoError> {
        validate_batch(targets)?;

        let mut state = self.command(targets.last().map(|(c, _)| *c))?;
        for (channel, target) in targets {
            state.positions[*channel as usize] = *target;
        }
        state.batches.push(targets.to_vec());
        state.moving_polls_remaining = state.moving_polls_per_move;

        trace!("Sim servo batch of {} targets", targets.len());
        Ok(())
    }

    fn get_position(&mut self, channel: u8) -> Result<u16, ServoError> {
        Ok(self.command(Some(channel))?.positions[channel as usize])
    }

    fn get_moving_state(&mut self) -> Result<bool, ServoError> {
        let mut state = self.command(None)?;
        if state.moving_polls_remaining > 0 {
            state.moving_polls_remaining -= 1;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    fn get_error(&mut self) -> Result<u16, ServoError> {
        let _state = self.command(None)?;
        Ok(0)
    }

    fn go_home(&mut self) -> Result<(), ServoError> {
        let mut state = self.command(None)?;
        for p in state.positions.iter_mut() {
            *p = 0;
        }
        state.moving_polls_remaining = state.moving_polls_per_move;
        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sim_records_commands() -> Result<(), ServoError> {
        let sim = SimServo::new(24);
        let mut driver = sim.clone();

        driver.set_speed(1, 32)?;
        driver.set_multiple_targets(&[(0, 6000), (1, 5000)])?;

        let state = sim.snapshot()?;
        assert_eq!(state.speeds[1], 32);
        assert_eq!(state.positions[0], 6000);
        assert_eq!(state.positions[1], 5000);
        assert_eq!(state.batches.len(), 1);
        assert_eq!(driver.get_position(1)?, 5000);

        Ok(())
    }

    #[test]
    fn test_sim_moving_state() -> Result<(), ServoError> {
        let sim = SimServo::new(24);
        sim.set_moving_polls(2)?;
        let mut driver = sim.clone();

        assert!(!driver.get_moving_state()?);
        driver.set_target(0, 6000)?;
        assert!(driver.get_moving_state()?);
        assert!(driver.get_moving_state()?);
        assert!(!driver.get_moving_state()?);

        Ok(())
    }

    #[test]
    fn test_sim_failure_injection() -> Result<(), ServoError> {
        let sim = SimServo::new(24);
        let mut driver = sim.clone();
        sim.fail_after(1)?;

        driver.set_target(0, 6000)?;
        assert!(matches!(driver.set_target(0, 6000), Err(ServoError::Io(_))));
        assert!(driver.get_moving_state().is_err());

        Ok(())
    }

    #[test]
    fn test_sim_error_query() -> Result<(), ServoError> {
        let sim = SimServo::new(24);
        let mut driver = sim.clone();

        assert_eq!(driver.get_error()?, 0);
        assert_eq!(driver.get_error()?, 0);
        assert_eq!(sim.snapshot()?.num_commands, 2);

        // The state lock is released after each query
        driver.set_target(3, 6000)?;
        sim.fail_after(0)?;
        assert!(matches!(driver.get_error(), Err(ServoError::Io(_))));

        Ok(())
    }
}
