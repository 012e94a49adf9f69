//! # Servo Controller Module
//!
//! This module provides a unified servo control interface which abstracts over the board driving
//! the leg servos. Targets are expressed in the controller's native quarter-microsecond units.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the Pololu Maestro servo controllers.
pub mod maestro;

/// In-memory [`ServoDriver`] used for dry runs and tests.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// EXPORTS
// ------------------------------------------------------------------------------------------------

pub use maestro::Maestro;
pub use sim::SimServo;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
///
/// A driver is shared by every joint of the robot, so all methods take the channel explicitly.
pub trait ServoDriver: Send {
    /// Set the target pulse width of a channel, in quarter-microseconds.
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), ServoError>;

    /// Set the speed limit of a channel. 0 means unlimited.
    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), ServoError>;

    /// Set the acceleration limit of a channel. 0 means unlimited.
    fn set_acceleration(&mut self, channel: u8, accel: u16) -> Result<(), ServoError>;

    /// Set the targets of a contiguous block of channels in one command.
    ///
    /// ## Arguments
    /// - `targets` - `(channel, target)` pairs, which must be non-empty and strictly sequential
    ///   (each channel one more than the previous). Use [`validate_batch`] to check.
    fn set_multiple_targets(&mut self, targets: &[(u8, u16)]) -> Result<(), ServoError>;

    /// Read back the current pulse width of a channel.
    fn get_position(&mut self, channel: u8) -> Result<u16, ServoError>;

    /// Returns true while any servo is still moving towards its target.
    fn get_moving_state(&mut self) -> Result<bool, ServoError>;

    /// Read and clear the controller's error register.
    fn get_error(&mut self) -> Result<u16, ServoError>;

    /// Send all servos to their home positions.
    fn go_home(&mut self) -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum ServoError {
    #[error("Servo controller I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not open the serial port: {0}")]
    SerialOpen(#[from] serialport::Error),

    #[error("Expected a {expected} byte reply from the controller, got {got}")]
    ShortReply { expected: usize, got: usize },

    #[error("Cannot send an empty batch of servo targets")]
    EmptyBatch,

    #[error("Channels in a batch must be sequential, found {next} after {prev}")]
    NonSequentialChannels { prev: u8, next: u8 },

    #[error("Channel {channel} is out of range, the controller has {num_channels} channels")]
    ChannelOutOfRange { channel: u8, num_channels: u8 },

    #[error("Servo driver state is poisoned")]
    Poisoned,
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that a batch of targets is non-empty and its channels are strictly sequential.
pub fn validate_batch(targets: &[(u8, u16)]) -> Result<(), ServoError> {
    if targets.is_empty() {
        return Err(ServoError::EmptyBatch);
    }

    for pair in targets.windows(2) {
        let (prev, next) = (pair[0].0, pair[1].0);
        if prev.checked_add(1) != Some(next) {
            return Err(ServoError::NonSequentialChannels { prev, next });
        }
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_validate_batch() {
        assert!(validate_batch(&[(0, 10), (1, 20), (2, 30)]).is_ok());
        assert!(validate_batch(&[(5, 10)]).is_ok());

        assert!(matches!(validate_batch(&[]), Err(ServoError::EmptyBatch)));
        assert!(matches!(
            validate_batch(&[(0, 10), (2, 20)]),
            Err(ServoError::NonSequentialChannels { prev: 0, next: 2 })
        ));
        assert!(matches!(
            validate_batch(&[(1, 10), (0, 20)]),
            Err(ServoError::NonSequentialChannels { prev: 1, next: 0 })
        ));
    }
}
