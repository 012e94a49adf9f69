//! Pololu Maestro driver using the Pololu serial protocol.
//!
//! Every packet is `0xAA, device number, command (MSB cleared), data...`. Values wider than 7 bits
//! are split into two data bytes, low 7 bits first.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use log::{debug, trace, warn};
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};

use super::{validate_batch, ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

const COMMAND_START: u8 = 0xAA;

/// Factory default device number.
pub const DEFAULT_DEVICE_NUMBER: u8 = 0x0C;

const CMD_SET_TARGET: u8 = 0x04;
const CMD_SET_SPEED: u8 = 0x07;
const CMD_SET_ACCELERATION: u8 = 0x09;
const CMD_GET_POSITION: u8 = 0x10;
const CMD_GET_MOVING_STATE: u8 = 0x13;
const CMD_SET_MULTIPLE_TARGETS: u8 = 0x1F;
const CMD_GET_ERRORS: u8 = 0x21;
const CMD_GO_HOME: u8 = 0x22;

/// Names of the bits in the error register, least significant first.
const ERROR_BITS: [&str; 9] = [
    "serial signal error",
    "serial overrun error",
    "serial buffer full",
    "serial CRC error",
    "serial protocol error",
    "serial timeout",
    "script stack error",
    "script call stack error",
    "script program counter error",
];

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A Maestro controller attached to a byte stream, normally a serial port.
pub struct Maestro<P> {
    port: P,
    device: u8,
    num_channels: u8,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Maestro<Box<dyn SerialPort>> {
    /// Open the controller on the given serial device with 8N1 framing.
    pub fn open(
        path: &str,
        baud_rate: u32,
        num_channels: u8,
        timeout: Duration,
    ) -> Result<Self, ServoError> {
        let port = serialport::new(path, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(timeout)
            .open()?;

        debug!("Opened Maestro on {} at {} baud", path, baud_rate);

        Ok(Self::new(port, num_channels))
    }
}

impl<P> Maestro<P>
where
    P: Read + Write + Send,
{
    /// Wrap an already open byte stream, addressing the default device number.
    pub fn new(port: P, num_channels: u8) -> Self {
        Self {
            port,
            device: DEFAULT_DEVICE_NUMBER,
            num_channels,
        }
    }

    /// Address a different device number on a shared line.
    pub fn with_device(mut self, device: u8) -> Self {
        self.device = device & 0x7F;
        self
    }

    /// Access the underlying stream.
    pub fn port(&self) -> &P {
        &self.port
    }

    fn check_channel(&self, channel: u8) -> Result<(), ServoError> {
        if channel >= self.num_channels {
            return Err(ServoError::ChannelOutOfRange {
                channel,
                num_channels: self.num_channels,
            });
        }
        Ok(())
    }

    fn send(&mut self, command: u8, data: &[u8]) -> Result<(), ServoError> {
        let mut packet = Vec::with_capacity(3 + data.len());
        packet.push(COMMAND_START);
        packet.push(self.device);
        packet.push(command & 0x7F);
        packet.extend_from_slice(data);

        trace!("Maestro tx: {:02X?}", packet);

        self.port.write_all(&packet)?;
        self.port.flush()?;
        Ok(())
    }

    fn send_channel_value(&mut self, command: u8, channel: u8, value: u16) -> Result<(), ServoError> {
        self.check_channel(channel)?;
        let [lo, hi] = encode_value(value);
        self.send(command, &[channel, lo, hi])
    }

    fn read_reply<const N: usize>(&mut self) -> Result<[u8; N], ServoError> {
        let mut buf = [0u8; N];
        let mut got = 0;

        while got < N {
            match self.port.read(&mut buf[got..]) {
                Ok(0) => break,
                Ok(n) => got += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }

        if got < N {
            return Err(ServoError::ShortReply { expected: N, got });
        }

        Ok(buf)
    }
}

impl<P> ServoDriver for Maestro<P>
where
    P: Read + Write + Send,
{
    fn set_target(&mut self, channel: u8, target: u16) -> Result<(), ServoError> {
        self.send_channel_value(CMD_SET_TARGET, channel, target)
    }

    fn set_speed(&mut self, channel: u8, speed: u16) -> Result<(), ServoError> {
        self.send_channel_value(CMD_SET_SPEED, channel, speed)
    }

    fn set_acceleration(&mut self, channel: u8, accel: u16) -> Result<(), ServoError> {
        self.send_channel_value(CMD_SET_ACCELERATION, channel, accel)
    }

    fn set_multiple_targets(&mut self, targets: &[(u8, u16)]) -> Result<(), ServoError> {
        validate_batch(targets)?;

        let first = targets[0].0;
        let last = first as usize + targets.len() - 1;
        if last >= self.num_channels as usize {
            return Err(ServoError::ChannelOutOfRange {
                channel: last.min(u8::MAX as usize) as u8,
                num_channels: self.num_channels,
            });
        }

        let mut data = Vec::with_capacity(2 + 2 * targets.len());
        data.push(targets.len() as u8);
        data.push(first);
        for (_, target) in targets {
            data.extend_from_slice(&encode_value(*target));
        }

        self.send(CMD_SET_MULTIPLE_TARGETS, &data)
    }

    fn get_position(&mut self, channel: u8) -> Result<u16, ServoError> {
        self.check_channel(channel)?;
        self.send(CMD_GET_POSITION, &[channel])?;
        let [lo, hi] = self.read_reply::<2>()?;
        Ok(u16::from_le_bytes([lo, hi]))
    }

    fn get_moving_state(&mut self) -> Result<bool, ServoError> {
        self.send(CMD_GET_MOVING_STATE, &[])?;
        let [state] = self.read_reply::<1>()?;
        Ok(state != 0)
    }

    fn get_error(&mut self) -> Result<u16, ServoError> {
        self.send(CMD_GET_ERRORS, &[])?;
        let [lo, hi] = self.read_reply::<2>()?;
        let error = u16::from_le_bytes([lo, hi]);

        for (bit, name) in ERROR_BITS.iter().enumerate() {
            if error & (1 << bit) != 0 {
                warn!("Maestro reported {}", name);
            }
        }

        Ok(error)
    }

    fn go_home(&mut self) -> Result<(), ServoError> {
        self.send(CMD_GO_HOME, &[])
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Split a value into the two 7-bit data bytes used by the protocol, low bits first.
pub fn encode_value(value: u16) -> [u8; 2] {
    [(value & 0x7F) as u8, ((value >> 7) & 0x7F) as u8]
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::VecDeque;

    /// Byte stream which records writes and replays canned replies.
    #[derive(Default)]
    struct MockPort {
        written: Vec<u8>,
        replies: VecDeque<u8>,
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let mut n = 0;
            while n < buf.len() {
                match self.replies.pop_front() {
                    Some(b) => {
                        buf[n] = b;
                        n += 1;
                    }
                    None => break,
                }
            }
            Ok(n)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn maestro(replies: &[u8]) -> Maestro<MockPort> {
        Maestro::new(
            MockPort {
                written: Vec::new(),
                replies: replies.iter().copied().collect(),
            },
            24,
        )
    }

    #[test]
    fn test_set_target_packet() -> Result<(), ServoError> {
        let mut m = maestro(&[]);

        // 1500 us on channel 0
        m.set_target(0, 6000)?;
        assert_eq!(m.port().written, vec![0xAA, 0x0C, 0x04, 0x00, 0x70, 0x2E]);

        Ok(())
    }

    #[test]
    fn test_speed_and_accel_packets() -> Result<(), ServoError> {
        let mut m = maestro(&[]);

        m.set_speed(3, 32)?;
        m.set_acceleration(3, 5)?;
        assert_eq!(
            m.port().written,
            vec![0xAA, 0x0C, 0x07, 0x03, 0x20, 0x00, 0xAA, 0x0C, 0x09, 0x03, 0x05, 0x00]
        );

        Ok(())
    }

    #[test]
    fn test_go_home_packet() -> Result<(), ServoError> {
        let mut m = maestro(&[]);

        m.go_home()?;
        assert_eq!(m.port().written, vec![0xAA, 0x0C, 0x22]);

        Ok(())
    }

    #[test]
    fn test_set_multiple_targets() -> Result<(), ServoError> {
        let mut m = maestro(&[]);

        m.set_multiple_targets(&[(2, 6000), (3, 4000)])?;
        assert_eq!(
            m.port().written,
            vec![0xAA, 0x0C, 0x1F, 0x02, 0x02, 0x70, 0x2E, 0x20, 0x1F]
        );

        // Nothing is written for rejected batches
        let mut m = maestro(&[]);
        assert!(m.set_multiple_targets(&[(0, 6000), (2, 6000)]).is_err());
        assert!(m.set_multiple_targets(&[]).is_err());
        assert!(m.set_multiple_targets(&[(23, 6000), (24, 6000)]).is_err());
        assert!(m.port().written.is_empty());

        Ok(())
    }

    #[test]
    fn test_queries() -> Result<(), ServoError> {
        let mut m = maestro(&[0x70, 0x17, 0x01, 0x00, 0x20, 0x00]);

        assert_eq!(m.get_position(1)?, 6000);
        assert!(m.get_moving_state()?);
        assert!(!m.get_moving_state()?);
        assert_eq!(m.get_error()?, 0x20);

        assert_eq!(
            m.port().written,
            vec![0xAA, 0x0C, 0x10, 0x01, 0xAA, 0x0C, 0x13, 0xAA, 0x0C, 0x13, 0xAA, 0x0C, 0x21]
        );

        Ok(())
    }

    #[test]
    fn test_short_reply() {
        let mut m = maestro(&[0x01]);
        assert!(matches!(
            m.get_position(0),
            Err(ServoError::ShortReply { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_channel_out_of_range() {
        let mut m = maestro(&[]);
        assert!(matches!(
            m.set_target(24, 6000),
            Err(ServoError::ChannelOutOfRange { channel: 24, .. })
        ));
    }
}
