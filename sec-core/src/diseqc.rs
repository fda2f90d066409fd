//! DiSEqC master frame encoding.
//!
//! A frame is a framing byte, an address byte, a command byte and up to three
//! data bytes. Frames are stored inline so they can be queued and logged
//! without allocation.

use core::fmt;

use heapless::Vec;

/// Longest DiSEqC master frame.
pub const MAX_FRAME_LEN: usize = 6;

/// Framing byte for a first transmission (no reply expected).
pub const FRAMING_FIRST: u8 = 0xE0;
/// Framing byte for a repeated transmission.
pub const FRAMING_REPEAT: u8 = 0xE1;

/// Reset DiSEqC microcontroller.
pub const CMD_RESET: u8 = 0x00;
/// Switch peripheral power supply on.
pub const CMD_POWER_ON: u8 = 0x03;
/// Write committed switch port.
pub const CMD_COMMITTED: u8 = 0x38;
/// Write uncommitted switch port.
pub const CMD_UNCOMMITTED: u8 = 0x39;
/// EN50494 ODU channel change.
pub const CMD_ODU_CHANNEL_CHANGE: u8 = 0x5A;
/// Stop positioner movement.
pub const CMD_HALT: u8 = 0x60;
/// Disable soft limits.
pub const CMD_LIMITS_OFF: u8 = 0x63;
/// Store east soft limit.
pub const CMD_LIMIT_EAST: u8 = 0x66;
/// Store west soft limit.
pub const CMD_LIMIT_WEST: u8 = 0x67;
/// Drive east.
pub const CMD_DRIVE_EAST: u8 = 0x68;
/// Drive west.
pub const CMD_DRIVE_WEST: u8 = 0x69;
/// Store position `n`, or re-enable limits with `n == 0`.
pub const CMD_STORE_POSITION: u8 = 0x6A;
/// Drive to stored position.
pub const CMD_GOTO_POSITION: u8 = 0x6B;
/// Drive to an angular position (USALS).
pub const CMD_GOTO_ANGULAR: u8 = 0x6E;

/// DiSEqC slave address families.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Address {
    Any,
    LnbSwitch,
    AnyPositioner,
    PolarPositioner,
    ElevationPositioner,
    Subscriber,
}

impl Address {
    #[must_use]
    pub const fn byte(self) -> u8 {
        match self {
            Address::Any => 0x00,
            Address::LnbSwitch => 0x10,
            Address::AnyPositioner => 0x30,
            Address::PolarPositioner => 0x31,
            Address::ElevationPositioner => 0x32,
            Address::Subscriber => 0x71,
        }
    }
}

/// Positioner drive direction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Direction {
    East,
    West,
}

impl Direction {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Direction::East => "east",
            Direction::West => "west",
        }
    }
}

/// Unit byte of a drive command.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DriveUnit {
    /// Drive until halted.
    Continuous,
    /// Drive for `1..=127` seconds.
    Seconds(u8),
    /// Drive `1..=128` steps.
    Steps(u8),
}

impl DriveUnit {
    /// Encodes the unit, or `None` when the count is out of range.
    #[must_use]
    pub fn byte(self) -> Option<u8> {
        match self {
            DriveUnit::Continuous => Some(0x00),
            DriveUnit::Seconds(seconds @ 1..=127) => Some(seconds),
            DriveUnit::Steps(steps @ 1..=128) => Some(steps.wrapping_neg()),
            DriveUnit::Seconds(_) | DriveUnit::Steps(_) => None,
        }
    }
}

/// Frame construction errors.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FrameError {
    /// More than [`MAX_FRAME_LEN`] bytes were supplied.
    TooLong,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::TooLong => write!(f, "frame exceeds {MAX_FRAME_LEN} bytes"),
        }
    }
}

/// One DiSEqC master frame.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DiseqcFrame {
    bytes: Vec<u8, MAX_FRAME_LEN>,
}

impl DiseqcFrame {
    /// Builds a frame from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        Vec::from_slice(bytes)
            .map(|bytes| Self { bytes })
            .map_err(|_| FrameError::TooLong)
    }

    fn header(framing: u8, address: Address, command: u8) -> Self {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&[framing, address.byte(), command]).ok();
        Self { bytes }
    }

    fn with_data(mut self, data: &[u8]) -> Self {
        for byte in data {
            if self.bytes.push(*byte).is_err() {
                break;
            }
        }
        self
    }

    /// `E0 00 00`: reset every DiSEqC microcontroller on the bus.
    #[must_use]
    pub fn reset() -> Self {
        Self::header(FRAMING_FIRST, Address::Any, CMD_RESET)
    }

    /// `E0 00 03`: switch peripheral power supplies on.
    #[must_use]
    pub fn power_on() -> Self {
        Self::header(FRAMING_FIRST, Address::Any, CMD_POWER_ON)
    }

    /// Committed or uncommitted switch command.
    #[must_use]
    pub fn switch(framing: u8, command: u8, value: u8) -> Self {
        Self::header(framing, Address::LnbSwitch, command).with_data(&[value])
    }

    /// Single positioner command addressed to the polar positioner.
    #[must_use]
    pub fn positioner(command: u8, data: &[u8]) -> Self {
        Self::header(FRAMING_FIRST, Address::PolarPositioner, command).with_data(data)
    }

    #[must_use]
    pub fn halt() -> Self {
        Self::positioner(CMD_HALT, &[])
    }

    #[must_use]
    pub fn limits_off() -> Self {
        Self::positioner(CMD_LIMITS_OFF, &[])
    }

    #[must_use]
    pub fn limits_on() -> Self {
        Self::positioner(CMD_STORE_POSITION, &[0x00])
    }

    #[must_use]
    pub fn store_limit(direction: Direction) -> Self {
        match direction {
            Direction::East => Self::positioner(CMD_LIMIT_EAST, &[]),
            Direction::West => Self::positioner(CMD_LIMIT_WEST, &[]),
        }
    }

    /// Drive command; `unit` is the already encoded unit byte.
    #[must_use]
    pub fn drive(direction: Direction, unit: u8) -> Self {
        match direction {
            Direction::East => Self::positioner(CMD_DRIVE_EAST, &[unit]),
            Direction::West => Self::positioner(CMD_DRIVE_WEST, &[unit]),
        }
    }

    #[must_use]
    pub fn store_position(slot: u8) -> Self {
        Self::positioner(CMD_STORE_POSITION, &[slot])
    }

    #[must_use]
    pub fn goto_position(slot: u8) -> Self {
        Self::positioner(CMD_GOTO_POSITION, &[slot])
    }

    /// USALS goto with the 16-bit rotor word, high byte first.
    #[must_use]
    pub fn goto_angular(word: u16) -> Self {
        Self::positioner(CMD_GOTO_ANGULAR, &word.to_be_bytes())
    }

    /// EN50494 channel change `E0 10 5A d1 d2`.
    #[must_use]
    pub fn odu_channel_change(d1: u8, d2: u8) -> Self {
        Self::header(FRAMING_FIRST, Address::LnbSwitch, CMD_ODU_CHANNEL_CHANGE).with_data(&[d1, d2])
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[must_use]
    pub fn framing(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    #[must_use]
    pub fn address(&self) -> Option<u8> {
        self.bytes.get(1).copied()
    }

    #[must_use]
    pub fn command(&self) -> Option<u8> {
        self.bytes.get(2).copied()
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.bytes.get(3..).unwrap_or(&[])
    }

    /// Copy-friendly snapshot for telemetry.
    #[must_use]
    pub fn snapshot(&self) -> FrameBytes {
        let mut raw = [0u8; MAX_FRAME_LEN];
        raw[..self.bytes.len()].copy_from_slice(&self.bytes);
        // Bounded by MAX_FRAME_LEN.
        #[allow(clippy::cast_possible_truncation)]
        let len = self.bytes.len() as u8;
        FrameBytes { raw, len }
    }
}

impl fmt::Display for DiseqcFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, &self.bytes)
    }
}

/// Fixed-size copy of a frame.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FrameBytes {
    raw: [u8; MAX_FRAME_LEN],
    len: u8,
}

impl FrameBytes {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw[..usize::from(self.len)]
    }
}

impl fmt::Display for FrameBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_hex(f, self.as_bytes())
    }
}

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (index, byte) in bytes.iter().enumerate() {
        if index > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{byte:02X}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::ToString;

    #[test]
    fn reset_and_power_on_address_every_device() {
        assert_eq!(DiseqcFrame::reset().as_bytes(), &[0xE0, 0x00, 0x00]);
        assert_eq!(DiseqcFrame::power_on().as_bytes(), &[0xE0, 0x00, 0x03]);
    }

    #[test]
    fn committed_frame_layout() {
        let frame = DiseqcFrame::switch(FRAMING_REPEAT, CMD_COMMITTED, 0xF3);
        assert_eq!(frame.framing(), Some(0xE1));
        assert_eq!(frame.address(), Some(0x10));
        assert_eq!(frame.command(), Some(0x38));
        assert_eq!(frame.data(), &[0xF3]);
        assert_eq!(frame.to_string(), "E1 10 38 F3");
    }

    #[test]
    fn goto_angular_is_big_endian() {
        let frame = DiseqcFrame::goto_angular(0xE628);
        assert_eq!(frame.as_bytes(), &[0xE0, 0x31, 0x6E, 0xE6, 0x28]);
    }

    #[test]
    fn drive_units_encode_steps_as_negative_counts() {
        assert_eq!(DriveUnit::Continuous.byte(), Some(0x00));
        assert_eq!(DriveUnit::Seconds(5).byte(), Some(0x05));
        assert_eq!(DriveUnit::Steps(1).byte(), Some(0xFF));
        assert_eq!(DriveUnit::Steps(10).byte(), Some(0xF6));
        assert_eq!(DriveUnit::Steps(128).byte(), Some(0x80));
        assert_eq!(DriveUnit::Steps(0).byte(), None);
        assert_eq!(DriveUnit::Steps(129).byte(), None);
        assert_eq!(DriveUnit::Seconds(0).byte(), None);
        assert_eq!(DriveUnit::Seconds(128).byte(), None);
    }

    #[test]
    fn limits_on_reuses_store_position_zero() {
        assert_eq!(DiseqcFrame::limits_on().as_bytes(), &[0xE0, 0x31, 0x6A, 0x00]);
        assert_eq!(DiseqcFrame::limits_off().as_bytes(), &[0xE0, 0x31, 0x63]);
    }

    #[test]
    fn rejects_oversized_raw_frames() {
        assert_eq!(
            DiseqcFrame::from_bytes(&[0xE0, 0x10, 0x38, 0xF0, 0, 0, 0]),
            Err(FrameError::TooLong)
        );
        let frame = DiseqcFrame::from_bytes(&[0xE0, 0x10, 0x5A, 0x21, 0x5C]).unwrap();
        assert_eq!(frame.snapshot().as_bytes(), frame.as_bytes());
    }
}
