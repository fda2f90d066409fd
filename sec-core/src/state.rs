//! Last-known hardware state of one front end.
//!
//! Every slot starts out unknown (`None`). Unknown never compares equal to a
//! requested value, so a fresh cache always produces a full command sequence.
//! Switch and rotor slots are staged: the engine writes a pending value while
//! it drives the hardware and only commits it once the sequence got through.

use crate::config::{Khz, Tenths, ToneburstMode};
use crate::frontend::{Tone, Voltage};

/// Active/pending pair for values that are committed after a sequence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Staged<T> {
    active: Option<T>,
    pending: Option<T>,
}

impl<T: Copy + PartialEq> Staged<T> {
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            active: None,
            pending: None,
        }
    }

    #[must_use]
    pub fn active(&self) -> Option<T> {
        self.active
    }

    #[must_use]
    pub fn pending(&self) -> Option<T> {
        self.pending
    }

    /// Returns `true` when the active value is known and equal to `value`.
    #[must_use]
    pub fn is(&self, value: T) -> bool {
        self.active == Some(value)
    }

    /// Forgets the active value.
    pub fn invalidate(&mut self) {
        self.active = None;
    }

    pub fn stage(&mut self, value: T) {
        self.pending = Some(value);
    }

    /// Copies the pending value into the active slot.
    pub fn commit(&mut self) {
        self.active = self.pending;
    }
}

impl<T: Copy + PartialEq> Default for Staged<T> {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Command last sent to the positioner.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RotorCommand {
    Stored(u8),
    Angular(u16),
}

/// Cached state of one front end and the equipment behind it.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct DeviceState {
    pub voltage: Option<Voltage>,
    pub voltage_increased: bool,
    pub tone: Option<Tone>,
    pub committed: Staged<u8>,
    pub uncommitted: Staged<u8>,
    pub toneburst: Staged<ToneburstMode>,
    pub rotor_command: Staged<RotorCommand>,
    /// Satellite longitude the rotor points at.
    pub rotor_position: Staged<Tenths>,
    /// Transponder frequency minus the frequency the tuner was set to.
    pub frequency_offset: Option<i64>,
    pub tuned_frequency: Option<Khz>,
    pub high_band: Option<bool>,
    /// Tick budget of the most recent rotor move.
    pub motor_ticks: Option<u32>,
    rotor_reset_armed: bool,
}

impl DeviceState {
    /// Fresh cache with every slot unknown.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active voltage comparison; the increased flag only matters while powered.
    #[must_use]
    pub fn voltage_is(&self, voltage: Voltage, increased: bool) -> bool {
        match self.voltage {
            Some(current) if current == voltage => {
                voltage == Voltage::Off || self.voltage_increased == increased
            }
            _ => false,
        }
    }

    #[must_use]
    pub fn tone_is(&self, tone: Tone) -> bool {
        self.tone == Some(tone)
    }

    /// Both the rotor command and the position it reached are known.
    #[must_use]
    pub fn rotor_position_valid(&self) -> bool {
        self.rotor_command.active().is_some() && self.rotor_position.active().is_some()
    }

    /// Nothing is known about the switch tree, e.g. after power-up.
    #[must_use]
    pub fn switch_cache_cold(&self) -> bool {
        self.committed.active().is_none()
            && self.uncommitted.active().is_none()
            && self.toneburst.active().is_none()
    }

    pub fn invalidate_switch(&mut self) {
        self.committed.invalidate();
        self.uncommitted.invalidate();
        self.toneburst.invalidate();
    }

    pub fn commit_switch(&mut self) {
        self.committed.commit();
        self.uncommitted.commit();
        self.toneburst.commit();
    }

    pub fn invalidate_rotor(&mut self) {
        self.rotor_command.invalidate();
        self.rotor_position.invalidate();
    }

    pub fn commit_rotor(&mut self) {
        self.rotor_command.commit();
        self.rotor_position.commit();
    }

    /// Requests a one-shot rotor invalidation on the next engine run.
    pub fn arm_rotor_reset(&mut self) {
        self.rotor_reset_armed = true;
    }

    /// Consumes the one-shot rotor reset request.
    pub fn take_rotor_reset(&mut self) -> bool {
        core::mem::take(&mut self.rotor_reset_armed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cache_matches_nothing() {
        let state = DeviceState::new();
        assert!(!state.voltage_is(Voltage::Off, false));
        assert!(!state.voltage_is(Voltage::V13, false));
        assert!(!state.tone_is(Tone::Off));
        assert!(!state.committed.is(0xF0));
        assert!(!state.rotor_position_valid());
        assert!(state.switch_cache_cold());
    }

    #[test]
    fn voltage_comparison_respects_increased_flag() {
        let mut state = DeviceState::new();
        state.voltage = Some(Voltage::V18);
        state.voltage_increased = true;
        assert!(state.voltage_is(Voltage::V18, true));
        assert!(!state.voltage_is(Voltage::V18, false));

        state.voltage = Some(Voltage::Off);
        assert!(state.voltage_is(Voltage::Off, false));
        assert!(state.voltage_is(Voltage::Off, true));
    }

    #[test]
    fn staged_values_become_active_only_on_commit() {
        let mut slot = Staged::<u8>::unknown();
        slot.stage(0xF3);
        assert_eq!(slot.active(), None);
        assert_eq!(slot.pending(), Some(0xF3));

        slot.commit();
        assert!(slot.is(0xF3));

        slot.invalidate();
        assert_eq!(slot.active(), None);
        assert_eq!(slot.pending(), Some(0xF3));

        slot.commit();
        assert_eq!(slot.active(), Some(0xF3));
    }

    #[test]
    fn rotor_reset_is_one_shot() {
        let mut state = DeviceState::new();
        assert!(!state.take_rotor_reset());
        state.arm_rotor_reset();
        assert!(state.take_rotor_reset());
        assert!(!state.take_rotor_reset());
    }

    #[test]
    fn committing_switch_warms_the_cache() {
        let mut state = DeviceState::new();
        state.committed.stage(0xF0);
        state.uncommitted.stage(0);
        state.toneburst.stage(ToneburstMode::None);
        state.commit_switch();
        assert!(!state.switch_cache_cold());

        state.invalidate_switch();
        assert!(state.switch_cache_cold());
    }
}
