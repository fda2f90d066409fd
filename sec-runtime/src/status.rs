//! Shared status storage for one front end.
//!
//! Lightweight atomics mirror the active cache, the engine phase and the last
//! outcome so the REPL can render a [`StatusSnapshot`] without waiting for the
//! worker to release the device state. Optional values are stored with a +1
//! offset (or a sentinel) so zero always means unknown.

use portable_atomic::{AtomicBool, AtomicI32, AtomicU8, AtomicU16, AtomicU32, AtomicU64, Ordering};
use sec_core::engine::PrepareOutcome;
use sec_core::frontend::{Tone, Voltage};
use sec_core::repl::status::{EnginePhase, StatusProvider, StatusSnapshot};
use sec_core::state::DeviceState;

const UNKNOWN_POSITION: i32 = i32::MIN;

/// Lock-free mirror of one device's status.
#[derive(Debug)]
pub struct StatusBoard {
    phase: AtomicU8,
    voltage: AtomicU8,
    voltage_increased: AtomicBool,
    tone: AtomicU8,
    committed: AtomicU16,
    uncommitted: AtomicU16,
    rotor_position: AtomicI32,
    tuned_frequency: AtomicU64,
    last_outcome: AtomicU8,
    completed_jobs: AtomicU32,
}

impl StatusBoard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: AtomicU8::new(encode_phase(EnginePhase::Idle)),
            voltage: AtomicU8::new(0),
            voltage_increased: AtomicBool::new(false),
            tone: AtomicU8::new(0),
            committed: AtomicU16::new(0),
            uncommitted: AtomicU16::new(0),
            rotor_position: AtomicI32::new(UNKNOWN_POSITION),
            tuned_frequency: AtomicU64::new(0),
            last_outcome: AtomicU8::new(0),
            completed_jobs: AtomicU32::new(0),
        }
    }

    /// Copies the active cache values.
    pub fn publish(&self, state: &DeviceState) {
        self.voltage
            .store(encode_voltage(state.voltage), Ordering::Relaxed);
        self.voltage_increased
            .store(state.voltage_increased, Ordering::Relaxed);
        self.tone.store(encode_tone(state.tone), Ordering::Relaxed);
        self.committed
            .store(encode_byte(state.committed.active()), Ordering::Relaxed);
        self.uncommitted
            .store(encode_byte(state.uncommitted.active()), Ordering::Relaxed);
        self.rotor_position.store(
            state.rotor_position.active().map_or(UNKNOWN_POSITION, i32::from),
            Ordering::Relaxed,
        );
        self.tuned_frequency.store(
            state.tuned_frequency.map_or(0, |khz| u64::from(khz) + 1),
            Ordering::Relaxed,
        );
    }

    pub fn set_phase(&self, phase: EnginePhase) {
        self.phase.store(encode_phase(phase), Ordering::Release);
    }

    #[must_use]
    pub fn phase(&self) -> EnginePhase {
        decode_phase(self.phase.load(Ordering::Acquire))
    }

    /// Stores the outcome of a finished job and bumps the job counter.
    pub fn record_outcome(&self, outcome: Option<PrepareOutcome>) {
        self.last_outcome
            .store(encode_outcome(outcome), Ordering::Relaxed);
        self.completed_jobs.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            phase: self.phase(),
            voltage: decode_voltage(self.voltage.load(Ordering::Relaxed)),
            voltage_increased: self.voltage_increased.load(Ordering::Relaxed),
            tone: decode_tone(self.tone.load(Ordering::Relaxed)),
            committed: decode_byte(self.committed.load(Ordering::Relaxed)),
            uncommitted: decode_byte(self.uncommitted.load(Ordering::Relaxed)),
            rotor_position: match self.rotor_position.load(Ordering::Relaxed) {
                UNKNOWN_POSITION => None,
                tenths => i16::try_from(tenths).ok(),
            },
            tuned_frequency: match self.tuned_frequency.load(Ordering::Relaxed) {
                0 => None,
                raw => u32::try_from(raw - 1).ok(),
            },
            last_outcome: decode_outcome(self.last_outcome.load(Ordering::Relaxed)),
            completed_jobs: self.completed_jobs.load(Ordering::Relaxed),
        }
    }
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusProvider for StatusBoard {
    fn snapshot(&self) -> Option<StatusSnapshot> {
        Some(StatusBoard::snapshot(self))
    }
}

const fn encode_phase(phase: EnginePhase) -> u8 {
    match phase {
        EnginePhase::Idle => 0,
        EnginePhase::Queued => 1,
        EnginePhase::Running => 2,
    }
}

fn decode_phase(raw: u8) -> EnginePhase {
    match raw {
        1 => EnginePhase::Queued,
        2 => EnginePhase::Running,
        _ => EnginePhase::Idle,
    }
}

fn encode_voltage(voltage: Option<Voltage>) -> u8 {
    match voltage {
        None => 0,
        Some(Voltage::Off) => 1,
        Some(Voltage::V13) => 2,
        Some(Voltage::V18) => 3,
    }
}

fn decode_voltage(raw: u8) -> Option<Voltage> {
    match raw {
        1 => Some(Voltage::Off),
        2 => Some(Voltage::V13),
        3 => Some(Voltage::V18),
        _ => None,
    }
}

fn encode_tone(tone: Option<Tone>) -> u8 {
    match tone {
        None => 0,
        Some(Tone::On) => 1,
        Some(Tone::Off) => 2,
    }
}

fn decode_tone(raw: u8) -> Option<Tone> {
    match raw {
        1 => Some(Tone::On),
        2 => Some(Tone::Off),
        _ => None,
    }
}

fn encode_byte(value: Option<u8>) -> u16 {
    value.map_or(0, |byte| u16::from(byte) + 1)
}

fn decode_byte(raw: u16) -> Option<u8> {
    raw.checked_sub(1).and_then(|value| u8::try_from(value).ok())
}

fn encode_outcome(outcome: Option<PrepareOutcome>) -> u8 {
    match outcome {
        None => 0,
        Some(PrepareOutcome::Locked) => 1,
        Some(PrepareOutcome::UnlockedTimedOut) => 2,
        Some(PrepareOutcome::Completed) => 3,
        Some(PrepareOutcome::Cancelled) => 4,
    }
}

fn decode_outcome(raw: u8) -> Option<PrepareOutcome> {
    match raw {
        1 => Some(PrepareOutcome::Locked),
        2 => Some(PrepareOutcome::UnlockedTimedOut),
        3 => Some(PrepareOutcome::Completed),
        4 => Some(PrepareOutcome::Cancelled),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_board_knows_nothing() {
        assert_eq!(StatusBoard::new().snapshot(), StatusSnapshot::unknown());
    }

    #[test]
    fn published_state_round_trips() {
        let mut state = DeviceState::new();
        state.voltage = Some(Voltage::V13);
        state.tone = Some(Tone::Off);
        state.committed.stage(0x00);
        state.commit_switch();
        state.rotor_position.stage(-1800);
        state.commit_rotor();
        state.tuned_frequency = Some(0);

        let board = StatusBoard::new();
        board.publish(&state);
        board.set_phase(EnginePhase::Queued);
        board.record_outcome(Some(PrepareOutcome::Cancelled));

        let snapshot = board.snapshot();
        assert_eq!(snapshot.phase, EnginePhase::Queued);
        assert_eq!(snapshot.voltage, Some(Voltage::V13));
        assert_eq!(snapshot.tone, Some(Tone::Off));
        assert_eq!(snapshot.committed, Some(0x00));
        assert_eq!(snapshot.uncommitted, None);
        assert_eq!(snapshot.rotor_position, Some(-1800));
        assert_eq!(snapshot.tuned_frequency, Some(0));
        assert_eq!(snapshot.last_outcome, Some(PrepareOutcome::Cancelled));
        assert_eq!(snapshot.completed_jobs, 1);
    }
}
