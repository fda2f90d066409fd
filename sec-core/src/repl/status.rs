//! Shared status surface for the REPL.
//!
//! The runtime implements [`StatusProvider`] so the REPL can show the cached
//! equipment state through the `status` command. [`StatusFormatter`] keeps the
//! textual rendering consistent across front ends.

use core::fmt;

use crate::config::{Khz, Tenths};
use crate::engine::PrepareOutcome;
use crate::frontend::{Tone, Voltage};
use crate::state::DeviceState;

/// Where the engine's single request slot stands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnginePhase {
    Idle,
    /// A request waits in the slot for the worker.
    Queued,
    Running,
}

impl EnginePhase {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EnginePhase::Idle => "idle",
            EnginePhase::Queued => "queued",
            EnginePhase::Running => "running",
        }
    }
}

/// Snapshot of the cached equipment state surfaced by the REPL.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub phase: EnginePhase,
    pub voltage: Option<Voltage>,
    pub voltage_increased: bool,
    pub tone: Option<Tone>,
    pub committed: Option<u8>,
    pub uncommitted: Option<u8>,
    pub rotor_position: Option<Tenths>,
    pub tuned_frequency: Option<Khz>,
    pub last_outcome: Option<PrepareOutcome>,
    pub completed_jobs: u32,
}

impl StatusSnapshot {
    /// Builds a snapshot with nothing known.
    #[must_use]
    pub const fn unknown() -> Self {
        Self {
            phase: EnginePhase::Idle,
            voltage: None,
            voltage_increased: false,
            tone: None,
            committed: None,
            uncommitted: None,
            rotor_position: None,
            tuned_frequency: None,
            last_outcome: None,
            completed_jobs: 0,
        }
    }

    /// Copies the active cache values.
    #[must_use]
    pub fn from_state(state: &DeviceState, phase: EnginePhase) -> Self {
        Self {
            phase,
            voltage: state.voltage,
            voltage_increased: state.voltage_increased,
            tone: state.tone,
            committed: state.committed.active(),
            uncommitted: state.uncommitted.active(),
            rotor_position: state.rotor_position.active(),
            tuned_frequency: state.tuned_frequency,
            ..Self::unknown()
        }
    }
}

/// Platform hook that supplies live status information.
pub trait StatusProvider {
    /// Returns a snapshot if the platform can currently provide one.
    fn snapshot(&self) -> Option<StatusSnapshot>;
}

/// Placeholder status provider that never reports snapshots.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoStatusProvider;

impl StatusProvider for NoStatusProvider {
    fn snapshot(&self) -> Option<StatusSnapshot> {
        None
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    /// Creates a new formatter for the provided snapshot.
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the supply line (e.g. `power voltage=18V+ tone=on`).
    pub fn write_power_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("power voltage=")?;
        match self.snapshot.voltage {
            Some(voltage) => {
                write!(writer, "{voltage}")?;
                if self.snapshot.voltage_increased && voltage != Voltage::Off {
                    writer.write_char('+')?;
                }
            }
            None => writer.write_str("unknown")?,
        }
        writer.write_str(" tone=")?;
        match self.snapshot.tone {
            Some(tone) => write!(writer, "{tone}"),
            None => writer.write_str("unknown"),
        }
    }

    /// Writes the switch line (e.g. `switch committed=F3 uncommitted=n/a`).
    pub fn write_switch_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("switch committed=")?;
        write_byte(writer, self.snapshot.committed)?;
        writer.write_str(" uncommitted=")?;
        write_byte(writer, self.snapshot.uncommitted)
    }

    /// Writes the rotor line (e.g. `rotor position=19.2E tuned=1400000kHz`).
    pub fn write_rotor_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("rotor position=")?;
        match self.snapshot.rotor_position {
            Some(tenths) => {
                let hemisphere = if tenths < 0 { 'W' } else { 'E' };
                let magnitude = tenths.unsigned_abs();
                write!(writer, "{}.{}{hemisphere}", magnitude / 10, magnitude % 10)?;
            }
            None => writer.write_str("unknown")?,
        }
        writer.write_str(" tuned=")?;
        match self.snapshot.tuned_frequency {
            Some(frequency) => write!(writer, "{frequency}kHz"),
            None => writer.write_str("n/a"),
        }
    }

    /// Writes the engine line (e.g. `engine phase=idle last=locked jobs=3`).
    pub fn write_engine_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        writer.write_str("engine phase=")?;
        writer.write_str(self.snapshot.phase.label())?;
        writer.write_str(" last=")?;
        match self.snapshot.last_outcome {
            Some(outcome) => write!(writer, "{outcome}")?,
            None => writer.write_str("n/a")?,
        }
        write!(writer, " jobs={}", self.snapshot.completed_jobs)
    }

    /// Writes every line, newline-terminated.
    pub fn write_all<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        self.write_power_line(writer)?;
        writer.write_char('\n')?;
        self.write_switch_line(writer)?;
        writer.write_char('\n')?;
        self.write_rotor_line(writer)?;
        writer.write_char('\n')?;
        self.write_engine_line(writer)?;
        writer.write_char('\n')
    }
}

fn write_byte<W: fmt::Write>(writer: &mut W, value: Option<u8>) -> fmt::Result {
    match value {
        Some(byte) => write!(writer, "{byte:02X}"),
        None => writer.write_str("n/a"),
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use std::string::String;

    fn render(snapshot: &StatusSnapshot) -> String {
        let mut text = String::new();
        StatusFormatter::new(snapshot).write_all(&mut text).unwrap();
        text
    }

    #[test]
    fn unknown_snapshot_renders_placeholders() {
        assert_eq!(
            render(&StatusSnapshot::unknown()),
            "power voltage=unknown tone=unknown\n\
             switch committed=n/a uncommitted=n/a\n\
             rotor position=unknown tuned=n/a\n\
             engine phase=idle last=n/a jobs=0\n"
        );
    }

    #[test]
    fn snapshot_mirrors_active_cache() {
        let mut state = DeviceState::new();
        state.voltage = Some(Voltage::V18);
        state.voltage_increased = true;
        state.tone = Some(Tone::On);
        state.committed.stage(0xF3);
        state.commit_switch();
        state.rotor_position.stage(-75);
        state.commit_rotor();
        state.tuned_frequency = Some(1_400_000);

        let mut snapshot = StatusSnapshot::from_state(&state, EnginePhase::Running);
        snapshot.last_outcome = Some(PrepareOutcome::Locked);
        snapshot.completed_jobs = 3;

        assert_eq!(
            render(&snapshot),
            "power voltage=18V+ tone=on\n\
             switch committed=F3 uncommitted=n/a\n\
             rotor position=7.5W tuned=1400000kHz\n\
             engine phase=running last=locked jobs=3\n"
        );
    }
}
