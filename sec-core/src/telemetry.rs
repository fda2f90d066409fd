//! SEC telemetry catalog and ring buffer.
//!
//! The engine reports every bus-visible action and sequence milestone as a
//! [`SecEvent`]. Records carry the offset into the running sequence (the sum
//! of all delays so far) instead of a wall-clock timestamp, which keeps the
//! recorder `no_std` and makes transcripts reproducible.

use core::fmt;
use core::time::Duration;

use heapless::HistoryBuf;

use crate::config::Khz;
use crate::diseqc::FrameBytes;
use crate::engine::{PrepareOutcome, SecOperation};
use crate::frontend::{Burst, Tone, Voltage};

/// Identifier assigned to each telemetry record.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Events emitted while a sequence runs.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SecEvent {
    Started(SecOperation),
    VoltageSet { voltage: Voltage, increased: bool },
    ToneSet(Tone),
    BurstSent(Burst),
    FrameSent(FrameBytes),
    SwitchInvalidated,
    SwitchCommitted,
    RotorInvalidated,
    RotorCommitted,
    RotorMoving { budget_ticks: u32 },
    RotorArrived { ticks_used: u32, locked: bool },
    Tuned { frequency: Khz, blocking: bool },
    Finished(PrepareOutcome),
}

impl fmt::Display for SecEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SecEvent::Started(operation) => write!(f, "started {operation}"),
            SecEvent::VoltageSet { voltage, increased } => {
                write!(f, "voltage {voltage}")?;
                if *increased {
                    f.write_str(" (+1V)")?;
                }
                Ok(())
            }
            SecEvent::ToneSet(tone) => write!(f, "tone {tone}"),
            SecEvent::BurstSent(burst) => write!(f, "toneburst {burst:?}"),
            SecEvent::FrameSent(frame) => write!(f, "diseqc {frame}"),
            SecEvent::SwitchInvalidated => f.write_str("switch-invalidated"),
            SecEvent::SwitchCommitted => f.write_str("switch-committed"),
            SecEvent::RotorInvalidated => f.write_str("rotor-invalidated"),
            SecEvent::RotorCommitted => f.write_str("rotor-committed"),
            SecEvent::RotorMoving { budget_ticks } => {
                write!(f, "rotor-moving budget={budget_ticks}")
            }
            SecEvent::RotorArrived { ticks_used, locked } => {
                write!(f, "rotor-arrived ticks={ticks_used} locked={locked}")
            }
            SecEvent::Tuned {
                frequency,
                blocking,
            } => {
                let mode = if *blocking { "lock" } else { "set" };
                write!(f, "tune {mode} {frequency}kHz")
            }
            SecEvent::Finished(outcome) => write!(f, "finished {outcome}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Offset into the sequence that produced the event.
    pub offset: Duration,
    pub event: SecEvent,
}

/// Destination for engine telemetry.
pub trait TelemetrySink {
    fn record(&mut self, offset: Duration, event: SecEvent);
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for &mut T {
    fn record(&mut self, offset: Duration, event: SecEvent) {
        (**self).record(offset, event);
    }
}

/// Sink that drops every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NullTelemetry;

impl TelemetrySink for NullTelemetry {
    fn record(&mut self, _: Duration, _: SecEvent) {}
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub const fn next_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records an event and returns its identifier.
    pub fn push(&mut self, offset: Duration, event: SecEvent) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);
        self.ring.write(TelemetryRecord { id, offset, event });
        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TelemetrySink for TelemetryRecorder<CAPACITY> {
    fn record(&mut self, offset: Duration, event: SecEvent) {
        self.push(offset, event);
    }
}
