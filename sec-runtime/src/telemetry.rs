//! Telemetry sink that mirrors engine events to `tracing`.
//!
//! Every event lands in a shared [`TelemetryRecorder`] ring so front ends can
//! replay the last sequence, and is logged with a level matching its weight:
//! bus traffic at debug, sequence boundaries at info, cancellations and rotor
//! timeouts at warn.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use sec_core::engine::PrepareOutcome;
use sec_core::telemetry::{SecEvent, TelemetryRecord, TelemetryRecorder, TelemetrySink};

/// Shared handle onto the telemetry ring.
#[derive(Clone, Default)]
pub struct TelemetryHandle {
    recorder: Arc<Mutex<TelemetryRecorder>>,
}

impl TelemetryHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the retained records, oldest first.
    #[must_use]
    pub fn records(&self) -> Vec<TelemetryRecord> {
        let recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        recorder.oldest_first().copied().collect()
    }

    /// Records retained after `id`, oldest first.
    #[must_use]
    pub fn records_since(&self, id: u32) -> Vec<TelemetryRecord> {
        let recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        recorder
            .oldest_first()
            .filter(|record| record.id >= id)
            .copied()
            .collect()
    }

    /// Identifier the next record will receive.
    #[must_use]
    pub fn next_id(&self) -> u32 {
        let recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        recorder.next_id()
    }

    fn push(&self, offset: Duration, event: SecEvent) {
        let mut recorder = self.recorder.lock().unwrap_or_else(PoisonError::into_inner);
        recorder.push(offset, event);
    }
}

/// [`TelemetrySink`] for one front end.
#[derive(Clone)]
pub struct TracingTelemetry {
    device: u32,
    handle: TelemetryHandle,
}

impl TracingTelemetry {
    #[must_use]
    pub fn new(device: u32, handle: TelemetryHandle) -> Self {
        Self { device, handle }
    }

    #[must_use]
    pub fn handle(&self) -> &TelemetryHandle {
        &self.handle
    }
}

impl TelemetrySink for TracingTelemetry {
    fn record(&mut self, offset: Duration, event: SecEvent) {
        let device = self.device;
        let offset_ms = offset.as_millis();
        match event {
            SecEvent::Started(_) | SecEvent::Finished(PrepareOutcome::Locked | PrepareOutcome::Completed) => {
                tracing::info!(device, offset_ms, "sec: {event}");
            }
            SecEvent::Finished(_) | SecEvent::RotorArrived { locked: false, .. } => {
                tracing::warn!(device, offset_ms, "sec: {event}");
            }
            SecEvent::FrameSent(_)
            | SecEvent::VoltageSet { .. }
            | SecEvent::ToneSet(_)
            | SecEvent::BurstSent(_)
            | SecEvent::Tuned { .. } => {
                tracing::debug!(device, offset_ms, "sec: {event}");
            }
            _ => tracing::trace!(device, offset_ms, "sec: {event}"),
        }
        self.handle.push(offset, event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sec_core::frontend::Tone;

    #[test]
    fn events_are_shared_through_the_handle() {
        let handle = TelemetryHandle::new();
        let mut sink = TracingTelemetry::new(0, handle.clone());

        sink.record(Duration::ZERO, SecEvent::ToneSet(Tone::Off));
        let mark = handle.next_id();
        sink.record(Duration::from_millis(25), SecEvent::SwitchCommitted);

        assert_eq!(handle.records().len(), 2);
        let recent = handle.records_since(mark);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event, SecEvent::SwitchCommitted);
        assert_eq!(recent[0].offset, Duration::from_millis(25));
    }
}
