//! Single-slot background worker around the SEC engine.
//!
//! One [`Coordinator`] owns one front end and its [`DeviceState`] cache. Only
//! the worker thread ever touches either; callers hand requests over through
//! a one-entry slot guarded by a mutex. Real requests block their caller until
//! the job finished, probes are fire-and-forget and get cancelled by whatever
//! request comes next.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle, ThreadId};

use sec_core::cancel::CancelFlag;
use sec_core::config::SecConfig;
use sec_core::engine::{PrepareReport, SecRequest, Sequencer};
use sec_core::frontend::{Delay, Frontend};
use sec_core::repl::status::{EnginePhase, StatusProvider, StatusSnapshot};
use sec_core::state::DeviceState;

use crate::delay::ThreadDelay;
use crate::error::CoordinatorError;
use crate::status::StatusBoard;
use crate::telemetry::{TelemetryHandle, TracingTelemetry};

type JobResult = Result<PrepareReport, CoordinatorError>;

/// Per-device runtime settings.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoordinatorConfig {
    /// Front end index used in log records and the worker thread name.
    pub device: u32,
    /// Divisor applied to every engine delay; 1 runs in real time.
    pub time_scale: u32,
}

impl CoordinatorConfig {
    #[must_use]
    pub const fn new(device: u32) -> Self {
        Self {
            device,
            time_scale: 1,
        }
    }

    #[must_use]
    pub const fn with_time_scale(mut self, time_scale: u32) -> Self {
        self.time_scale = time_scale;
        self
    }
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self::new(0)
    }
}

struct Job {
    id: u64,
    config: SecConfig,
    request: SecRequest,
    /// A caller blocks on the result.
    awaited: bool,
}

#[derive(Clone, Copy)]
struct RunningJob {
    id: u64,
    probe: bool,
}

struct Shared {
    slot: Option<Job>,
    running: Option<RunningJob>,
    next_id: u64,
    results: HashMap<u64, JobResult>,
    arm_rotor_reset: bool,
    /// `reset_cache` as carried by the previous enqueue; only a rising edge arms.
    reset_cache_seen: bool,
    /// Cache copy taken after the last job.
    state: DeviceState,
    shutdown: bool,
}

impl Shared {
    fn slot_holds_real(&self) -> bool {
        self.slot.as_ref().is_some_and(|job| !job.request.is_probe())
    }

    fn is_idle(&self) -> bool {
        self.running.is_none() && self.slot.is_none()
    }
}

struct Inner {
    shared: Mutex<Shared>,
    work_ready: Condvar,
    idle: Condvar,
    cancel: CancelFlag,
    status: StatusBoard,
    worker: OnceLock<ThreadId>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_idle<'a>(&self, guard: MutexGuard<'a, Shared>) -> MutexGuard<'a, Shared> {
        self.idle.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    fn on_worker(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }
}

/// Background SEC worker for one front end.
pub struct Coordinator {
    device: u32,
    inner: Arc<Inner>,
    telemetry: TelemetryHandle,
    worker: Option<JoinHandle<()>>,
}

impl Coordinator {
    /// Starts the worker with a wall-clock delay scaled by `config.time_scale`.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Spawn`] if the worker thread cannot be created.
    pub fn spawn<F>(config: CoordinatorConfig, frontend: F) -> Result<Self, CoordinatorError>
    where
        F: Frontend + Send + 'static,
    {
        Self::spawn_with_delay(config, frontend, ThreadDelay::scaled(config.time_scale))
    }

    /// Starts the worker with a caller-provided delay source.
    ///
    /// # Errors
    ///
    /// [`CoordinatorError::Spawn`] if the worker thread cannot be created.
    pub fn spawn_with_delay<F, D>(
        config: CoordinatorConfig,
        frontend: F,
        delay: D,
    ) -> Result<Self, CoordinatorError>
    where
        F: Frontend + Send + 'static,
        D: Delay + Send + 'static,
    {
        let inner = Arc::new(Inner {
            shared: Mutex::new(Shared {
                slot: None,
                running: None,
                next_id: 0,
                results: HashMap::new(),
                arm_rotor_reset: false,
                reset_cache_seen: false,
                state: DeviceState::new(),
                shutdown: false,
            }),
            work_ready: Condvar::new(),
            idle: Condvar::new(),
            cancel: CancelFlag::new(),
            status: StatusBoard::new(),
            worker: OnceLock::new(),
        });
        let telemetry = TelemetryHandle::new();
        let worker = Worker {
            inner: Arc::clone(&inner),
            frontend,
            delay,
            telemetry: TracingTelemetry::new(config.device, telemetry.clone()),
            state: DeviceState::new(),
            device: config.device,
        };
        let handle = thread::Builder::new()
            .name(format!("sec-worker-{}", config.device))
            .spawn(move || worker.run())
            .map_err(CoordinatorError::Spawn)?;

        tracing::info!(device = config.device, "sec: worker started");
        Ok(Self {
            device: config.device,
            inner,
            telemetry,
            worker: Some(handle),
        })
    }

    #[must_use]
    pub const fn device(&self) -> u32 {
        self.device
    }

    /// Hands `request` to the worker.
    ///
    /// A running probe is cancelled first. Real requests return the report of
    /// their own job; probes, and any call made from the worker thread, return
    /// `Ok(None)` as soon as the request sits in the slot.
    ///
    /// # Errors
    ///
    /// Engine failures of the caller's own job, [`CoordinatorError::ShutDown`]
    /// if the worker stopped before running it, and
    /// [`CoordinatorError::WorkerPanicked`] if the engine panicked.
    pub fn enqueue(
        &self,
        config: &SecConfig,
        request: SecRequest,
    ) -> Result<Option<PrepareReport>, CoordinatorError> {
        let inner = &*self.inner;
        let on_worker = inner.on_worker();
        let probe = request.is_probe();
        let mut shared = inner.lock();

        if config.rotor.reset_cache && !shared.reset_cache_seen {
            shared.arm_rotor_reset = true;
        }
        shared.reset_cache_seen = config.rotor.reset_cache;

        loop {
            if shared.shutdown {
                return Err(CoordinatorError::ShutDown);
            }
            if let Some(running) = shared.running
                && running.probe
            {
                tracing::debug!(device = self.device, job = running.id, "sec: cancelling probe");
                inner.cancel.request();
                if on_worker {
                    break;
                }
                shared = inner.wait_idle(shared);
                continue;
            }
            if shared.slot_holds_real() && !on_worker {
                shared = inner.wait_idle(shared);
                continue;
            }
            break;
        }

        let id = shared.next_id;
        shared.next_id += 1;
        let awaited = !probe && !on_worker;
        if let Some(replaced) = shared.slot.replace(Job {
            id,
            config: *config,
            request,
            awaited,
        }) {
            tracing::debug!(device = self.device, job = replaced.id, "sec: queued request replaced");
        }
        if shared.running.is_none() {
            inner.status.set_phase(EnginePhase::Queued);
        }
        tracing::debug!(device = self.device, job = id, probe, "sec: request queued");
        inner.work_ready.notify_one();

        if !awaited {
            return Ok(None);
        }

        loop {
            if let Some(result) = shared.results.remove(&id) {
                return result.map(Some);
            }
            let running_here = shared.running.is_some_and(|running| running.id == id);
            if shared.shutdown && !running_here {
                return Err(CoordinatorError::ShutDown);
            }
            shared = inner.wait_idle(shared);
        }
    }

    /// Blocks until nothing is queued or running.
    pub fn wait_idle(&self) {
        let mut shared = self.inner.lock();
        while !shared.is_idle() && !shared.shutdown {
            shared = self.inner.wait_idle(shared);
        }
    }

    /// Copy of the cache as the last finished job left it.
    #[must_use]
    pub fn state(&self) -> DeviceState {
        self.inner.lock().state.clone()
    }

    #[must_use]
    pub fn status(&self) -> StatusSnapshot {
        self.inner.status.snapshot()
    }

    #[must_use]
    pub fn telemetry(&self) -> &TelemetryHandle {
        &self.telemetry
    }

    /// Stops the worker after the job it is running; queued work is dropped.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        {
            let mut shared = self.inner.lock();
            shared.shutdown = true;
        }
        self.inner.work_ready.notify_all();
        self.inner.idle.notify_all();
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                tracing::warn!(device = self.device, "sec: worker exited with a panic");
            } else {
                tracing::info!(device = self.device, "sec: worker stopped");
            }
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        self.stop();
    }
}

impl StatusProvider for Coordinator {
    fn snapshot(&self) -> Option<StatusSnapshot> {
        Some(self.status())
    }
}

struct Worker<F, D> {
    inner: Arc<Inner>,
    frontend: F,
    delay: D,
    telemetry: TracingTelemetry,
    state: DeviceState,
    device: u32,
}

impl<F: Frontend, D: Delay> Worker<F, D> {
    fn run(mut self) {
        let _ = self.inner.worker.set(thread::current().id());
        while let Some(job) = self.next_job() {
            let result = self.execute(&job);
            self.finish(&job, result);
        }
    }

    fn next_job(&mut self) -> Option<Job> {
        let inner = Arc::clone(&self.inner);
        let mut shared = inner.lock();
        let job = loop {
            if shared.shutdown {
                if let Some(dropped) = shared.slot.take() {
                    tracing::debug!(device = self.device, job = dropped.id, "sec: queued request dropped");
                }
                return None;
            }
            if let Some(job) = shared.slot.take() {
                break job;
            }
            shared = inner
                .work_ready
                .wait(shared)
                .unwrap_or_else(PoisonError::into_inner);
        };

        shared.running = Some(RunningJob {
            id: job.id,
            probe: job.request.is_probe(),
        });
        inner.cancel.clear();
        if core::mem::take(&mut shared.arm_rotor_reset) {
            self.state.arm_rotor_reset();
        }
        inner.status.set_phase(EnginePhase::Running);
        Some(job)
    }

    fn execute(&mut self, job: &Job) -> JobResult {
        tracing::info!(
            device = self.device,
            job = job.id,
            operation = %job.request.operation,
            probe = job.request.is_probe(),
            "sec: job started"
        );
        self.frontend.set_status_callback(false);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            let mut sequencer = Sequencer::new(
                &mut self.state,
                &mut self.frontend,
                &mut self.delay,
                &mut self.telemetry,
                &self.inner.cancel,
            );
            sequencer.prepare(&job.config, &job.request)
        }));
        self.frontend.set_status_callback(true);

        match outcome {
            Ok(Ok(report)) => {
                tracing::info!(
                    device = self.device,
                    job = job.id,
                    outcome = %report.outcome,
                    frames = report.frames_sent,
                    elapsed_ms = report.elapsed.as_millis(),
                    "sec: job finished"
                );
                Ok(report)
            }
            Ok(Err(error)) => {
                tracing::warn!(device = self.device, job = job.id, %error, "sec: job failed");
                Err(error.into())
            }
            Err(_) => {
                tracing::warn!(device = self.device, job = job.id, "sec: engine panicked, cache reset");
                self.state = DeviceState::new();
                Err(CoordinatorError::WorkerPanicked)
            }
        }
    }

    fn finish(&mut self, job: &Job, result: JobResult) {
        let inner = &*self.inner;
        inner.status.publish(&self.state);
        inner
            .status
            .record_outcome(result.as_ref().ok().map(|report| report.outcome));

        let mut shared = inner.lock();
        shared.running = None;
        shared.state = self.state.clone();
        if job.awaited {
            shared.results.insert(job.id, result);
        }
        inner.status.set_phase(if shared.slot.is_some() {
            EnginePhase::Queued
        } else {
            EnginePhase::Idle
        });
        drop(shared);
        inner.idle.notify_all();
    }
}
