//! The worker loop.
//!
//! One thread serves every session serially. Each wake runs one full pass:
//! snapshot the submission table, then drain every session completely.
//! Entry `n` of a session's submission ring produces entry `n` of its
//! completion ring; the worker's cursor is the completion counter it last
//! published, so no extra state has to survive between passes.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use tracing::{debug, info, trace, warn};

use accel_core::entry::CAPACITY;
use accel_core::error::AccelError;
use accel_core::handler::CommandHandler;
use accel_core::ring;
use accel_module::completion_ring::CompletionSide;
use accel_module::doorbell::{Wake, WorkSignal};
use accel_module::registry::SessionRegistry;
use accel_module::submit_ring::SubmissionSide;

/// Worker lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WorkerState {
    /// Sleeping on the doorbell.
    Idle = 0,
    /// Taking the per-pass session snapshot.
    Scanning = 1,
    /// Running the handler over pending entries.
    Draining = 2,
    /// Terminal.
    Stopped = 3,
}

impl WorkerState {
    #[inline]
    fn from_u8(v: u8) -> Self {
        match v {
            0 => WorkerState::Idle,
            1 => WorkerState::Scanning,
            2 => WorkerState::Draining,
            _ => WorkerState::Stopped,
        }
    }
}

/// Counters since the worker started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    /// Scan-and-drain passes run.
    pub passes: u64,
    /// Entries taken from submission rings and completed.
    pub entries: u64,
    /// Submission rings skipped for lack of a completion ring.
    pub orphans: u64,
}

/// State the worker publishes for its owner to observe.
#[derive(Debug)]
pub struct WorkerShared {
    state: AtomicU8,
    passes: AtomicU64,
    entries: AtomicU64,
    orphans: AtomicU64,
}

impl Default for WorkerShared {
    fn default() -> Self {
        Self {
            state: AtomicU8::new(WorkerState::Idle as u8),
            passes: AtomicU64::new(0),
            entries: AtomicU64::new(0),
            orphans: AtomicU64::new(0),
        }
    }
}

impl WorkerShared {
    #[inline]
    pub fn state(&self) -> WorkerState {
        WorkerState::from_u8(self.state.load(Ordering::Acquire))
    }

    #[inline]
    fn set_state(&self, state: WorkerState) {
        self.state.store(state as u8, Ordering::Release);
    }

    pub fn stats(&self) -> WorkerStats {
        WorkerStats {
            passes: self.passes.load(Ordering::Relaxed),
            entries: self.entries.load(Ordering::Relaxed),
            orphans: self.orphans.load(Ordering::Relaxed),
        }
    }
}

/// The worker loop, generic over its doorbell and handler.
pub struct WorkerLoop<S, H> {
    registry: Arc<SessionRegistry>,
    signal: Arc<S>,
    handler: H,
    shared: Arc<WorkerShared>,
    drain_on_shutdown: bool,
}

impl<S, H> WorkerLoop<S, H>
where
    S: WorkSignal,
    H: CommandHandler,
{
    pub fn new(
        registry: Arc<SessionRegistry>,
        signal: Arc<S>,
        handler: H,
        shared: Arc<WorkerShared>,
        drain_on_shutdown: bool,
    ) -> Self {
        Self {
            registry,
            signal,
            handler,
            shared,
            drain_on_shutdown,
        }
    }

    /// Run until a stop is requested. Leaves the state at `Stopped`.
    pub fn run(&self) {
        info!(drain_on_shutdown = self.drain_on_shutdown, "worker started");

        loop {
            match self.signal.wait_for_work() {
                Wake::Work => {
                    self.run_pass();
                    self.signal.finish_pass();
                }
                Wake::Stop => break,
            }
        }

        if self.drain_on_shutdown {
            let drained = self.run_pass();
            debug!(drained, "final pass before stop");
        }

        self.shared.set_state(WorkerState::Stopped);
        let stats = self.shared.stats();
        info!(
            passes = stats.passes,
            entries = stats.entries,
            orphans = stats.orphans,
            "worker exiting"
        );
    }

    /// One scan-and-drain pass over every attached session.
    /// Returns the number of entries completed.
    pub fn run_pass(&self) -> u64 {
        self.shared.set_state(WorkerState::Scanning);
        self.shared.passes.fetch_add(1, Ordering::Relaxed);
        let snapshot = self.registry.submissions();
        let drained = self.drain_snapshot(&snapshot);
        self.shared.set_state(WorkerState::Idle);
        drained
    }

    fn drain_snapshot(&self, snapshot: &[Arc<SubmissionSide>]) -> u64 {
        self.shared.set_state(WorkerState::Draining);
        let mut drained = 0u64;
        for submission in snapshot {
            let Some(completion) = self.registry.completion_for(submission.id()) else {
                let err = AccelError::OrphanedSubmission(submission.id());
                warn!(session = %submission.id(), "{err}, skipping");
                self.shared.orphans.fetch_add(1, Ordering::Relaxed);
                continue;
            };
            drained += self.drain_session(submission, &completion);
        }
        drained
    }

    fn drain_session(&self, submission: &SubmissionSide, completion: &CompletionSide) -> u64 {
        let id = submission.id();
        let mut cursor = completion.completed();
        let mut drained = 0u64;

        while !submission.is_closed() {
            let submitted = submission.submitted();
            if cursor == submitted {
                break;
            }
            if ring::outstanding(cursor, submitted) > CAPACITY {
                warn!(
                    session = %id,
                    cursor,
                    submitted,
                    "submit counter ran past ring capacity, skipping session"
                );
                break;
            }

            let control = match submission.read_entry(cursor) {
                Ok(control) => control,
                Err(e) => {
                    warn!(session = %id, cursor, "unreadable submission: {e}");
                    break;
                }
            };
            trace!(session = %id, cursor, command = control.command, "work received");

            let output = self.handler.execute(&control);
            if let Err(e) = completion.write_entry(cursor, &output) {
                warn!(session = %id, cursor, "unwritable completion: {e}");
                break;
            }
            cursor = cursor.wrapping_add(1);
            completion.publish(cursor);
            trace!(session = %id, cursor, outputs = ?output.outputs, "work completed");

            drained += 1;
        }

        if drained > 0 {
            self.shared.entries.fetch_add(drained, Ordering::Relaxed);
            debug!(session = %id, drained, "session drained");
        }
        drained
    }
}
