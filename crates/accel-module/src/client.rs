//! Client handle: submission and completion channels of one session.
//!
//! An [`Accelerator`] owns the client-side mappings of a session's two rings
//! and the two unwrapped counters that make the wrapped ring indices
//! unambiguous:
//!
//! - `submit_counter`: entries written into the submission ring.
//! - `completion_counter`: outputs read back from the completion ring.
//!
//! `submit_counter - completion_counter` (wrapping) is the number of entries
//! in flight and never exceeds `CAPACITY`. A session has a single producer:
//! the handle is `Send` but every operation takes `&mut self`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, trace};

use accel_core::cancel::CancellationToken;
use accel_core::entry::{ControlEntry, OutputEntry, CAPACITY};
use accel_core::error::{AccelError, Result};
use accel_core::notifier::Notifier;
use accel_core::ring;
use accel_core::session::SessionId;

use crate::completion_ring::{CompletionRing, WaitOutcome};
use crate::config::ClientConfig;
use crate::registry::SessionRegistry;
use crate::submit_ring::SubmitRing;

/// Bounds for [`Accelerator::wait_for_completion_with`].
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Give up once this token fires.
    pub cancel: CancellationToken,
}

impl WaitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, d: Duration) -> Self {
        self.timeout = Some(d);
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }
}

/// A client session attached to a device.
pub struct Accelerator {
    id: SessionId,
    submit: SubmitRing,
    complete: CompletionRing,
    submit_counter: u32,
    completion_counter: u32,
    registry: Arc<SessionRegistry>,
    notifier: Arc<dyn Notifier>,
    config: ClientConfig,
    attached: bool,
}

impl Accelerator {
    /// Attach `id` to `registry` and map the client views of its rings.
    ///
    /// On failure nothing stays registered.
    pub fn attach(
        id: SessionId,
        registry: Arc<SessionRegistry>,
        notifier: Arc<dyn Notifier>,
        config: ClientConfig,
    ) -> Result<Self> {
        config.validate().map_err(AccelError::InvalidConfig)?;

        let session = registry.attach(id)?;
        let views = session
            .submission
            .map_client()
            .and_then(|s| Ok((s, session.completion.map_client()?)));
        let (submit, complete) = match views {
            Ok(views) => views,
            Err(e) => {
                registry.detach(id);
                return Err(e);
            }
        };

        info!(session = %id, wait_mode = ?config.wait_mode, "accelerator attached");
        Ok(Self {
            id,
            submit,
            complete,
            submit_counter: 0,
            completion_counter: 0,
            registry,
            notifier,
            config,
            attached: true,
        })
    }

    /// Enqueue `entries` in order and ring the doorbell once.
    ///
    /// Fails with [`AccelError::CapacityExceeded`] if the batch does not fit
    /// in the free slots; nothing is written in that case. An empty batch
    /// does nothing.
    pub fn submit(&mut self, entries: &[ControlEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }

        let available = self.remaining_slots();
        if entries.len() > available as usize {
            return Err(AccelError::CapacityExceeded {
                requested: entries.len(),
                available,
            });
        }

        let mut counter = self.submit_counter;
        for entry in entries {
            self.submit.write_slot(counter, entry)?;
            counter = counter.wrapping_add(1);
        }
        self.submit.publish(counter);
        self.submit_counter = counter;

        trace!(session = %self.id, count = entries.len(), submitted = counter, "submitted");
        self.notifier.notify()
    }

    /// Enqueue a single entry.
    #[inline]
    pub fn submit_one(&mut self, entry: &ControlEntry) -> Result<()> {
        self.submit(std::slice::from_ref(entry))
    }

    /// Fill `outs` with up to `outs.len()` outputs, oldest first.
    ///
    /// Waits for each entry with the configured wait mode and no deadline.
    /// Returns how many outputs were written, which is less than
    /// `outs.len()` only when fewer entries are outstanding.
    pub fn wait_for_completion_into(&mut self, outs: &mut [OutputEntry]) -> Result<usize> {
        self.wait_for_completion_with(outs, &WaitOptions::default())
    }

    /// Wait for every outstanding entry and return their outputs in order.
    pub fn wait_for_completion(&mut self) -> Result<Vec<OutputEntry>> {
        let mut outs = vec![OutputEntry::default(); self.outstanding() as usize];
        let n = self.wait_for_completion_into(&mut outs)?;
        outs.truncate(n);
        Ok(outs)
    }

    /// Like [`wait_for_completion_into`](Self::wait_for_completion_into),
    /// bounded by `opts`.
    ///
    /// On [`AccelError::Timeout`] or [`AccelError::Cancelled`] the first
    /// `retrieved` outputs of `outs` are valid and already consumed.
    pub fn wait_for_completion_with(
        &mut self,
        outs: &mut [OutputEntry],
        opts: &WaitOptions,
    ) -> Result<usize> {
        let want = outs.len().min(self.outstanding() as usize);
        let deadline = opts.timeout.map(|t| Instant::now() + t);

        for (retrieved, out) in outs.iter_mut().take(want).enumerate() {
            let outcome = self.complete.wait_past(
                self.completion_counter,
                self.config.wait_mode,
                self.config.park_slice,
                deadline,
                &opts.cancel,
            );
            match outcome {
                WaitOutcome::Ready => {}
                WaitOutcome::TimedOut => return Err(AccelError::Timeout { retrieved }),
                WaitOutcome::Cancelled => return Err(AccelError::Cancelled { retrieved }),
            }
            *out = self.complete.read_slot(self.completion_counter)?;
            self.completion_counter = self.completion_counter.wrapping_add(1);
        }

        trace!(session = %self.id, count = want, completed = self.completion_counter, "retrieved");
        Ok(want)
    }

    #[inline]
    pub fn session_id(&self) -> SessionId {
        self.id
    }

    /// Entries submitted so far (wrapping).
    #[inline]
    pub fn submit_counter(&self) -> u32 {
        self.submit_counter
    }

    /// Outputs retrieved so far (wrapping).
    #[inline]
    pub fn completion_counter(&self) -> u32 {
        self.completion_counter
    }

    /// Entries submitted but not yet retrieved.
    #[inline]
    pub fn outstanding(&self) -> u32 {
        ring::outstanding(self.completion_counter, self.submit_counter)
    }

    /// How many entries the next `submit` may carry.
    #[inline]
    pub fn remaining_slots(&self) -> u32 {
        CAPACITY - self.outstanding()
    }

    /// Outputs published by the worker but not yet retrieved.
    #[inline]
    pub fn ready(&self) -> u32 {
        ring::outstanding(self.completion_counter, self.complete.completed())
    }

    #[inline]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Detach the session and release both rings.
    pub fn detach(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.attached {
            return;
        }
        self.attached = false;
        if self.outstanding() != 0 {
            debug!(
                session = %self.id,
                outstanding = self.outstanding(),
                "detaching with entries in flight"
            );
        }
        self.registry.detach(self.id);
        info!(session = %self.id, "accelerator detached");
    }
}

impl Drop for Accelerator {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for Accelerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Accelerator")
            .field("id", &self.id)
            .field("submit_counter", &self.submit_counter)
            .field("completion_counter", &self.completion_counter)
            .finish()
    }
}
