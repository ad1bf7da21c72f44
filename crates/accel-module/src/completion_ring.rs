//! Completion ring: worker writes, client reads.
//!
//! [`CompletionSide`] is the worker's read-write mapping, [`CompletionRing`]
//! the client's read-only one. The worker writes an output slot, then
//! publishes the wrapped `index` and its unwrapped completion counter with
//! `Release`, then wakes any client parked on the counter.
//!
//! The counter doubles as the worker's read cursor into the submission ring
//! of the same session: entry `n` of the submission ring produces entry `n`
//! of the completion ring, in the same slot index.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, Instant};

use accel_core::cancel::CancellationToken;
use accel_core::entry::OutputEntry;
use accel_core::error::{AccelError, LayoutError};
use accel_core::layout::{self, offsets, WireEntry, COMPLETION_RING_SIZE};
use accel_core::ring::wrap;
use accel_core::session::SessionId;

use crate::config::WaitMode;
use crate::futex::{self, Scope};
use crate::region::{Access, Mapping, SharedRegion};

/// Result of waiting for the completion counter to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The counter differs from the caller's cursor.
    Ready,
    TimedOut,
    Cancelled,
}

/// Client view of a completion ring.
pub struct CompletionRing {
    map: Mapping,
    sequence_offset: usize,
}

impl CompletionRing {
    fn new(map: Mapping, sequence_offset: usize) -> Result<Self, LayoutError> {
        map.validate(COMPLETION_RING_SIZE)?;
        Ok(Self {
            map,
            sequence_offset,
        })
    }

    #[inline]
    fn sequence(&self) -> &AtomicU32 {
        self.map.word(self.sequence_offset)
    }

    /// Unwrapped completion counter last published by the worker.
    #[inline]
    pub fn completed(&self) -> u32 {
        self.sequence().load(Ordering::Acquire)
    }

    /// Wrapped `index` from the ring header.
    #[inline]
    pub fn wire_index(&self) -> u32 {
        self.map.word(offsets::RING_INDEX).load(Ordering::Acquire)
    }

    /// Decode the output for unwrapped counter `counter`.
    pub fn read_slot(&self, counter: u32) -> Result<OutputEntry, LayoutError> {
        let mut buf = [0u8; OutputEntry::WIRE_SIZE];
        self.map
            .read_into(layout::slot_offset::<OutputEntry>(wrap(counter)), &mut buf);
        OutputEntry::decode_from(&buf)
    }

    /// Wait until the published counter differs from `cursor`.
    ///
    /// Spin mode busy-polls. Park mode sleeps on the counter for at most
    /// `park_slice` at a time. Both check `deadline` and `cancel` between
    /// polls; an already-published entry is returned even if the deadline
    /// has passed or the token fired.
    pub fn wait_past(
        &self,
        cursor: u32,
        mode: WaitMode,
        park_slice: Duration,
        deadline: Option<Instant>,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        loop {
            let seq = self.completed();
            if seq != cursor {
                return WaitOutcome::Ready;
            }
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }
            let mut slice = park_slice;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return WaitOutcome::TimedOut;
                }
                slice = slice.min(deadline - now);
            }
            match mode {
                WaitMode::Spin => std::hint::spin_loop(),
                WaitMode::Park => {
                    futex::wait(self.sequence(), seq, Some(slice), Scope::Shared);
                }
            }
        }
    }
}

impl std::fmt::Debug for CompletionRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionRing")
            .field("completed", &self.completed())
            .finish()
    }
}

/// Worker view of a session's completion ring.
pub struct CompletionSide {
    id: SessionId,
    region: SharedRegion,
}

impl CompletionSide {
    pub(crate) fn new(id: SessionId, region: SharedRegion) -> Self {
        Self { id, region }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Map the client's read-only view.
    pub(crate) fn map_client(&self) -> Result<CompletionRing, AccelError> {
        let map = self.region.map_client(Access::ReadOnly)?;
        Ok(CompletionRing::new(map, self.region.sequence_offset())?)
    }

    #[inline]
    fn sequence(&self) -> &AtomicU32 {
        self.region.worker().word(self.region.sequence_offset())
    }

    /// Completion counter published so far. Only the worker writes it.
    #[inline]
    pub fn completed(&self) -> u32 {
        self.sequence().load(Ordering::Relaxed)
    }

    /// Encode `output` into the slot for unwrapped counter `counter`.
    pub fn write_entry(&self, counter: u32, output: &OutputEntry) -> Result<(), LayoutError> {
        let mut buf = [0u8; OutputEntry::WIRE_SIZE];
        output.encode_into(&mut buf)?;
        self.region
            .worker()
            .write_from(layout::slot_offset::<OutputEntry>(wrap(counter)), &buf);
        Ok(())
    }

    /// Publish every slot below `completed` and wake parked clients.
    pub fn publish(&self, completed: u32) {
        self.region
            .worker()
            .word(offsets::RING_INDEX)
            .store(wrap(completed), Ordering::Release);
        self.sequence().store(completed, Ordering::Release);
        futex::wake_all(self.sequence(), Scope::Shared);
    }

    /// Start the counters of a fresh ring at `start` instead of zero.
    #[cfg(test)]
    pub(crate) fn preset(&self, start: u32) {
        self.sequence().store(start, Ordering::Release);
    }
}

impl std::fmt::Debug for CompletionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionSide")
            .field("id", &self.id)
            .field("completed", &self.completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn side() -> CompletionSide {
        let region = SharedRegion::create("completion", COMPLETION_RING_SIZE).unwrap();
        CompletionSide::new(SessionId::new(7), region)
    }

    #[test]
    fn test_publish_visible_to_client() {
        let s = side();
        let ring = s.map_client().unwrap();

        s.write_entry(0, &OutputEntry::new(3, [8])).unwrap();
        assert_eq!(ring.completed(), 0, "not published yet");
        s.publish(1);

        assert_eq!(ring.completed(), 1);
        assert_eq!(ring.wire_index(), 1);
        assert_eq!(ring.read_slot(0).unwrap(), OutputEntry::new(3, [8]));
    }

    #[test]
    fn test_wait_ready_when_already_published() {
        let s = side();
        let ring = s.map_client().unwrap();
        s.publish(1);
        let outcome = ring.wait_past(
            0,
            WaitMode::Spin,
            Duration::from_micros(100),
            None,
            &CancellationToken::never(),
        );
        assert_eq!(outcome, WaitOutcome::Ready);
    }

    #[test]
    fn test_wait_times_out() {
        let s = side();
        let ring = s.map_client().unwrap();
        for mode in [WaitMode::Spin, WaitMode::Park] {
            let deadline = Instant::now() + Duration::from_millis(20);
            let outcome = ring.wait_past(
                0,
                mode,
                Duration::from_millis(5),
                Some(deadline),
                &CancellationToken::never(),
            );
            assert_eq!(outcome, WaitOutcome::TimedOut);
            assert!(Instant::now() >= deadline);
        }
    }

    #[test]
    fn test_wait_cancelled() {
        let s = side();
        let ring = s.map_client().unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let outcome = ring.wait_past(0, WaitMode::Park, Duration::from_millis(1), None, &token);
        assert_eq!(outcome, WaitOutcome::Cancelled);
    }

    #[test]
    fn test_parked_client_woken_by_publish() {
        let s = Arc::new(side());
        let ring = s.map_client().unwrap();

        let worker = {
            let s = Arc::clone(&s);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                s.write_entry(0, &OutputEntry::new(1, [6])).unwrap();
                s.publish(1);
            })
        };

        let outcome = ring.wait_past(
            0,
            WaitMode::Park,
            Duration::from_secs(1),
            Some(Instant::now() + Duration::from_secs(5)),
            &CancellationToken::never(),
        );
        worker.join().unwrap();
        assert_eq!(outcome, WaitOutcome::Ready);
        assert_eq!(ring.read_slot(0).unwrap().outputs[0], 6);
    }

    #[test]
    fn test_counter_wraps_past_u32_max() {
        let s = side();
        let ring = s.map_client().unwrap();
        s.preset(u32::MAX);
        s.write_entry(u32::MAX, &OutputEntry::new(2, [7])).unwrap();
        s.publish(u32::MAX.wrapping_add(1));

        assert_eq!(ring.completed(), 0);
        assert_eq!(ring.wire_index(), 0);
        assert_eq!(ring.read_slot(u32::MAX).unwrap().command, 2);
    }
}
