//! Submission ring: client writes, worker reads.
//!
//! Two views of one [`SharedRegion`]:
//!
//! - [`SubmitRing`] is the client's write-only mapping. The client copies
//!   entries into slots and then publishes its unwrapped submit counter.
//! - [`SubmissionSide`] is the worker's read-write mapping, registered in the
//!   session registry. The worker reads entries up to the published counter.
//!
//! # Publication order
//!
//! Slots are written with plain volatile stores. The header `index` (wrapped)
//! and the sequence word (unwrapped) are then stored with `Release`. The
//! worker loads the sequence word with `Acquire` before reading any slot, so
//! every slot below the published counter is fully visible.

use std::sync::atomic::{AtomicBool, Ordering};

use accel_core::entry::ControlEntry;
use accel_core::error::{AccelError, LayoutError};
use accel_core::layout::{self, offsets, WireEntry, SUBMISSION_RING_SIZE};
use accel_core::ring::wrap;
use accel_core::session::SessionId;

use crate::region::{Access, Mapping, SharedRegion};

/// Client view of a submission ring.
pub struct SubmitRing {
    map: Mapping,
    sequence_offset: usize,
}

impl SubmitRing {
    fn new(map: Mapping, sequence_offset: usize) -> Result<Self, LayoutError> {
        map.validate(SUBMISSION_RING_SIZE)?;
        Ok(Self {
            map,
            sequence_offset,
        })
    }

    /// Copy `entry` into the slot for unwrapped counter `counter`.
    pub fn write_slot(&self, counter: u32, entry: &ControlEntry) -> Result<(), LayoutError> {
        let mut buf = [0u8; ControlEntry::WIRE_SIZE];
        entry.encode_into(&mut buf)?;
        self.map
            .write_from(layout::slot_offset::<ControlEntry>(wrap(counter)), &buf);
        Ok(())
    }

    /// Publish everything written below `submit_counter`.
    pub fn publish(&self, submit_counter: u32) {
        self.map
            .word(offsets::RING_INDEX)
            .store(wrap(submit_counter), Ordering::Release);
        self.map
            .word(self.sequence_offset)
            .store(submit_counter, Ordering::Release);
    }
}

impl std::fmt::Debug for SubmitRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmitRing").field("map", &self.map).finish()
    }
}

/// Worker view of a session's submission ring.
pub struct SubmissionSide {
    id: SessionId,
    region: SharedRegion,
    closed: AtomicBool,
}

impl SubmissionSide {
    pub(crate) fn new(id: SessionId, region: SharedRegion) -> Self {
        Self {
            id,
            region,
            closed: AtomicBool::new(false),
        }
    }

    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Map the client's write-only view.
    pub(crate) fn map_client(&self) -> Result<SubmitRing, AccelError> {
        let map = self.region.map_client(Access::WriteOnly)?;
        Ok(SubmitRing::new(map, self.region.sequence_offset())?)
    }

    /// Unwrapped submit counter last published by the client.
    #[inline]
    pub fn submitted(&self) -> u32 {
        self.region
            .worker()
            .word(self.region.sequence_offset())
            .load(Ordering::Acquire)
    }

    /// Wrapped `index` from the ring header.
    #[inline]
    pub fn wire_index(&self) -> u32 {
        self.region
            .worker()
            .word(offsets::RING_INDEX)
            .load(Ordering::Acquire)
    }

    /// Decode the entry for unwrapped counter `cursor`.
    pub fn read_entry(&self, cursor: u32) -> Result<ControlEntry, LayoutError> {
        let mut buf = [0u8; ControlEntry::WIRE_SIZE];
        self.region
            .worker()
            .read_into(layout::slot_offset::<ControlEntry>(wrap(cursor)), &mut buf);
        ControlEntry::decode_from(&buf)
    }

    /// Set by detach. Closed sessions are skipped by later stages of a pass.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for SubmissionSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubmissionSide")
            .field("id", &self.id)
            .field("submitted", &self.submitted())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use accel_core::entry::CAPACITY;

    fn side() -> SubmissionSide {
        let region = SharedRegion::create("submission", SUBMISSION_RING_SIZE).unwrap();
        SubmissionSide::new(SessionId::new(1), region)
    }

    #[test]
    fn test_fresh_ring_is_empty() {
        let s = side();
        assert_eq!(s.submitted(), 0);
        assert_eq!(s.wire_index(), 0);
        assert_eq!(s.read_entry(0).unwrap(), ControlEntry::default());
    }

    #[test]
    fn test_client_writes_visible_to_worker() {
        let s = side();
        let ring = s.map_client().unwrap();

        for i in 0..3u32 {
            ring.write_slot(i, &ControlEntry::new(i + 10, [i as u64; 4]))
                .unwrap();
        }
        ring.publish(3);

        assert_eq!(s.submitted(), 3);
        assert_eq!(s.wire_index(), 3);
        for i in 0..3u32 {
            let e = s.read_entry(i).unwrap();
            assert_eq!(e.command, i + 10);
            assert_eq!(e.params, [i as u64; 4]);
        }
    }

    #[test]
    fn test_full_ring_index_wraps_but_sequence_does_not() {
        let s = side();
        let ring = s.map_client().unwrap();
        for i in 0..CAPACITY {
            ring.write_slot(i, &ControlEntry::with_command(i)).unwrap();
        }
        ring.publish(CAPACITY);

        assert_eq!(s.wire_index(), 0);
        assert_eq!(s.submitted(), CAPACITY);
    }

    #[test]
    fn test_slot_reuse_after_wrap() {
        let s = side();
        let ring = s.map_client().unwrap();
        ring.write_slot(CAPACITY + 2, &ControlEntry::with_command(99))
            .unwrap();
        assert_eq!(s.read_entry(2).unwrap().command, 99);
        assert_eq!(s.read_entry(CAPACITY + 2).unwrap().command, 99);
    }

    #[test]
    fn test_close_flag() {
        let s = side();
        assert!(!s.is_closed());
        s.close();
        assert!(s.is_closed());
    }
}
