//! Wire layout of the shared-memory rings.
//!
//! Both rings are mapped into two address spaces, so their layout is a
//! contract and must be bit-reproducible. Entries are moved across the
//! region boundary through the [`WireEntry`] codec below. The `repr(C)`
//! mirrors at the bottom of this file pin the same offsets at compile time.
//!
//! # Region layout
//!
//! ```text
//! offset 0                 ring header { reserved: u32, index: u32 }
//! offset 8                 slots[CAPACITY]
//! offset round_up(ring)    sequence word (u32, unwrapped counter)
//! end    round_up(ring) + PAGE
//! ```
//!
//! `index` is the wrapped next-write cursor, `[0, CAPACITY)`. The sequence
//! word in the trailing page is the unwrapped counter of the side that owns
//! the region (submit count for the submission region, completion count for
//! the completion region). All integers are little-endian.

use crate::entry::{ControlEntry, OutputEntry, CAPACITY, OUTPUT_MAX, PARAM_MAX};
use crate::error::LayoutError;

use static_assertions::const_assert_eq;

/// Region selector for the submission ring (client view is write-only).
pub const REGION_SUBMISSION: u64 = 0;
/// Region selector for the completion ring (client view is read-only).
pub const REGION_COMPLETION: u64 = 1;

/// Field offsets. Entry offsets are relative to the slot start,
/// ring offsets to the region start.
pub mod offsets {
    pub const CONTROL_COMMAND: usize = 0x00;
    pub const CONTROL_PARAMS: usize = 0x08;

    pub const OUTPUT_COMMAND: usize = 0x00;
    pub const OUTPUT_OUTPUTS: usize = 0x08;

    pub const RING_RESERVED: usize = 0x00;
    pub const RING_INDEX: usize = 0x04;
    pub const RING_SLOTS: usize = 0x08;
}

/// A fixed-size record with an explicit byte encoding.
pub trait WireEntry: Copy + Default + Send + Sync + 'static {
    /// Encoded size in bytes, padding included.
    const WIRE_SIZE: usize;

    /// Encode into the first `WIRE_SIZE` bytes of `buf`. Padding is zeroed.
    fn encode_into(&self, buf: &mut [u8]) -> Result<(), LayoutError>;

    /// Decode from the first `WIRE_SIZE` bytes of `buf`. Padding is ignored.
    fn decode_from(buf: &[u8]) -> Result<Self, LayoutError>;
}

#[inline]
fn check_len(buf_len: usize, needed: usize) -> Result<(), LayoutError> {
    if buf_len < needed {
        return Err(LayoutError::Truncated {
            needed,
            got: buf_len,
        });
    }
    Ok(())
}

#[inline]
fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn put_u64(buf: &mut [u8], off: usize, v: u64) {
    buf[off..off + 8].copy_from_slice(&v.to_le_bytes());
}

#[inline]
fn get_u32(buf: &[u8], off: usize) -> u32 {
    let mut b = [0u8; 4];
    b.copy_from_slice(&buf[off..off + 4]);
    u32::from_le_bytes(b)
}

#[inline]
fn get_u64(buf: &[u8], off: usize) -> u64 {
    let mut b = [0u8; 8];
    b.copy_from_slice(&buf[off..off + 8]);
    u64::from_le_bytes(b)
}

impl WireEntry for ControlEntry {
    const WIRE_SIZE: usize = offsets::CONTROL_PARAMS + 8 * PARAM_MAX;

    fn encode_into(&self, buf: &mut [u8]) -> Result<(), LayoutError> {
        check_len(buf.len(), Self::WIRE_SIZE)?;
        put_u32(buf, offsets::CONTROL_COMMAND, self.command);
        put_u32(buf, offsets::CONTROL_COMMAND + 4, 0);
        for (i, p) in self.params.iter().enumerate() {
            put_u64(buf, offsets::CONTROL_PARAMS + 8 * i, *p);
        }
        Ok(())
    }

    fn decode_from(buf: &[u8]) -> Result<Self, LayoutError> {
        check_len(buf.len(), Self::WIRE_SIZE)?;
        let mut params = [0u64; PARAM_MAX];
        for (i, p) in params.iter_mut().enumerate() {
            *p = get_u64(buf, offsets::CONTROL_PARAMS + 8 * i);
        }
        Ok(Self {
            command: get_u32(buf, offsets::CONTROL_COMMAND),
            params,
        })
    }
}

impl WireEntry for OutputEntry {
    const WIRE_SIZE: usize = offsets::OUTPUT_OUTPUTS + 8 * OUTPUT_MAX;

    fn encode_into(&self, buf: &mut [u8]) -> Result<(), LayoutError> {
        check_len(buf.len(), Self::WIRE_SIZE)?;
        put_u32(buf, offsets::OUTPUT_COMMAND, self.command);
        put_u32(buf, offsets::OUTPUT_COMMAND + 4, 0);
        for (i, o) in self.outputs.iter().enumerate() {
            put_u64(buf, offsets::OUTPUT_OUTPUTS + 8 * i, *o);
        }
        Ok(())
    }

    fn decode_from(buf: &[u8]) -> Result<Self, LayoutError> {
        check_len(buf.len(), Self::WIRE_SIZE)?;
        let mut outputs = [0u64; OUTPUT_MAX];
        for (i, o) in outputs.iter_mut().enumerate() {
            *o = get_u64(buf, offsets::OUTPUT_OUTPUTS + 8 * i);
        }
        Ok(Self {
            command: get_u32(buf, offsets::OUTPUT_COMMAND),
            outputs,
        })
    }
}

/// Size of the largest entry encoding. Sized for stack scratch buffers.
pub const MAX_WIRE_ENTRY: usize = 64;

/// Encoded size of a ring holding `T` slots.
pub const fn ring_wire_size<T: WireEntry>() -> usize {
    offsets::RING_SLOTS + T::WIRE_SIZE * CAPACITY as usize
}

/// Byte offset of slot `index` (wrapped) within a ring region.
#[inline]
pub const fn slot_offset<T: WireEntry>(index: u32) -> usize {
    offsets::RING_SLOTS + T::WIRE_SIZE * index as usize
}

/// `sizeof(SubmissionRing)`.
pub const SUBMISSION_RING_SIZE: usize = ring_wire_size::<ControlEntry>();
/// `sizeof(CompletionRing)`.
pub const COMPLETION_RING_SIZE: usize = ring_wire_size::<OutputEntry>();

/// Offset of the sequence word: the ring size rounded up to a page.
#[inline]
pub const fn sequence_offset(ring_size: usize, page_size: usize) -> usize {
    (ring_size + page_size - 1) / page_size * page_size
}

/// Mapped size of a ring region: ring rounded up to a page, plus one page.
#[inline]
pub const fn region_size(ring_size: usize, page_size: usize) -> usize {
    sequence_offset(ring_size, page_size) + page_size
}

// ── repr(C) mirrors ──
//
// Never used to access shared memory. They exist so the compiler checks
// that the codec offsets match what a C peer would lay out.

#[repr(C)]
struct RawSubmissionRing {
    reserved: u32,
    index: u32,
    slots: [ControlEntry; CAPACITY as usize],
}

#[repr(C)]
struct RawCompletionRing {
    reserved: u32,
    index: u32,
    slots: [OutputEntry; CAPACITY as usize],
}

const_assert_eq!(core::mem::size_of::<ControlEntry>(), ControlEntry::WIRE_SIZE);
const_assert_eq!(core::mem::size_of::<OutputEntry>(), OutputEntry::WIRE_SIZE);
const_assert_eq!(core::mem::offset_of!(ControlEntry, command), offsets::CONTROL_COMMAND);
const_assert_eq!(core::mem::offset_of!(ControlEntry, params), offsets::CONTROL_PARAMS);
const_assert_eq!(core::mem::offset_of!(OutputEntry, command), offsets::OUTPUT_COMMAND);
const_assert_eq!(core::mem::offset_of!(OutputEntry, outputs), offsets::OUTPUT_OUTPUTS);
const_assert_eq!(core::mem::offset_of!(RawSubmissionRing, reserved), offsets::RING_RESERVED);
const_assert_eq!(core::mem::offset_of!(RawSubmissionRing, index), offsets::RING_INDEX);
const_assert_eq!(core::mem::offset_of!(RawSubmissionRing, slots), offsets::RING_SLOTS);
const_assert_eq!(core::mem::offset_of!(RawCompletionRing, slots), offsets::RING_SLOTS);
const_assert_eq!(core::mem::size_of::<RawSubmissionRing>(), SUBMISSION_RING_SIZE);
const_assert_eq!(core::mem::size_of::<RawCompletionRing>(), COMPLETION_RING_SIZE);
const_assert_eq!(SUBMISSION_RING_SIZE, 648);
const_assert_eq!(COMPLETION_RING_SIZE, 264);

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_control_layout_bytes() {
        let c = ControlEntry::new(0x0102_0304, [1, 2, 3, u64::MAX]);
        let mut buf = [0xAAu8; 40];
        c.encode_into(&mut buf).unwrap();

        assert_eq!(&buf[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&buf[4..8], &[0, 0, 0, 0], "padding must be zeroed");
        assert_eq!(&buf[8..16], &1u64.to_le_bytes());
        assert_eq!(&buf[32..40], &[0xFF; 8]);
    }

    #[test]
    fn test_output_layout_bytes() {
        let o = OutputEntry::new(9, [14]);
        let mut buf = [0u8; 16];
        o.encode_into(&mut buf).unwrap();
        assert_eq!(get_u32(&buf, 0), 9);
        assert_eq!(get_u64(&buf, 8), 14);
    }

    #[test]
    fn test_truncated_buffers() {
        let mut short = [0u8; 39];
        assert_eq!(
            ControlEntry::default().encode_into(&mut short),
            Err(LayoutError::Truncated { needed: 40, got: 39 })
        );
        assert_eq!(
            OutputEntry::decode_from(&[0u8; 15]),
            Err(LayoutError::Truncated { needed: 16, got: 15 })
        );
    }

    #[test]
    fn test_decode_ignores_padding() {
        let mut buf = [0u8; 16];
        OutputEntry::new(3, [8]).encode_into(&mut buf).unwrap();
        buf[5] = 0x7F;
        assert_eq!(OutputEntry::decode_from(&buf).unwrap(), OutputEntry::new(3, [8]));
    }

    #[test]
    fn test_region_sizes() {
        assert_eq!(sequence_offset(SUBMISSION_RING_SIZE, 4096), 4096);
        assert_eq!(region_size(SUBMISSION_RING_SIZE, 4096), 8192);
        assert_eq!(region_size(COMPLETION_RING_SIZE, 4096), 8192);
        assert_eq!(region_size(4096, 4096), 8192);
        assert_eq!(region_size(4097, 4096), 12288);
    }

    #[test]
    fn test_slot_offsets() {
        assert_eq!(slot_offset::<ControlEntry>(0), 8);
        assert_eq!(slot_offset::<ControlEntry>(15), 8 + 15 * 40);
        assert_eq!(slot_offset::<OutputEntry>(1), 24);
        assert!(ControlEntry::WIRE_SIZE <= MAX_WIRE_ENTRY);
    }

    #[test]
    fn test_extremes_round_trip() {
        for v in [0u64, u64::MAX] {
            let c = ControlEntry::new(u32::MAX, [v; PARAM_MAX]);
            let mut buf = [0u8; MAX_WIRE_ENTRY];
            c.encode_into(&mut buf).unwrap();
            assert_eq!(ControlEntry::decode_from(&buf).unwrap(), c);

            let o = OutputEntry::new(0, [v]);
            o.encode_into(&mut buf).unwrap();
            assert_eq!(OutputEntry::decode_from(&buf).unwrap(), o);
        }
    }

    proptest! {
        #[test]
        fn prop_control_round_trip(command: u32, params: [u64; PARAM_MAX]) {
            let c = ControlEntry::new(command, params);
            let mut buf = [0u8; MAX_WIRE_ENTRY];
            c.encode_into(&mut buf).unwrap();
            prop_assert_eq!(ControlEntry::decode_from(&buf).unwrap(), c);
        }

        #[test]
        fn prop_output_round_trip(command: u32, out: u64) {
            let o = OutputEntry::new(command, [out]);
            let mut buf = [0u8; MAX_WIRE_ENTRY];
            o.encode_into(&mut buf).unwrap();
            prop_assert_eq!(OutputEntry::decode_from(&buf).unwrap(), o);
        }
    }
}
