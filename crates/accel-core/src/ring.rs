//! Cursor arithmetic for the fixed-capacity rings.
//!
//! Two kinds of cursors exist:
//!
//! - **wrapped**: the `index` stored in a ring header, always in
//!   `[0, CAPACITY)`. It carries no lap count, so a full ring and an empty
//!   ring look the same.
//! - **unwrapped**: a `u32` counter that only ever increments (modulo
//!   `2^32`). Outstanding counts are always computed from these, with
//!   wrapping subtraction.

use crate::entry::CAPACITY;

// Wrapped cursors must stay consistent when an unwrapped u32 counter
// rolls over from u32::MAX to 0.
static_assertions::const_assert!(CAPACITY.is_power_of_two());

/// Reduce an unwrapped counter to a slot index.
#[inline]
pub const fn wrap(counter: u32) -> u32 {
    counter % CAPACITY
}

/// Forward distance from wrapped cursor `lower` to wrapped cursor `upper`.
///
/// `upper - lower` when `upper >= lower`, otherwise `upper + CAPACITY - lower`.
/// Both inputs must be in `[0, CAPACITY)`. Ambiguous for a full ring: the
/// result is 0 both when nothing and when everything is pending.
#[inline]
pub const fn ring_distance(lower: u32, upper: u32) -> u32 {
    if upper >= lower {
        upper - lower
    } else {
        upper + CAPACITY - lower
    }
}

/// Entries between two unwrapped counters (`upper` ahead of `lower`).
#[inline]
pub const fn outstanding(lower: u32, upper: u32) -> u32 {
    upper.wrapping_sub(lower)
}
