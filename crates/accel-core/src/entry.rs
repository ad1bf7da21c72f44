//! Command and output entry types.
//!
//! These are the *lingua franca* between the client and the worker.
//! Both are plain `Copy` values; their shared-memory representation is
//! produced by the codec in [`crate::layout`], never by reinterpreting
//! the struct in place.

/// Number of `u64` parameters carried by a [`ControlEntry`].
pub const PARAM_MAX: usize = 4;

/// Number of `u64` results carried by an [`OutputEntry`].
pub const OUTPUT_MAX: usize = 1;

/// Slots per ring. Fixed at build time, identical for every session.
pub const CAPACITY: u32 = 16;

/// A command submitted by the client.
///
/// Written by the client into the submission ring.
/// Read by the worker. Immutable once submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct ControlEntry {
    /// Command code, echoed back in the matching [`OutputEntry`].
    pub command: u32,
    /// Command parameters.
    pub params: [u64; PARAM_MAX],
}

impl ControlEntry {
    /// Build an entry with all parameters.
    #[inline]
    pub const fn new(command: u32, params: [u64; PARAM_MAX]) -> Self {
        Self { command, params }
    }

    /// Build an entry with zeroed parameters.
    #[inline]
    pub const fn with_command(command: u32) -> Self {
        Self {
            command,
            params: [0; PARAM_MAX],
        }
    }
}

/// A result published by the worker.
///
/// Written by the worker into the completion ring.
/// Read by the client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(C)]
pub struct OutputEntry {
    /// Command code of the originating [`ControlEntry`].
    pub command: u32,
    /// Command results.
    pub outputs: [u64; OUTPUT_MAX],
}

impl OutputEntry {
    #[inline]
    pub const fn new(command: u32, outputs: [u64; OUTPUT_MAX]) -> Self {
        Self { command, outputs }
    }
}
