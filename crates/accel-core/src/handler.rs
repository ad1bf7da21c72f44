//! Command handler abstraction.
//!
//! The worker applies a `CommandHandler` to every drained entry.
//!
//! # Implementors
//!
//! - `ReferenceHandler` (default): echoes the command and returns
//!   `5 + command` as the single output.
//! - Any `Fn(&ControlEntry) -> OutputEntry + Send + Sync` closure.

use crate::entry::{ControlEntry, OutputEntry, OUTPUT_MAX};

/// Maps one control entry to one output entry.
///
/// **Contract:**
/// - Pure: the output depends only on the input.
/// - Bounded: it runs inline on the worker thread, so every session
///   waits while it executes.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, control: &ControlEntry) -> OutputEntry;
}

impl<F> CommandHandler for F
where
    F: Fn(&ControlEntry) -> OutputEntry + Send + Sync,
{
    #[inline]
    fn execute(&self, control: &ControlEntry) -> OutputEntry {
        self(control)
    }
}

/// Offset added to the command code by [`ReferenceHandler`].
pub const REFERENCE_OFFSET: u64 = 5;

/// The sample accelerator: `outputs[0] = 5 + command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferenceHandler;

impl CommandHandler for ReferenceHandler {
    #[inline]
    fn execute(&self, control: &ControlEntry) -> OutputEntry {
        let mut outputs = [0u64; OUTPUT_MAX];
        outputs[0] = REFERENCE_OFFSET.wrapping_add(control.command as u64);
        OutputEntry::new(control.command, outputs)
    }
}
