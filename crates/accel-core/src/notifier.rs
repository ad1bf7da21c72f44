//! Worker notification abstraction.
//!
//! A `Notifier` is the doorbell the client rings after publishing new
//! submissions. The worker side of the same object blocks until the
//! doorbell has been rung or a stop was requested.
//!
//! # Implementors
//!
//! - `PlatformDoorbell` (accel-module): one futex word holding the pending count
//!   and a stop flag. Condvar-backed on non-Linux targets.

use crate::error::Result;

/// Wakes the worker when new submissions are available.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple calls before the worker wakes are coalesced: the worker
///   performs one full pass per wake, which covers every signal that
///   arrived before the pass started.
pub trait Notifier: Send + Sync {
    /// Signal that new submissions are available.
    fn notify(&self) -> Result<()>;
}
