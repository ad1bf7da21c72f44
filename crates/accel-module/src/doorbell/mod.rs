//! The doorbell: notification primitive between clients and the worker.
//!
//! A non-negative pending counter plus a block/wake mechanism.
//!
//! - Clients call [`Notifier::notify`]: increment, wake the worker.
//! - The worker calls [`WorkSignal::wait_for_work`]: block while the counter
//!   is zero and no stop was requested. After one full scan-and-drain pass it
//!   calls [`WorkSignal::finish_pass`], which decrements by exactly one.
//!
//! Several notifications arriving during one pass therefore cause extra,
//! usually empty, passes rather than lost work. A pass always drains every
//! session completely, so coalescing never strands an entry.

use accel_core::notifier::Notifier;

/// Why the worker woke up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// At least one notification is pending.
    Work,
    /// A stop was requested. Takes precedence over pending work.
    Stop,
}

/// Worker side of the doorbell.
pub trait WorkSignal: Notifier {
    /// Block until the counter is non-zero or a stop was requested.
    fn wait_for_work(&self) -> Wake;

    /// Decrement the counter by one (saturating at zero).
    fn finish_pass(&self);

    /// Request the worker to stop and wake it.
    fn request_stop(&self);

    /// Whether a stop has been requested.
    fn is_stopping(&self) -> bool;

    /// Current pending count (hint, may be stale).
    fn pending(&self) -> u32;
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexDoorbell as PlatformDoorbell;
    } else {
        mod fallback;
        pub use fallback::CondvarDoorbell as PlatformDoorbell;
    }
}
