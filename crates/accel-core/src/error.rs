//! Accel error types.

use crate::entry::CAPACITY;
use crate::session::SessionId;

/// Everything that can go wrong on either side of the channel.
#[derive(Debug, thiserror::Error)]
pub enum AccelError {
    /// The batch does not fit in the slots left in the submission ring.
    #[error(
        "at most {available} commands can be enqueued - {}",
        capacity_advice(.available)
    )]
    CapacityExceeded { requested: usize, available: u32 },

    /// The session's rings could not be set up.
    #[error("attach failed: {0}")]
    AttachFailure(#[from] AttachError),

    /// A submission ring was scanned with no completion ring registered
    /// for the same session. Logged by the worker, never returned to a client.
    #[error("submission ring for {0} has no completion ring")]
    OrphanedSubmission(SessionId),

    /// A bounded wait expired. The first `retrieved` outputs are valid.
    #[error("timed out waiting for completions ({retrieved} retrieved)")]
    Timeout { retrieved: usize },

    /// A bounded wait was cancelled. The first `retrieved` outputs are valid.
    #[error("wait cancelled ({retrieved} retrieved)")]
    Cancelled { retrieved: usize },

    /// An entry could not be moved across the region boundary.
    #[error("layout: {0}")]
    Layout(#[from] LayoutError),

    /// The worker thread could not be started.
    #[error("failed to spawn worker thread: {0}")]
    WorkerSpawn(std::io::Error),

    /// Configuration rejected by `validate()`.
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),

    /// OS error with errno.
    #[error("OS error: errno {0}")]
    Os(i32),
}

fn capacity_advice(available: &u32) -> &'static str {
    if *available == CAPACITY {
        "try to split your workload"
    } else {
        "wait for some completion before enqueuing new commands"
    }
}

/// Why a session's rings could not be attached.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachError {
    /// Shared memory for a ring region could not be obtained.
    #[error("ring region allocation failed: errno {0}")]
    Allocation(i32),
    /// A region was not aligned to a memory page.
    #[error("{region} ring region not aligned to a memory page")]
    Misaligned { region: &'static str },
    /// The identity already owns a pair of rings.
    #[error("{0} already attached")]
    AlreadyAttached(SessionId),
    /// The device has been shut down.
    #[error("device stopped")]
    DeviceStopped,
}

/// Region boundary validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    /// Buffer or region shorter than the encoding needs.
    #[error("need {needed} bytes, got {got}")]
    Truncated { needed: usize, got: usize },
    /// Region base not page-aligned.
    #[error("region base {addr:#x} not aligned to {page_size}")]
    Unaligned { addr: usize, page_size: usize },
}

pub type Result<T> = std::result::Result<T, AccelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_message_wait() {
        let e = AccelError::CapacityExceeded { requested: 1, available: 0 };
        assert_eq!(
            e.to_string(),
            "at most 0 commands can be enqueued - wait for some completion before enqueuing new commands"
        );
    }

    #[test]
    fn test_capacity_message_split() {
        let e = AccelError::CapacityExceeded { requested: 20, available: CAPACITY };
        assert_eq!(
            e.to_string(),
            "at most 16 commands can be enqueued - try to split your workload"
        );
    }

    #[test]
    fn test_attach_conversion() {
        let e: AccelError = AttachError::AlreadyAttached(SessionId(7)).into();
        assert!(matches!(e, AccelError::AttachFailure(AttachError::AlreadyAttached(SessionId(7)))));
        assert_eq!(e.to_string(), "attach failed: pid 7 already attached");
    }
}
