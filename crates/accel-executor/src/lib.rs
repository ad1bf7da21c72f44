//! # accel-executor — The Worker
//!
//! The worker runs on a dedicated thread owned by a [`Device`] and executes
//! this loop:
//!
//! ```text
//! loop {
//!     1. Sleep on the doorbell until it was rung or a stop was requested
//!     2. Stop requested? → leave the loop
//!     3. Snapshot every attached submission ring
//!     4. For each session:
//!          no completion ring? → log orphan, skip
//!          while cursor != published submit counter:
//!              handler(submission[cursor % 16]) → completion[cursor % 16]
//!              publish completion counter, wake parked client
//!     5. Decrement the doorbell by one
//! }
//! (optional) one final pass, then Stopped
//! ```
//!
//! The loop is generic over the doorbell and the command handler.

pub mod device;
pub mod worker;

pub use device::{Device, DeviceConfig};
pub use worker::{WorkerLoop, WorkerState, WorkerStats};

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Install a `tracing` fmt subscriber filtered by `ACCEL_LOG`
/// (falls back to `info`). Safe to call more than once; only the first call
/// has an effect, and an already-installed global subscriber is kept.
pub fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_env("ACCEL_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .with_thread_names(true)
            .try_init();
    });
}
