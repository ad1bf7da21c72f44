//! # accel-module — Default implementations
//!
//! Everything that touches the OS or shared memory lives here.
//! The worker loop that drives it lives in `accel-executor`.
//!
//! ## Default stack
//!
//! | Concern              | Default impl          | Alternative                  |
//! |----------------------|-----------------------|------------------------------|
//! | Notifier / WorkSignal| FutexDoorbell (linux) | CondvarDoorbell (other unix) |
//! | Ring memory          | SharedRegion (memfd)  | SharedRegion (shm_open)      |
//! | Session lookup       | SessionRegistry       |                              |
//! | Completion wait      | WaitMode::Spin        | WaitMode::Park               |

pub mod futex;
pub mod doorbell;
pub mod region;
pub mod submit_ring;
pub mod completion_ring;
pub mod registry;
pub mod config;
pub mod client;

pub use client::{Accelerator, WaitOptions};
pub use config::{ClientConfig, WaitMode};
pub use doorbell::{PlatformDoorbell, Wake, WorkSignal};
pub use registry::{Session, SessionRegistry};
