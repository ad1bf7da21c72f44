//! # accel-core — Types and trait boundaries for the accel command channel
//!
//! A client writes fixed-size [`ControlEntry`] records into a shared-memory
//! submission ring and rings a doorbell. A privileged worker drains the ring,
//! runs a [`CommandHandler`] on each entry and publishes [`OutputEntry`]
//! records into a completion ring that the client reads back in order.
//!
//! This crate holds everything both sides must agree on and nothing that
//! touches the OS:
//!
//! - `entry` - command and output entries, ring capacity
//! - `layout` - the bit-exact wire layout and its codec
//! - `ring` - wrapped/unwrapped cursor arithmetic
//! - `session` - session identity
//! - `handler` - the injected command handler
//! - `notifier` - the doorbell seam between client and worker
//! - `cancel` - cancellation token for bounded waits
//! - `env` - environment variable helpers for configuration
//! - `error` - error types
//!
//! Shared-memory regions, the registry, the doorbell implementation and the
//! client channels live in `accel-module`. The worker loop lives in
//! `accel-executor`.

pub mod entry;
pub mod layout;
pub mod ring;
pub mod session;
pub mod handler;
pub mod notifier;
pub mod cancel;
pub mod env;
pub mod error;

pub use cancel::CancellationToken;
pub use entry::{ControlEntry, OutputEntry, CAPACITY, OUTPUT_MAX, PARAM_MAX};
pub use error::{AccelError, AttachError, LayoutError, Result};
pub use handler::{CommandHandler, ReferenceHandler};
pub use layout::WireEntry;
pub use notifier::Notifier;
pub use ring::{ring_distance, wrap};
pub use session::SessionId;
