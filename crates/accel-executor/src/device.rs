//! Device lifecycle.
//!
//! A [`Device`] is the privileged side of the channel: it owns the session
//! registry, the doorbell and the worker thread. It is built once with
//! [`Device::start`] and torn down once with [`Device::shutdown`] (or on
//! drop). Clients attach through it.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use tracing::{info, warn};

use accel_core::env::env_get_bool;
use accel_core::error::{AccelError, AttachError, Result};
use accel_core::handler::CommandHandler;
use accel_core::notifier::Notifier;
use accel_core::session::SessionId;
use accel_module::client::Accelerator;
use accel_module::config::ClientConfig;
use accel_module::doorbell::{PlatformDoorbell, WorkSignal};
use accel_module::registry::SessionRegistry;

use crate::worker::{WorkerLoop, WorkerShared, WorkerState, WorkerStats};

/// Configuration for a device.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    /// Run one last scan-and-drain pass after a stop request (default: true)
    pub drain_on_shutdown: bool,

    /// Name of the worker thread (default: "accel-worker")
    pub worker_name: String,

    /// Configuration handed to every client attached through this device
    pub client: ClientConfig,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            drain_on_shutdown: true,
            worker_name: "accel-worker".to_string(),
            client: ClientConfig::default(),
        }
    }
}

impl DeviceConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `ACCEL_DRAIN_ON_SHUTDOWN` and the client
    /// variables read by [`ClientConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            drain_on_shutdown: env_get_bool("ACCEL_DRAIN_ON_SHUTDOWN", true),
            client: ClientConfig::from_env(),
            ..Self::default()
        }
    }

    pub fn drain_on_shutdown(mut self, enable: bool) -> Self {
        self.drain_on_shutdown = enable;
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn client(mut self, client: ClientConfig) -> Self {
        self.client = client;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), &'static str> {
        if self.worker_name.is_empty() {
            return Err("worker_name must not be empty");
        }
        if self.worker_name.contains('\0') {
            return Err("worker_name must not contain NUL");
        }
        self.client.validate()
    }
}

/// The privileged side: registry, doorbell and worker thread.
pub struct Device {
    registry: Arc<SessionRegistry>,
    doorbell: Arc<PlatformDoorbell>,
    shared: Arc<WorkerShared>,
    worker: Mutex<Option<JoinHandle<()>>>,
    config: DeviceConfig,
}

impl Device {
    /// Validate `config` and start the worker thread running `handler`.
    pub fn start<H>(config: DeviceConfig, handler: H) -> Result<Self>
    where
        H: CommandHandler + 'static,
    {
        config.validate().map_err(AccelError::InvalidConfig)?;

        let registry = Arc::new(SessionRegistry::new());
        let doorbell = Arc::new(PlatformDoorbell::new());
        let shared = Arc::new(WorkerShared::default());

        let worker = WorkerLoop::new(
            Arc::clone(&registry),
            Arc::clone(&doorbell),
            handler,
            Arc::clone(&shared),
            config.drain_on_shutdown,
        );
        let handle = thread::Builder::new()
            .name(config.worker_name.clone())
            .spawn(move || worker.run())
            .map_err(AccelError::WorkerSpawn)?;

        info!(worker = %config.worker_name, "device started");
        Ok(Self {
            registry,
            doorbell,
            shared,
            worker: Mutex::new(Some(handle)),
            config,
        })
    }

    /// Attach a session with the device's client configuration.
    pub fn attach(&self, id: SessionId) -> Result<Accelerator> {
        self.attach_with(id, self.config.client.clone())
    }

    /// Attach a session with its own client configuration.
    pub fn attach_with(&self, id: SessionId, client: ClientConfig) -> Result<Accelerator> {
        if self.doorbell.is_stopping() {
            return Err(AttachError::DeviceStopped.into());
        }
        Accelerator::attach(
            id,
            Arc::clone(&self.registry),
            self.doorbell.clone() as Arc<dyn Notifier>,
            client,
        )
    }

    /// Stop the worker and wait for it to exit. Idempotent.
    ///
    /// Attached clients stay valid; entries they submit afterwards are
    /// never completed.
    pub fn shutdown(&self) {
        let Some(handle) = self.worker.lock().take() else {
            return;
        };
        self.doorbell.request_stop();
        if handle.join().is_err() {
            warn!(worker = %self.config.worker_name, "worker thread panicked");
        }
        info!(sessions = self.registry.len(), "device stopped");
    }

    #[inline]
    pub fn worker_state(&self) -> WorkerState {
        self.shared.state()
    }

    #[inline]
    pub fn stats(&self) -> WorkerStats {
        self.shared.stats()
    }

    /// Number of attached sessions.
    #[inline]
    pub fn sessions(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("worker_state", &self.worker_state())
            .field("sessions", &self.sessions())
            .field("stats", &self.stats())
            .finish()
    }
}
