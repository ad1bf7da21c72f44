//! Client configuration

use accel_core::env::{env_get, env_get_opt};
use std::str::FromStr;
use std::time::Duration;

/// How a client waits for a completion that has not been published yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitMode {
    /// Busy-poll the completion sequence word.
    #[default]
    Spin,
    /// Sleep on the completion sequence word (futex on Linux).
    Park,
}

impl FromStr for WaitMode {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(WaitMode::Spin),
            "park" => Ok(WaitMode::Park),
            _ => Err("wait mode must be \"spin\" or \"park\""),
        }
    }
}

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Wait strategy (default: spin)
    pub wait_mode: WaitMode,

    /// Longest single sleep in park mode before re-checking the
    /// deadline and cancellation token (default: 500us)
    pub park_slice: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            wait_mode: WaitMode::Spin,
            park_slice: Duration::from_micros(500),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `ACCEL_WAIT_MODE` and `ACCEL_PARK_SLICE_US`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            wait_mode: env_get_opt("ACCEL_WAIT_MODE").unwrap_or(defaults.wait_mode),
            park_slice: Duration::from_micros(env_get(
                "ACCEL_PARK_SLICE_US",
                defaults.park_slice.as_micros() as u64,
            )),
        }
    }

    pub fn wait_mode(mut self, mode: WaitMode) -> Self {
        self.wait_mode = mode;
        self
    }

    pub fn park_slice(mut self, d: Duration) -> Self {
        self.park_slice = d;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.wait_mode == WaitMode::Park && self.park_slice.is_zero() {
            return Err("park_slice must be non-zero in park mode");
        }
        Ok(())
    }
}
