//! Environment variable utilities
//!
//! Configuration structs read their `ACCEL_*` overrides through these.
//!
//! ```ignore
//! use accel_core::env::{env_get, env_get_bool};
//!
//! let slice_us: u64 = env_get("ACCEL_PARK_SLICE_US", 500);
//! let drain: bool = env_get_bool("ACCEL_DRAIN_ON_SHUTDOWN", true);
//! ```

use std::str::FromStr;

/// Get environment variable parsed as `T`, or `default` if unset or unparsable.
#[inline]
pub fn env_get<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    env_get_opt(key).unwrap_or(default)
}

/// Get environment variable as boolean.
///
/// `"1"`, `"true"`, `"yes"`, `"on"` (any case) are true, any other set
/// value is false, unset returns `default`.
#[inline]
pub fn env_get_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(val) => matches!(val.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Get environment variable parsed as `T`, `None` if unset or unparsable.
#[inline]
pub fn env_get_opt<T>(key: &str) -> Option<T>
where
    T: FromStr,
{
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}
