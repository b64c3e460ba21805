/*
 * Copyright 2024 Download Service Contributors
 */

//! Ambient stack shared by every crate in this workspace: log bootstrap,
//! configuration loading, and a handful of small time/id helpers that do not
//! belong to any one component.

pub mod config;
mod log;

pub use config::ConfigFile;
pub use log::make_log;

use anyhow::Result;

/// Monotonic-ish wall clock second count, used throughout the orchestrator to
/// suffix staging directories and job ids the way the source system does with
/// `int(time.time())`.
pub fn unix_time_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Finer-grained monotonic suffix (fractional seconds), used for staging
/// folder names so that two jobs created within the same second never
/// collide.
pub fn unix_time_fractional() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

pub trait ResultExt<T> {
    /// Log the error at `warn!` and discard it, returning `None`. Used for
    /// operations (like lock release) whose failure must not abort a larger
    /// flow but should never pass silently.
    fn warn_on_err(self, log: &slog::Logger, msg: &str) -> Option<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn warn_on_err(self, log: &slog::Logger, msg: &str) -> Option<T> {
        match self {
            Ok(v) => Some(v),
            Err(e) => {
                slog::warn!(log, "{}: {}", msg, e);
                None
            }
        }
    }
}

pub fn load_config(path: &str) -> Result<ConfigFile> {
    config::load(path)
}
