//! Logging setup for hosts embedding the engine.
//!
//! The engine itself only emits `tracing` events; this helper installs a
//! console subscriber for hosts that do not bring their own, configurable
//! via the `RUST_LOG` environment variable.

use tracing_subscriber::EnvFilter;

/// Installs a console subscriber with env-filter support.
///
/// Defaults to `info` when `RUST_LOG` is not set. Safe to call when a
/// subscriber is already installed: the attempt is simply ignored, so
/// embedding hosts with their own logging keep it.
pub fn init_logging() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}
