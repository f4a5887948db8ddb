//! Tracing subscriber setup for binaries and host applications.
//!
//! The library itself only emits `tracing` events; installing a subscriber
//! is left to the process that embeds it.

use tracing_subscriber::EnvFilter;

/// Install a formatting subscriber filtered by `RUST_LOG`
///
/// Falls back to `default_level` (e.g. `"info"` or `"fieldsync=debug"`) when
/// `RUST_LOG` is unset or invalid. Returns `false` if a global subscriber was
/// already installed.
pub fn init_tracing(default_level: &str) -> bool {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
