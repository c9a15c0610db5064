//! Logging setup.
//!
//! Logs go through `tracing` and are always written to **stderr**, leaving
//! stdout to the host.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard filter directives (e.g. `info`, `datadog_provider=debug`)
//! - `DD_PROVIDER_LOG`: used when `RUST_LOG` is unset
//!
//! ```bash
//! # Watch delete verification retries
//! DD_PROVIDER_LOG=datadog_provider::retry=debug ./provider
//! ```

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Fallback variable consulted when `RUST_LOG` is unset or invalid.
pub const LOG_ENV: &str = "DD_PROVIDER_LOG";

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env(LOG_ENV))
        .unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn try_init_with(default_level: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false),
        )
        .try_init()
}

/// Initialize logging at `info` unless the environment says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    if let Err(e) = try_init_with(default_level) {
        panic!("failed to initialize logging: {}", e);
    }
}

/// Try to initialize logging, returning false if already initialized.
pub fn try_init_logging() -> bool {
    try_init_with("info").is_ok()
}

#[cfg(test)]
mod tests {
    // The global subscriber can only be set once per process, so these tests
    // stick to filter parsing and the idempotent initializer.

    use super::*;

    #[test]
    fn test_env_filter_parsing() {
        assert!(EnvFilter::try_new("info").is_ok());
        assert!(EnvFilter::try_new("datadog_provider=debug").is_ok());
        assert!(EnvFilter::try_new("warn,datadog_provider::retry=debug").is_ok());
    }

    #[test]
    fn test_try_init_is_idempotent() {
        let _ = try_init_logging();
        assert!(!try_init_logging());
    }
}
