//! Datadog provider
//!
//! Resource handlers that map declarative resource blocks onto the Datadog
//! REST API, plus the retry machinery that makes them usable against an
//! eventually consistent backend.
//!
//! # Overview
//!
//! - **[`RetryRunner`]**: polls a probe until it succeeds, fails fatally or
//!   runs out of attempts, sleeping between attempts (blocking or on tokio)
//! - **[`DatadogProvider`]**: the [`ProviderService`] implementation that
//!   dispatches to the resource handlers and verifies deletes
//! - **Resources**: `datadog_integration_azure`,
//!   `datadog_sensitive_data_scanner_rule`, `datadog_cloud_configuration_rule`
//! - **Client**: the [`DatadogApi`] trait and its reqwest implementation
//! - **Testing**: a provider harness and an in-memory API fake
//!
//! # Quick Start
//!
//! ```no_run
//! use datadog_provider::{init_logging, DatadogProvider, ProviderService};
//! use serde_json::json;
//!
//! # async fn run() -> Result<(), datadog_provider::ProviderError> {
//! init_logging();
//!
//! let provider = DatadogProvider::new();
//! provider
//!     .configure(json!({
//!         "api_key": "<api key>",
//!         "app_key": "<application key>",
//!         "delete_verification": {"max_attempts": 2, "delay_seconds": 10}
//!     }))
//!     .await?;
//!
//! let state = provider
//!     .create(
//!         "datadog_integration_azure",
//!         json!({"tenant_name": "tenant", "client_id": "client", "client_secret": "secret"}),
//!     )
//!     .await?;
//! provider.delete("datadog_integration_azure", state).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backoff;
pub mod client;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod provider;
pub mod resources;
pub mod retry;
pub mod testing;
pub mod types;

// Re-export main types at crate root
pub use backoff::Backoff;
pub use client::{DatadogApi, HttpClient};
pub use config::ProviderConfig;
pub use diagnostics::{Diagnostic, DiagnosticSeverity};
pub use error::{ApiError, ProviderError};
pub use logging::{init_logging, init_logging_with_default, try_init_logging};
pub use provider::{DatadogProvider, ProviderService};
pub use resources::ResourceHandler;
pub use retry::{Outcome, ProbeResult, RetryError, RetryRunner, RetrySettings, Sleeper};
pub use types::{ImportedResource, ProviderMetadata};

// Re-export async_trait for implementors of the public traits
pub use async_trait::async_trait;

// Re-export commonly used external types
pub use serde_json;
pub use tokio_util::sync::CancellationToken;
pub use tracing;
