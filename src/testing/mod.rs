//! Testing utilities for the provider.
//!
//! [`ProviderTester`] drives a [`ProviderService`] the way the host does,
//! without a host. [`InMemoryApi`] stands in for the Datadog API and can be
//! made eventually consistent with [`InMemoryApi::with_delete_lag`], which
//! is what the destroy checks are built to tolerate.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//! use datadog_provider::testing::{InMemoryApi, ProviderTester};
//! use datadog_provider::{DatadogProvider, RetryRunner};
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let api = Arc::new(InMemoryApi::new());
//! let tester = ProviderTester::new(DatadogProvider::new().with_api(api));
//!
//! let state = tester
//!     .lifecycle_create(
//!         "datadog_integration_azure",
//!         json!({"tenant_name": "t", "client_id": "c", "client_secret": "s"}),
//!     )
//!     .await
//!     .unwrap();
//! tester.lifecycle_delete("datadog_integration_azure", state.clone()).await.unwrap();
//!
//! let runner = RetryRunner::fixed(2, Duration::ZERO);
//! tester
//!     .check_destroyed("datadog_integration_azure", &[state], &runner)
//!     .await
//!     .unwrap();
//! # });
//! ```

mod fake;

pub use fake::InMemoryApi;

use std::convert::Infallible;

use serde_json::Value;

use crate::diagnostics::{Diagnostic, DiagnosticSeverity};
use crate::error::ProviderError;
use crate::provider::ProviderService;
use crate::retry::{Outcome, ProbeResult, RetryError, RetryRunner};
use crate::types::ImportedResource;

/// A test harness for [`ProviderService`] implementations.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl<P: ProviderService> ProviderTester<P> {
    /// Create a new tester for the given provider.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Get a reference to the underlying provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Get the list of resource type names.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate provider configuration.
    ///
    /// Returns `Err` with the error diagnostics if there are any.
    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Stop the provider.
    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Create a new resource.
    pub async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    /// Read the current state of a resource.
    pub async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    /// Update an existing resource.
    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider
            .update(resource_type, prior_state, planned_state)
            .await
    }

    /// Delete a resource.
    pub async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    /// Import an existing resource.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// Validate, create, then read back. Returns the state after read.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let created = self.create(resource_type, config).await?;
        Ok(self.read(resource_type, created).await?)
    }

    /// Validate, update, then read back. Returns the state after read.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let updated = self.update(resource_type, prior_state, config).await?;
        Ok(self.read(resource_type, updated).await?)
    }

    /// Delete a resource.
    pub async fn lifecycle_delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), TestError> {
        Ok(self.delete(resource_type, current_state).await?)
    }

    /// Create, update, then delete. Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone())
            .await?;
        Ok(updated)
    }

    // =========================================================================
    // Existence Checks
    // =========================================================================

    /// Read every state and return the refreshed states.
    pub async fn check_exists(
        &self,
        resource_type: &str,
        states: &[Value],
    ) -> Result<Vec<Value>, TestError> {
        let mut refreshed = Vec::with_capacity(states.len());
        for state in states {
            refreshed.push(self.read(resource_type, state.clone()).await?);
        }
        Ok(refreshed)
    }

    /// Poll until none of `states` can be read any more.
    ///
    /// Any read result other than not-found is retried: a successful read
    /// means the object "still exists", and other errors are treated as
    /// transient. Exhaustion yields [`TestError::NotDestroyed`] with the last
    /// reason.
    pub async fn check_destroyed(
        &self,
        resource_type: &str,
        states: &[Value],
        runner: &RetryRunner,
    ) -> Result<(), TestError> {
        let outcome = runner
            .run(|| async move {
                for state in states {
                    let id = state.get("id").and_then(Value::as_str).unwrap_or_default();
                    match self.read(resource_type, state.clone()).await {
                        Err(e) if e.is_not_found() => continue,
                        Ok(_) => {
                            return Ok::<_, Infallible>(ProbeResult::Retryable(format!(
                                "{} {} still exists",
                                resource_type, id
                            )))
                        }
                        Err(e) => {
                            return Ok(ProbeResult::Retryable(format!(
                                "received an error retrieving {} {}: {}",
                                resource_type, id, e
                            )))
                        }
                    }
                }
                Ok(ProbeResult::Success)
            })
            .await;

        match outcome {
            Ok(Outcome::Success) => Ok(()),
            Ok(Outcome::ExhaustedRetries(reason)) => Err(TestError::NotDestroyed(reason)),
            Ok(Outcome::Cancelled) => Err(TestError::Retry(RetryError::Cancelled)),
            Err(never) => match never {},
        }
    }
}

/// Error type for test operations.
#[derive(Debug)]
pub enum TestError {
    /// The operation failed with diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The operation failed with a provider error.
    Provider(ProviderError),
    /// An object was still readable after all destroy checks.
    NotDestroyed(String),
    /// A retry loop ended without success.
    Retry(RetryError),
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestError::Diagnostics(diags) => {
                writeln!(f, "Operation failed with {} diagnostic(s):", diags.len())?;
                for diag in diags {
                    write!(f, "  [{:?}] {}", diag.severity, diag.summary)?;
                    if let Some(detail) = &diag.detail {
                        write!(f, ": {}", detail)?;
                    }
                    if let Some(attr) = &diag.attribute {
                        write!(f, " (at {})", attr)?;
                    }
                    writeln!(f)?;
                }
                Ok(())
            }
            TestError::Provider(e) => write!(f, "Provider error: {}", e),
            TestError::NotDestroyed(reason) => write!(f, "Resource not destroyed: {}", reason),
            TestError::Retry(e) => write!(f, "Retry error: {}", e),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(e: ProviderError) -> Self {
        TestError::Provider(e)
    }
}

impl From<RetryError> for TestError {
    fn from(e: RetryError) -> Self {
        TestError::Retry(e)
    }
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// Assert that diagnostics contain no errors.
///
/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics.iter().filter(|d| d.is_error()).collect();

    assert!(
        errors.is_empty(),
        "Expected no errors, but got {} error(s): {:?}",
        errors.len(),
        errors.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain at least one error.
///
/// # Panics
///
/// Panics if there are no error diagnostics.
pub fn assert_has_errors(diagnostics: &[Diagnostic]) {
    assert!(
        diagnostics.iter().any(Diagnostic::is_error),
        "Expected at least one error, but got none"
    );
}

/// Assert that diagnostics contain an error on the given attribute path.
///
/// # Panics
///
/// Panics if no error diagnostic points at `attribute`.
pub fn assert_error_at(diagnostics: &[Diagnostic], attribute: &str) {
    let found = diagnostics.iter().any(|d| {
        d.severity == DiagnosticSeverity::Error && d.attribute.as_deref() == Some(attribute)
    });

    assert!(
        found,
        "Expected an error at '{}', but got errors at: {:?}",
        attribute,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.attribute.as_deref().unwrap_or("<none>"))
            .collect::<Vec<_>>()
    );
}

/// Assert that diagnostics contain an error with the given summary substring.
///
/// # Panics
///
/// Panics if no error diagnostic contains the given substring.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let has_matching_error = diagnostics
        .iter()
        .any(|d| d.is_error() && d.summary.contains(substring));

    assert!(
        has_matching_error,
        "Expected an error containing '{}', but no matching error found. Errors: {:?}",
        substring,
        diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| &d.summary)
            .collect::<Vec<_>>()
    );
}
