//! The provider service: configuration, dispatch and delete verification.
//!
//! [`ProviderService`] is the host-facing surface. [`DatadogProvider`]
//! implements it by dispatching each call to the [`ResourceHandler`]
//! registered for the resource type.
//!
//! # Delete verification
//!
//! The Datadog API is eventually consistent: an object that was just deleted
//! can still be returned by a read for a few seconds. When
//! `delete_verification` is configured, a delete only completes once a read of
//! the object reports not-found, polled with a [`RetryRunner`]. If the object
//! is still visible when the budget runs out the delete fails with
//! [`ProviderError::DeadlineExceeded`] carrying the last reason.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::client::{DatadogApi, HttpClient};
use crate::config::ProviderConfig;
use crate::diagnostics::{has_errors, Diagnostic};
use crate::error::ProviderError;
use crate::resources::{self, ResourceHandler};
use crate::retry::{Outcome, ProbeResult, RetryRunner};
use crate::types::{ImportedResource, ProviderMetadata, PROVIDER_NAME};

/// Operations the host invokes on a provider.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    // =========================================================================
    // Metadata
    // =========================================================================

    /// Describe the provider and the resource types it serves.
    fn metadata(&self) -> ProviderMetadata;

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    /// Validate the provider configuration before configuring.
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Configure the provider with credentials and settings.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Stop the provider, aborting in-flight waits.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    /// Validate a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Create a new resource.
    async fn create(&self, resource_type: &str, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Read the current state of a resource.
    async fn read(&self, resource_type: &str, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Update an existing resource.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value)
        -> Result<(), ProviderError>;

    /// Import an existing object by ID.
    async fn import_resource(
        &self,
        resource_type: &str,
        _id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        Err(ProviderError::Unimplemented(format!(
            "Import not supported for resource type: {}",
            resource_type
        )))
    }
}

/// The Datadog provider.
pub struct DatadogProvider {
    handlers: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    api: RwLock<Option<Arc<dyn DatadogApi>>>,
    delete_verification: RwLock<Option<RetryRunner>>,
    shutdown: CancellationToken,
}

impl Default for DatadogProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DatadogProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatadogProvider")
            .field("resources", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DatadogProvider {
    /// Create an unconfigured provider with all resource handlers.
    pub fn new() -> Self {
        Self {
            handlers: resources::all()
                .into_iter()
                .map(|h| (h.type_name(), h))
                .collect(),
            api: RwLock::new(None),
            delete_verification: RwLock::new(None),
            shutdown: CancellationToken::new(),
        }
    }

    /// Use `api` instead of the HTTP client built by [`configure`].
    ///
    /// [`configure`]: ProviderService::configure
    pub fn with_api(mut self, api: Arc<dyn DatadogApi>) -> Self {
        *self.api.get_mut() = Some(api);
        self
    }

    /// Poll deletes with `runner`. It is cancelled when the provider stops.
    pub fn with_delete_verification(mut self, runner: RetryRunner) -> Self {
        let runner = runner.with_cancellation(self.shutdown.child_token());
        *self.delete_verification.get_mut() = Some(runner);
        self
    }

    /// Whether an API client is available.
    pub async fn is_configured(&self) -> bool {
        self.api.read().await.is_some()
    }

    fn handler(&self, resource_type: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.handlers
            .get(resource_type)
            .map(|h| h.as_ref())
            .ok_or_else(|| ProviderError::UnknownResource(resource_type.to_string()))
    }

    async fn api(&self) -> Result<Arc<dyn DatadogApi>, ProviderError> {
        self.api.read().await.clone().ok_or_else(|| {
            ProviderError::Configuration("provider used before it was configured".into())
        })
    }

    fn parse_config(config: Value) -> Result<(ProviderConfig, Vec<Diagnostic>), ProviderError> {
        let config = ProviderConfig::from_value(config)?;
        let diagnostics = config.validate();
        Ok((config, diagnostics))
    }

    /// Poll `handler.read` until the object is reported gone.
    async fn verify_deleted(
        &self,
        handler: &dyn ResourceHandler,
        api: &dyn DatadogApi,
        runner: &RetryRunner,
        state: &Value,
    ) -> Result<(), ProviderError> {
        let resource_type = handler.type_name();
        let id = state.get("id").and_then(Value::as_str).unwrap_or_default();

        let outcome = runner
            .run(|| async move {
                match handler.read(api, state.clone()).await {
                    Err(e) if e.is_not_found() => Ok(ProbeResult::Success),
                    Ok(_) => Ok(ProbeResult::Retryable(format!(
                        "{} {} still exists",
                        resource_type, id
                    ))),
                    Err(e) => Err(e),
                }
            })
            .await?;

        match outcome {
            Outcome::Success => Ok(()),
            Outcome::ExhaustedRetries(reason) => Err(ProviderError::DeadlineExceeded(reason)),
            Outcome::Cancelled => Err(ProviderError::Unavailable(format!(
                "provider stopped while waiting for {} {} to be deleted",
                resource_type, id
            ))),
        }
    }
}

#[async_trait::async_trait]
impl ProviderService for DatadogProvider {
    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: PROVIDER_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            resources: self.handlers.keys().map(|k| k.to_string()).collect(),
        }
    }

    #[instrument(skip(self, config), name = "provider.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        debug!("ValidateProviderConfig called");
        let (_, diagnostics) = Self::parse_config(config)?;
        if has_errors(&diagnostics) {
            warn!(
                diagnostics = diagnostics.len(),
                "ValidateProviderConfig completed with errors"
            );
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config), name = "provider.configure")]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        debug!("Configure called");
        let (config, diagnostics) = Self::parse_config(config)?;
        if has_errors(&diagnostics) {
            warn!(diagnostics = diagnostics.len(), "Configure completed with errors");
            return Ok(diagnostics);
        }

        let client = HttpClient::new(&config).map_err(|e| {
            error!(error = %e, "Configure failed");
            e
        })?;
        let runner = config
            .delete_verification
            .map(|s| s.runner().with_cancellation(self.shutdown.child_token()));

        info!(
            api_url = client.base_url(),
            delete_verification = runner.is_some(),
            "Configure completed successfully"
        );
        *self.api.write().await = Some(Arc::new(client));
        *self.delete_verification.write().await = runner;
        Ok(diagnostics)
    }

    #[instrument(skip(self), name = "provider.stop")]
    async fn stop(&self) -> Result<(), ProviderError> {
        info!("Stop called");
        self.shutdown.cancel();
        Ok(())
    }

    #[instrument(skip(self, config), name = "provider.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.handler(resource_type)?.validate(&config);
        if has_errors(&diagnostics) {
            warn!(
                diagnostics = diagnostics.len(),
                "ValidateResourceConfig completed with errors"
            );
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, planned_state), name = "provider.create")]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.handler(resource_type)?;
        let api = self.api().await?;
        match handler.create(api.as_ref(), planned_state).await {
            Ok(state) => {
                info!(id = ?state.get("id"), "Create completed successfully");
                Ok(state)
            }
            Err(e) => {
                error!(error = %e, "Create failed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self, current_state), name = "provider.read")]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.handler(resource_type)?;
        let api = self.api().await?;
        let result = handler.read(api.as_ref(), current_state).await;
        match &result {
            Ok(_) => debug!("Read completed"),
            Err(e) if e.is_not_found() => info!("Resource no longer exists"),
            Err(e) => error!(error = %e, "Read failed"),
        }
        result
    }

    #[instrument(skip(self, prior_state, planned_state), name = "provider.update")]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.handler(resource_type)?;
        let api = self.api().await?;
        match handler.update(api.as_ref(), prior_state, planned_state).await {
            Ok(state) => {
                info!(id = ?state.get("id"), "Update completed successfully");
                Ok(state)
            }
            Err(e) => {
                error!(error = %e, "Update failed");
                Err(e)
            }
        }
    }

    #[instrument(skip(self, current_state), name = "provider.delete")]
    async fn delete(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let handler = self.handler(resource_type)?;
        let api = self.api().await?;

        if let Err(e) = handler.delete(api.as_ref(), current_state.clone()).await {
            error!(error = %e, "Delete failed");
            return Err(e);
        }

        let runner = self.delete_verification.read().await.clone();
        if let Some(runner) = runner {
            self.verify_deleted(handler, api.as_ref(), &runner, &current_state)
                .await
                .map_err(|e| {
                    error!(error = %e, "Delete verification failed");
                    e
                })?;
        }
        info!("Delete completed successfully");
        Ok(())
    }

    #[instrument(skip(self), name = "provider.import_resource")]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.handler(resource_type)?;
        let api = self.api().await?;
        let state = handler.import(api.as_ref(), id).await?;
        info!("ImportResourceState completed successfully");
        Ok(vec![ImportedResource::new(resource_type, state)])
    }
}
