//! Resource handlers.
//!
//! Each handler translates resource state (a JSON object) into API calls and
//! maps responses back into state. API errors are translated with
//! [`ProviderError::from_api`], so a 404 surfaces as
//! [`ProviderError::NotFound`], which the host treats as "remove from state".

pub mod cloud_configuration_rule;
pub mod integration_azure;
pub mod sensitive_data_scanner_rule;
pub mod state;

use serde_json::{json, Value};

use crate::client::DatadogApi;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

pub use cloud_configuration_rule::CloudConfigurationRule;
pub use integration_azure::IntegrationAzure;
pub use sensitive_data_scanner_rule::SensitiveDataScannerRule;

/// CRUD translation for one resource type.
#[async_trait::async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The resource type name, e.g. `datadog_integration_azure`.
    fn type_name(&self) -> &'static str;

    /// Check a resource configuration before it is applied.
    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let _ = config;
        vec![]
    }

    /// Create the remote object and return the resulting state.
    async fn create(&self, api: &dyn DatadogApi, planned_state: Value)
        -> Result<Value, ProviderError>;

    /// Refresh state from the remote object.
    async fn read(&self, api: &dyn DatadogApi, current_state: Value)
        -> Result<Value, ProviderError>;

    /// Apply planned changes and return the resulting state.
    async fn update(
        &self,
        api: &dyn DatadogApi,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, api: &dyn DatadogApi, current_state: Value)
        -> Result<(), ProviderError>;

    /// Import an existing object by ID. Defaults to reading `{"id": id}`.
    async fn import(&self, api: &dyn DatadogApi, id: &str) -> Result<Value, ProviderError> {
        self.read(api, json!({ "id": id })).await
    }
}

/// All handlers shipped with the provider.
pub fn all() -> Vec<Box<dyn ResourceHandler>> {
    vec![
        Box::new(IntegrationAzure::new()),
        Box::new(SensitiveDataScannerRule),
        Box::new(CloudConfigurationRule),
    ]
}
