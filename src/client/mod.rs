//! Datadog API client.
//!
//! Resource handlers talk to Datadog only through the [`DatadogApi`] trait.
//! [`HttpClient`] is the production implementation; tests use
//! [`crate::testing::InMemoryApi`].

pub mod http;
pub mod models;

pub use http::HttpClient;

use crate::error::ApiError;
use models::{
    AzureAccount, ScannerConfigResponse, ScanningRuleDeleteRequest, ScanningRuleRequest,
    ScanningRuleResponse, SecurityMonitoringRule,
};

/// Result of an API call.
pub type ApiResult<T> = Result<T, ApiError>;

/// The subset of the Datadog API used by the resource handlers.
#[async_trait::async_trait]
pub trait DatadogApi: Send + Sync {
    // =========================================================================
    // Azure integration
    // =========================================================================

    /// List all Azure integrations.
    async fn list_azure_integrations(&self) -> ApiResult<Vec<AzureAccount>>;

    /// Create an Azure integration.
    async fn create_azure_integration(&self, account: &AzureAccount) -> ApiResult<()>;

    /// Update an Azure integration, keyed by its current tenant and client.
    async fn update_azure_integration(&self, account: &AzureAccount) -> ApiResult<()>;

    /// Delete an Azure integration.
    async fn delete_azure_integration(&self, account: &AzureAccount) -> ApiResult<()>;

    // =========================================================================
    // Sensitive data scanner
    // =========================================================================

    /// Fetch the scanner configuration with all groups and rules.
    async fn list_scanning_groups(&self) -> ApiResult<ScannerConfigResponse>;

    /// Create a scanning rule.
    async fn create_scanning_rule(
        &self,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse>;

    /// Update a scanning rule.
    async fn update_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse>;

    /// Delete a scanning rule.
    async fn delete_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleDeleteRequest,
    ) -> ApiResult<()>;

    // =========================================================================
    // Security monitoring
    // =========================================================================

    /// Fetch a security monitoring rule.
    async fn get_security_monitoring_rule(&self, id: &str) -> ApiResult<SecurityMonitoringRule>;

    /// Create a security monitoring rule.
    async fn create_security_monitoring_rule(
        &self,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule>;

    /// Replace a security monitoring rule.
    async fn update_security_monitoring_rule(
        &self,
        id: &str,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule>;

    /// Delete a security monitoring rule.
    async fn delete_security_monitoring_rule(&self, id: &str) -> ApiResult<()>;
}
