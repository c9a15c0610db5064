//! `datadog_integration_azure`: a Microsoft Azure integration account.
//!
//! The resource ID is `<tenant_name>:<client_id>`. The Azure integration
//! endpoints reject concurrent writes, so create, update and delete are
//! serialized through a handler-wide lock.

use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

use super::state;
use super::ResourceHandler;
use crate::client::models::AzureAccount;
use crate::client::DatadogApi;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

/// Resource type name.
pub const TYPE_NAME: &str = "datadog_integration_azure";

/// Handler for Azure integration accounts.
#[derive(Debug, Default)]
pub struct IntegrationAzure {
    write_lock: Mutex<()>,
}

impl IntegrationAzure {
    /// Create the handler.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Split a `<tenant_name>:<client_id>` resource ID.
pub fn tenant_and_client_from_id(id: &str) -> Result<(String, String), ProviderError> {
    match id.split(':').collect::<Vec<_>>().as_slice() {
        [tenant, client] if !tenant.is_empty() && !client.is_empty() => {
            Ok((tenant.to_string(), client.to_string()))
        }
        _ => Err(ProviderError::Validation(format!(
            "error extracting tenant name and client ID from an Azure integration id: {}",
            id
        ))),
    }
}

fn resource_id(tenant_name: &str, client_id: &str) -> String {
    format!("{}:{}", tenant_name, client_id)
}

/// Build the API payload. On update the configured tenant and client become
/// the `new_*` fields while the existing ones key the request.
fn build_account(state: &Value, tenant_name: &str, client_id: &str, update: bool) -> AzureAccount {
    let mut account = AzureAccount {
        tenant_name: Some(tenant_name.to_string()),
        client_id: Some(client_id.to_string()),
        client_secret: state::string(state, "client_secret"),
        host_filters: Some(state::string(state, "host_filters").unwrap_or_default()),
        automute: Some(state::boolean(state, "automute").unwrap_or(false)),
        ..Default::default()
    };
    if update {
        account.new_tenant_name = state::string(state, "tenant_name");
        account.new_client_id = state::string(state, "client_id");
    }
    account
}

#[async_trait::async_trait]
impl ResourceHandler for IntegrationAzure {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        state::check_required(
            config,
            &["tenant_name", "client_id", "client_secret"],
            &mut diagnostics,
        );
        if let Some(filters) = state::string(config, "host_filters") {
            if filters.split(',').any(|f| !f.trim().contains(':')) {
                diagnostics.push(
                    Diagnostic::error("Invalid host filter")
                        .with_detail("host_filters must be of the form key:value,key:value")
                        .with_attribute("host_filters"),
                );
            }
        }
        diagnostics
    }

    async fn create(
        &self,
        api: &dyn DatadogApi,
        mut planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let _guard = self.write_lock.lock().await;

        let tenant_name = state::required_string(&planned_state, "tenant_name")?;
        let client_id = state::required_string(&planned_state, "client_id")?;
        let account = build_account(&planned_state, &tenant_name, &client_id, false);

        api.create_azure_integration(&account)
            .await
            .map_err(|e| ProviderError::from_api("error creating an Azure integration", e))?;

        let id = resource_id(&tenant_name, &client_id);
        debug!(id = %id, "created Azure integration");
        state::object_mut(&mut planned_state)?.insert("id".into(), id.into());
        self.read(api, planned_state).await
    }

    async fn read(
        &self,
        api: &dyn DatadogApi,
        mut current_state: Value,
    ) -> Result<Value, ProviderError> {
        let (tenant_name, client_id) = tenant_and_client_from_id(&state::id(&current_state)?)?;

        let integrations = api
            .list_azure_integrations()
            .await
            .map_err(|e| ProviderError::from_api("error listing azure integration", e))?;

        let integration = integrations
            .iter()
            .find(|i| i.matches(&tenant_name, &client_id))
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "error getting an Azure integration: tenant_name={}",
                    tenant_name
                ))
            })?;

        let map = state::object_mut(&mut current_state)?;
        map.insert("tenant_name".into(), tenant_name.into());
        map.insert("client_id".into(), client_id.into());
        map.insert(
            "automute".into(),
            integration.automute.unwrap_or(false).into(),
        );
        if let Some(filters) = &integration.host_filters {
            map.insert("host_filters".into(), filters.clone().into());
        }
        Ok(current_state)
    }

    async fn update(
        &self,
        api: &dyn DatadogApi,
        prior_state: Value,
        mut planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let _guard = self.write_lock.lock().await;

        let (tenant_name, client_id) = tenant_and_client_from_id(&state::id(&prior_state)?)?;
        let account = build_account(&planned_state, &tenant_name, &client_id, true);

        api.update_azure_integration(&account)
            .await
            .map_err(|e| ProviderError::from_api("error updating an Azure integration", e))?;

        let id = resource_id(
            account.new_tenant_name.as_deref().unwrap_or(&tenant_name),
            account.new_client_id.as_deref().unwrap_or(&client_id),
        );
        debug!(id = %id, "updated Azure integration");
        state::object_mut(&mut planned_state)?.insert("id".into(), id.into());
        self.read(api, planned_state).await
    }

    async fn delete(
        &self,
        api: &dyn DatadogApi,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let _guard = self.write_lock.lock().await;

        let (tenant_name, client_id) = tenant_and_client_from_id(&state::id(&current_state)?)?;
        let account = build_account(&current_state, &tenant_name, &client_id, false);

        api.delete_azure_integration(&account)
            .await
            .map_err(|e| ProviderError::from_api("error deleting an Azure integration", e))
    }
}
