//! In-memory stand-in for the Datadog API.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use serde_json::json;

use crate::client::models::{
    AzureAccount, ScannerConfigResponse, ScannerIncludedItem, ScannerMeta, ScanningRuleAttributes,
    ScanningRuleData, ScanningRuleDeleteRequest, ScanningRuleRelationships, ScanningRuleRequest,
    ScanningRuleResponse, SecurityMonitoringRule, SCANNING_RULE_TYPE,
};
use crate::client::{ApiResult, DatadogApi};
use crate::error::ApiError;

/// A [`DatadogApi`] backed by process memory.
///
/// Behaves like the real service where the handlers care: unknown objects
/// answer 404, the scanner configuration version is bumped by every write and
/// a stale version is rejected with 409. With a delete lag, deleted objects
/// keep being returned by reads for a while, the way the real API does.
#[derive(Debug, Default)]
pub struct InMemoryApi {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    azure: Vec<AzureAccount>,
    scanner_rules: BTreeMap<String, StoredScanningRule>,
    scanner_version: i64,
    security_rules: BTreeMap<String, SecurityMonitoringRule>,
    next_id: u64,

    delete_lag: u32,
    /// Deleted objects still visible, with the reads left before they vanish.
    lingering: HashMap<ObjectKey, u32>,

    calls: u64,
    failures: VecDeque<ApiError>,
    scheduled: Vec<(u64, ApiError)>,
}

#[derive(Debug, Clone)]
struct StoredScanningRule {
    attributes: ScanningRuleAttributes,
    group_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ObjectKey {
    Azure(String, String),
    ScanningRule(String),
    SecurityRule(String),
}

fn not_found() -> ApiError {
    ApiError::status(404, "Not Found", Some(r#"{"errors":["Not found"]}"#.into()))
}

fn conflict(message: &str) -> ApiError {
    ApiError::status(409, "Conflict", Some(json!({ "errors": [message] }).to_string()))
}

fn bad_request(message: &str) -> ApiError {
    ApiError::status(400, "Bad Request", Some(json!({ "errors": [message] }).to_string()))
}

impl State {
    /// Count a call and return the failure injected for it, if any.
    fn take_failure(&mut self) -> ApiResult<()> {
        let call = self.calls;
        self.calls += 1;
        if let Some(pos) = self.scheduled.iter().position(|(at, _)| *at == call) {
            return Err(self.scheduled.remove(pos).1);
        }
        match self.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn is_lingering(&self, key: &ObjectKey) -> bool {
        self.lingering.contains_key(key)
    }

    /// Mark an object deleted. Returns true if it should be dropped now.
    fn begin_delete(&mut self, key: ObjectKey) -> bool {
        if self.delete_lag == 0 {
            return true;
        }
        self.lingering.insert(key, self.delete_lag);
        false
    }

    /// Account for one read: every lingering object loses a read.
    fn tick(&mut self) {
        let expired: Vec<ObjectKey> = self
            .lingering
            .iter_mut()
            .filter_map(|(key, left)| {
                *left = left.saturating_sub(1);
                (*left == 0).then(|| key.clone())
            })
            .collect();

        for key in expired {
            self.lingering.remove(&key);
            match key {
                ObjectKey::Azure(tenant, client) => {
                    self.azure.retain(|a| !a.matches(&tenant, &client));
                }
                ObjectKey::ScanningRule(id) => {
                    self.scanner_rules.remove(&id);
                }
                ObjectKey::SecurityRule(id) => {
                    self.security_rules.remove(&id);
                }
            }
        }
    }

    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn check_version(&self, meta: &ScannerMeta) -> ApiResult<()> {
        match meta.version {
            Some(v) if v != self.scanner_version => Err(conflict(&format!(
                "version {} is stale, current version is {}",
                v, self.scanner_version
            ))),
            _ => Ok(()),
        }
    }

    fn live_scanning_rule(&self, id: &str) -> ApiResult<&StoredScanningRule> {
        if self.is_lingering(&ObjectKey::ScanningRule(id.to_string())) {
            return Err(not_found());
        }
        self.scanner_rules.get(id).ok_or_else(not_found)
    }

    fn live_security_rule(&self, id: &str) -> ApiResult<()> {
        if self.is_lingering(&ObjectKey::SecurityRule(id.to_string())) {
            return Err(not_found());
        }
        self.security_rules
            .contains_key(id)
            .then_some(())
            .ok_or_else(not_found)
    }

    fn live_azure_index(&self, tenant: &str, client: &str) -> Option<usize> {
        let key = ObjectKey::Azure(tenant.to_string(), client.to_string());
        if self.is_lingering(&key) {
            return None;
        }
        self.azure.iter().position(|a| a.matches(tenant, client))
    }
}

impl InMemoryApi {
    /// An empty API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep deleted objects visible to the next `reads` read calls.
    pub fn with_delete_lag(self, reads: u32) -> Self {
        self.lock().delete_lag = reads;
        self
    }

    /// Fail the next call that has not been assigned a failure yet.
    pub fn fail_next(&self, err: ApiError) {
        self.lock().failures.push_back(err);
    }

    /// Let `calls` calls through, then fail the one after.
    pub fn fail_after(&self, calls: u64, err: ApiError) {
        let mut state = self.lock();
        let at = state.calls + calls;
        state.scheduled.push((at, err));
    }

    /// Number of API calls served so far, failed ones included.
    pub fn call_count(&self) -> u64 {
        self.lock().calls
    }

    /// Stored Azure accounts, lingering ones excluded.
    pub fn azure_accounts(&self) -> Vec<AzureAccount> {
        let state = self.lock();
        state
            .azure
            .iter()
            .filter(|a| {
                let key = ObjectKey::Azure(
                    a.tenant_name.clone().unwrap_or_default(),
                    a.client_id.clone().unwrap_or_default(),
                );
                !state.is_lingering(&key)
            })
            .cloned()
            .collect()
    }

    /// Seed an Azure account directly.
    pub fn insert_azure_account(&self, account: AzureAccount) {
        self.lock().azure.push(account);
    }

    /// Current scanner configuration version.
    pub fn scanner_version(&self) -> i64 {
        self.lock().scanner_version
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic while holding the lock can only come from a failing test.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait::async_trait]
impl DatadogApi for InMemoryApi {
    async fn list_azure_integrations(&self) -> ApiResult<Vec<AzureAccount>> {
        let mut state = self.lock();
        state.take_failure()?;
        let accounts = state
            .azure
            .iter()
            .map(|a| AzureAccount {
                client_secret: None,
                ..a.clone()
            })
            .collect();
        state.tick();
        Ok(accounts)
    }

    async fn create_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        let mut state = self.lock();
        state.take_failure()?;
        let (Some(tenant), Some(client)) = (&account.tenant_name, &account.client_id) else {
            return Err(bad_request("tenant_name and client_id are required"));
        };
        if state.azure.iter().any(|a| a.matches(tenant, client)) {
            return Err(conflict("Azure integration already exists"));
        }
        state.azure.push(account.clone());
        Ok(())
    }

    async fn update_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        let mut state = self.lock();
        state.take_failure()?;
        let tenant = account.tenant_name.as_deref().unwrap_or_default();
        let client = account.client_id.as_deref().unwrap_or_default();
        let index = state
            .live_azure_index(tenant, client)
            .ok_or_else(not_found)?;

        let stored = &mut state.azure[index];
        if let Some(new_tenant) = &account.new_tenant_name {
            stored.tenant_name = Some(new_tenant.clone());
        }
        if let Some(new_client) = &account.new_client_id {
            stored.client_id = Some(new_client.clone());
        }
        if account.client_secret.is_some() {
            stored.client_secret = account.client_secret.clone();
        }
        stored.host_filters = account.host_filters.clone();
        stored.automute = account.automute;
        Ok(())
    }

    async fn delete_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        let mut state = self.lock();
        state.take_failure()?;
        let tenant = account.tenant_name.clone().unwrap_or_default();
        let client = account.client_id.clone().unwrap_or_default();
        let index = state
            .live_azure_index(&tenant, &client)
            .ok_or_else(not_found)?;

        if state.begin_delete(ObjectKey::Azure(tenant, client)) {
            state.azure.remove(index);
        }
        Ok(())
    }

    async fn list_scanning_groups(&self) -> ApiResult<ScannerConfigResponse> {
        let mut state = self.lock();
        state.take_failure()?;
        let mut included = Vec::with_capacity(state.scanner_rules.len());
        for (id, rule) in &state.scanner_rules {
            included.push(ScannerIncludedItem {
                id: id.clone(),
                kind: SCANNING_RULE_TYPE.to_string(),
                attributes: serde_json::to_value(&rule.attributes)
                    .map_err(|e| ApiError::transport(e.to_string()))?,
                relationships: Some(ScanningRuleRelationships::group(rule.group_id.clone())),
            });
        }
        let response = ScannerConfigResponse {
            data: json!({"id": "config", "type": "sensitive_data_scanner_configuration"}),
            included,
            meta: ScannerMeta {
                version: Some(state.scanner_version),
            },
        };
        state.tick();
        Ok(response)
    }

    async fn create_scanning_rule(
        &self,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse> {
        let mut state = self.lock();
        state.take_failure()?;
        let group_id = request
            .data
            .relationships
            .as_ref()
            .and_then(|r| r.group_id())
            .ok_or_else(|| bad_request("a scanning group relationship is required"))?
            .to_string();

        let id = state.next_id("rule");
        state.scanner_rules.insert(
            id.clone(),
            StoredScanningRule {
                attributes: request.data.attributes.clone(),
                group_id: group_id.clone(),
            },
        );
        state.scanner_version += 1;

        Ok(ScanningRuleResponse {
            data: ScanningRuleData {
                id: Some(id),
                kind: SCANNING_RULE_TYPE.to_string(),
                attributes: request.data.attributes.clone(),
                relationships: Some(ScanningRuleRelationships::group(group_id)),
            },
            meta: ScannerMeta {
                version: Some(state.scanner_version),
            },
        })
    }

    async fn update_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse> {
        let mut state = self.lock();
        state.take_failure()?;
        let group_id = state.live_scanning_rule(id)?.group_id.clone();
        state.check_version(&request.meta)?;

        state.scanner_rules.insert(
            id.to_string(),
            StoredScanningRule {
                attributes: request.data.attributes.clone(),
                group_id: group_id.clone(),
            },
        );
        state.scanner_version += 1;

        Ok(ScanningRuleResponse {
            data: ScanningRuleData {
                id: Some(id.to_string()),
                kind: SCANNING_RULE_TYPE.to_string(),
                attributes: request.data.attributes.clone(),
                relationships: Some(ScanningRuleRelationships::group(group_id)),
            },
            meta: ScannerMeta {
                version: Some(state.scanner_version),
            },
        })
    }

    async fn delete_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleDeleteRequest,
    ) -> ApiResult<()> {
        let mut state = self.lock();
        state.take_failure()?;
        state.live_scanning_rule(id)?;
        state.check_version(&request.meta)?;

        if state.begin_delete(ObjectKey::ScanningRule(id.to_string())) {
            state.scanner_rules.remove(id);
        }
        state.scanner_version += 1;
        Ok(())
    }

    async fn get_security_monitoring_rule(&self, id: &str) -> ApiResult<SecurityMonitoringRule> {
        let mut state = self.lock();
        state.take_failure()?;
        let rule = state.security_rules.get(id).cloned().ok_or_else(not_found)?;
        state.tick();
        Ok(rule)
    }

    async fn create_security_monitoring_rule(
        &self,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule> {
        let mut state = self.lock();
        state.take_failure()?;
        let id = state.next_id("sec");
        let stored = SecurityMonitoringRule {
            id: Some(id.clone()),
            ..rule.clone()
        };
        state.security_rules.insert(id, stored.clone());
        Ok(stored)
    }

    async fn update_security_monitoring_rule(
        &self,
        id: &str,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule> {
        let mut state = self.lock();
        state.take_failure()?;
        state.live_security_rule(id)?;
        let stored = SecurityMonitoringRule {
            id: Some(id.to_string()),
            ..rule.clone()
        };
        state.security_rules.insert(id.to_string(), stored.clone());
        Ok(stored)
    }

    async fn delete_security_monitoring_rule(&self, id: &str) -> ApiResult<()> {
        let mut state = self.lock();
        state.take_failure()?;
        state.live_security_rule(id)?;
        if state.begin_delete(ObjectKey::SecurityRule(id.to_string())) {
            state.security_rules.remove(id);
        }
        Ok(())
    }
}
