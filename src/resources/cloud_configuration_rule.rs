//! `datadog_cloud_configuration_rule`: a cloud configuration (CSPM) rule.
//!
//! Stored by the API as a security monitoring rule of type
//! `cloud_configuration`. The flat resource attributes map onto it as:
//!
//! | attribute                | API field                                          |
//! |--------------------------|----------------------------------------------------|
//! | `enabled`                | `isEnabled`                                        |
//! | `policy`                 | `options.complianceRuleOptions.regoRule.policy`    |
//! | `resource_type`          | `options.complianceRuleOptions.resourceType`       |
//! | `related_resource_types` | `regoRule.resourceTypes` after the main type       |
//! | `severity`               | `cases[0].status`                                  |
//! | `notifications`          | `cases[0].notifications`                           |
//! | `group_by`               | `complianceSignalOptions.userGroupByFields`        |

use serde_json::{Map, Value};
use tracing::debug;

use super::state;
use super::ResourceHandler;
use crate::client::models::{
    ComplianceRuleOptions, ComplianceSignalOptions, RegoRule, RuleCase, RuleOptions,
    SecurityMonitoringRule, CLOUD_CONFIGURATION_RULE_TYPE,
};
use crate::client::DatadogApi;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

/// Resource type name.
pub const TYPE_NAME: &str = "datadog_cloud_configuration_rule";

/// Accepted severities.
pub const SEVERITIES: [&str; 5] = ["info", "low", "medium", "high", "critical"];

const REQUIRED: [&str; 6] = [
    "enabled",
    "message",
    "name",
    "policy",
    "resource_type",
    "severity",
];

/// Handler for cloud configuration rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct CloudConfigurationRule;

fn build_rule(config: &Value) -> Result<SecurityMonitoringRule, ProviderError> {
    let resource_type = state::required_string(config, "resource_type")?;
    let severity = state::required_string(config, "severity")?;
    if !SEVERITIES.contains(&severity.as_str()) {
        return Err(ProviderError::Validation(format!(
            "invalid severity '{}', expected one of: {}",
            severity,
            SEVERITIES.join(", ")
        )));
    }

    let related = state::string_list(config, "related_resource_types");
    let group_by = state::string_list(config, "group_by");

    let mut resource_types = Vec::with_capacity(related.len() + 1);
    resource_types.push(resource_type.clone());
    resource_types.extend(related.iter().cloned());

    Ok(SecurityMonitoringRule {
        id: None,
        rule_type: Some(CLOUD_CONFIGURATION_RULE_TYPE.to_string()),
        name: state::required_string(config, "name")?,
        message: state::required_string(config, "message")?,
        is_enabled: state::boolean(config, "enabled").unwrap_or(false),
        tags: state::string_list(config, "tags"),
        cases: vec![RuleCase {
            status: severity,
            notifications: state::string_list(config, "notifications"),
        }],
        options: RuleOptions {
            compliance_rule_options: Some(ComplianceRuleOptions {
                resource_type: Some(resource_type),
                complex_rule: Some(!related.is_empty()),
                rego_rule: Some(RegoRule {
                    policy: state::required_string(config, "policy")?,
                    resource_types,
                }),
            }),
        },
        compliance_signal_options: Some(ComplianceSignalOptions {
            user_activation_status: Some(!group_by.is_empty()),
            user_group_by_fields: Some(group_by),
        }),
    })
}

fn apply_rule(map: &mut Map<String, Value>, rule: SecurityMonitoringRule) {
    map.insert("enabled".into(), rule.is_enabled.into());
    map.insert("message".into(), rule.message.into());
    map.insert("name".into(), rule.name.into());
    map.insert("tags".into(), rule.tags.into());

    let case = rule.cases.into_iter().next().unwrap_or_default();
    map.insert("severity".into(), case.status.into());
    map.insert("notifications".into(), case.notifications.into());

    let options = rule.options.compliance_rule_options.unwrap_or_default();
    let rego = options.rego_rule.unwrap_or_default();
    let related: Vec<String> = rego
        .resource_types
        .into_iter()
        .filter(|t| Some(t.as_str()) != options.resource_type.as_deref())
        .collect();
    state::set_opt(map, "resource_type", options.resource_type);
    map.insert("policy".into(), rego.policy.into());
    map.insert("related_resource_types".into(), related.into());

    let group_by = rule
        .compliance_signal_options
        .and_then(|o| o.user_group_by_fields)
        .unwrap_or_default();
    map.insert("group_by".into(), group_by.into());
}

#[async_trait::async_trait]
impl ResourceHandler for CloudConfigurationRule {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        state::check_required(config, &REQUIRED, &mut diagnostics);
        if let Some(severity) = state::string(config, "severity") {
            if !SEVERITIES.contains(&severity.as_str()) {
                diagnostics.push(
                    Diagnostic::error(format!("Invalid severity '{}'", severity))
                        .with_detail(format!("expected one of: {}", SEVERITIES.join(", ")))
                        .with_attribute("severity"),
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
        let rule = build_rule(&planned_state)?;

        let created = api
            .create_security_monitoring_rule(&rule)
            .await
            .map_err(|e| ProviderError::from_api("error creating security monitoring rule", e))?;

        let id = created.id.clone().ok_or_else(|| {
            ProviderError::Sdk("security monitoring rule response is missing an id".into())
        })?;
        debug!(id = %id, "created cloud configuration rule");

        let map = state::object_mut(&mut planned_state)?;
        map.insert("id".into(), id.into());
        apply_rule(map, created);
        Ok(planned_state)
    }

    async fn read(
        &self,
        api: &dyn DatadogApi,
        mut current_state: Value,
    ) -> Result<Value, ProviderError> {
        let id = state::id(&current_state)?;

        let rule = api.get_security_monitoring_rule(&id).await.map_err(|e| {
            ProviderError::from_api("error retrieving security monitoring rule", e)
        })?;

        apply_rule(state::object_mut(&mut current_state)?, rule);
        Ok(current_state)
    }

    async fn update(
        &self,
        api: &dyn DatadogApi,
        prior_state: Value,
        mut planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let id = state::id(&prior_state)?;
        let rule = build_rule(&planned_state)?;

        let updated = api
            .update_security_monitoring_rule(&id, &rule)
            .await
            .map_err(|e| ProviderError::from_api("error updating security monitoring rule", e))?;

        let map = state::object_mut(&mut planned_state)?;
        map.insert("id".into(), id.into());
        apply_rule(map, updated);
        Ok(planned_state)
    }

    async fn delete(
        &self,
        api: &dyn DatadogApi,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let id = state::id(&current_state)?;
        api.delete_security_monitoring_rule(&id)
            .await
            .map_err(|e| ProviderError::from_api("error deleting security monitoring rule", e))
    }
}
