//! Wire models for the subset of the Datadog API the resources use.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// =========================================================================
// Azure integration (v1)
// =========================================================================

/// An Azure account linked to Datadog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AzureAccount {
    /// Azure Active Directory ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_name: Option<String>,
    /// Azure web application ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    /// Azure web application secret key. Never returned by the API.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
    /// Comma separated `key:value` host tag filters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host_filters: Option<String>,
    /// Silence monitors for expected VM shutdowns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub automute: Option<bool>,
    /// Replacement tenant name on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_tenant_name: Option<String>,
    /// Replacement client ID on update.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_client_id: Option<String>,
}

impl AzureAccount {
    /// Whether this account is keyed by the given tenant and client.
    pub fn matches(&self, tenant_name: &str, client_id: &str) -> bool {
        self.tenant_name.as_deref() == Some(tenant_name)
            && self.client_id.as_deref() == Some(client_id)
    }
}

// =========================================================================
// Sensitive data scanner (v2)
// =========================================================================

/// JSON:API type of scanning rules.
pub const SCANNING_RULE_TYPE: &str = "sensitive_data_scanner_rule";

/// JSON:API type of scanning groups.
pub const SCANNING_GROUP_TYPE: &str = "sensitive_data_scanner_group";

/// How matched data is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextReplacementType {
    /// Leave the data untouched.
    None,
    /// Replace with a hash.
    Hash,
    /// Replace with a fixed string.
    ReplacementString,
    /// Replace the first `number_of_chars` characters.
    PartialReplacementFromBeginning,
    /// Replace the last `number_of_chars` characters.
    PartialReplacementFromEnd,
}

impl TextReplacementType {
    /// All accepted values, in API spelling.
    pub const VALUES: [&'static str; 5] = [
        "none",
        "hash",
        "replacement_string",
        "partial_replacement_from_beginning",
        "partial_replacement_from_end",
    ];

    /// The API spelling of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Hash => "hash",
            Self::ReplacementString => "replacement_string",
            Self::PartialReplacementFromBeginning => "partial_replacement_from_beginning",
            Self::PartialReplacementFromEnd => "partial_replacement_from_end",
        }
    }

    /// Whether `number_of_chars` is meaningful for this type.
    pub fn is_partial(&self) -> bool {
        matches!(
            self,
            Self::PartialReplacementFromBeginning | Self::PartialReplacementFromEnd
        )
    }
}

impl FromStr for TextReplacementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(Self::None),
            "hash" => Ok(Self::Hash),
            "replacement_string" => Ok(Self::ReplacementString),
            "partial_replacement_from_beginning" => Ok(Self::PartialReplacementFromBeginning),
            "partial_replacement_from_end" => Ok(Self::PartialReplacementFromEnd),
            other => Err(format!(
                "invalid text replacement type '{}', expected one of: {}",
                other,
                Self::VALUES.join(", ")
            )),
        }
    }
}

/// Replacement applied to scanned events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextReplacement {
    /// Characters to replace for the partial replacement types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub number_of_chars: Option<i64>,
    /// Replacement text for the `replacement_string` type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replacement_string: Option<String>,
    /// Replacement strategy.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub replacement_type: Option<TextReplacementType>,
}

/// Attributes of a scanning rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleAttributes {
    /// Description of the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Attributes excluded from the scan.
    #[serde(default)]
    pub excluded_attributes: Vec<String>,
    /// Whether the rule is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_enabled: Option<bool>,
    /// Name of the rule.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Regex pattern; absent when a standard pattern is referenced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Tags attached to matches.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Replacement applied to matches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text_replacement: Option<TextReplacement>,
}

/// A JSON:API resource identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRef {
    /// Resource ID.
    pub id: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub kind: String,
}

/// A to-one relationship.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipToOne {
    /// Related resource, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ResourceRef>,
}

/// Relationships of a scanning rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleRelationships {
    /// The group the rule belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<RelationshipToOne>,
}

impl ScanningRuleRelationships {
    /// Relationships pointing at the given group.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self {
            group: Some(RelationshipToOne {
                data: Some(ResourceRef {
                    id: group_id.into(),
                    kind: SCANNING_GROUP_TYPE.to_string(),
                }),
            }),
        }
    }

    /// The group ID, if set.
    pub fn group_id(&self) -> Option<&str> {
        self.group
            .as_ref()
            .and_then(|g| g.data.as_ref())
            .map(|d| d.id.as_str())
    }
}

/// A scanning rule document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleData {
    /// Rule ID; absent on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Always [`SCANNING_RULE_TYPE`].
    #[serde(rename = "type")]
    pub kind: String,
    /// Rule attributes.
    pub attributes: ScanningRuleAttributes,
    /// Rule relationships.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relationships: Option<ScanningRuleRelationships>,
}

/// Optimistic-concurrency version of the scanner configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannerMeta {
    /// Configuration version.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
}

/// Body of create and update calls for scanning rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleRequest {
    /// The rule.
    pub data: ScanningRuleData,
    /// Version metadata.
    #[serde(default)]
    pub meta: ScannerMeta,
}

/// Response of create and update calls for scanning rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleResponse {
    /// The stored rule.
    pub data: ScanningRuleData,
    /// Version metadata.
    #[serde(default)]
    pub meta: ScannerMeta,
}

/// Body of a scanning rule delete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanningRuleDeleteRequest {
    /// Version metadata.
    pub meta: ScannerMeta,
}

/// An entry of the `included` array of the scanner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScannerIncludedItem {
    /// Item ID.
    pub id: String,
    /// Item type (group or rule).
    #[serde(rename = "type")]
    pub kind: String,
    /// Raw attributes; shape depends on `kind`.
    #[serde(default)]
    pub attributes: Value,
    /// Relationships of the item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relationships: Option<ScanningRuleRelationships>,
}

/// Full scanner configuration as returned by "list scanning groups".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScannerConfigResponse {
    /// Configuration document.
    #[serde(default)]
    pub data: Value,
    /// Groups and rules.
    #[serde(default)]
    pub included: Vec<ScannerIncludedItem>,
    /// Version metadata.
    #[serde(default)]
    pub meta: ScannerMeta,
}

impl ScannerConfigResponse {
    /// Find a rule by ID among the included items.
    pub fn find_rule(&self, id: &str) -> Option<&ScannerIncludedItem> {
        self.included
            .iter()
            .find(|item| item.kind == SCANNING_RULE_TYPE && item.id == id)
    }
}

// =========================================================================
// Security monitoring (v2)
// =========================================================================

/// Rule type used for cloud configuration rules.
pub const CLOUD_CONFIGURATION_RULE_TYPE: &str = "cloud_configuration";

/// A rule case: the severity and who to notify.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleCase {
    /// Severity of signals produced by this case.
    pub status: String,
    /// Notification targets.
    #[serde(default)]
    pub notifications: Vec<String>,
}

/// Rego policy evaluated by a cloud configuration rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegoRule {
    /// Policy source.
    pub policy: String,
    /// Main resource type followed by related types.
    #[serde(default)]
    pub resource_types: Vec<String>,
}

/// Compliance options of a cloud configuration rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceRuleOptions {
    /// Main resource type.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,
    /// Whether the rule spans several resource types.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub complex_rule: Option<bool>,
    /// The policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rego_rule: Option<RegoRule>,
}

/// Rule options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleOptions {
    /// Compliance options.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_rule_options: Option<ComplianceRuleOptions>,
}

/// Signal grouping options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceSignalOptions {
    /// Whether the user-provided grouping applies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_activation_status: Option<bool>,
    /// Fields to group signals by.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_group_by_fields: Option<Vec<String>>,
}

/// A security monitoring rule, used both as request body and response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityMonitoringRule {
    /// Rule ID; absent on create.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Rule type.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub rule_type: Option<String>,
    /// Rule name.
    pub name: String,
    /// Message attached to signals.
    pub message: String,
    /// Whether the rule is enabled.
    pub is_enabled: bool,
    /// Rule tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Rule cases.
    #[serde(default)]
    pub cases: Vec<RuleCase>,
    /// Rule options.
    #[serde(default)]
    pub options: RuleOptions,
    /// Signal grouping.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance_signal_options: Option<ComplianceSignalOptions>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_azure_account_skips_unset_fields() {
        let account = AzureAccount {
            tenant_name: Some("tenant".into()),
            client_id: Some("client".into()),
            automute: Some(false),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&account).unwrap(),
            json!({"tenant_name": "tenant", "client_id": "client", "automute": false})
        );
        assert!(account.matches("tenant", "client"));
        assert!(!account.matches("tenant", "other"));
    }

    #[test]
    fn test_text_replacement_type_parsing() {
        assert_eq!(
            "partial_replacement_from_end".parse::<TextReplacementType>(),
            Ok(TextReplacementType::PartialReplacementFromEnd)
        );
        let err = "redact".parse::<TextReplacementType>().unwrap_err();
        assert!(err.contains("invalid text replacement type 'redact'"));

        for value in TextReplacementType::VALUES {
            let parsed: TextReplacementType = value.parse().unwrap();
            assert_eq!(parsed.as_str(), value);
        }
    }

    #[test]
    fn test_scanner_config_finds_rule() {
        let config: ScannerConfigResponse = serde_json::from_value(json!({
            "data": {"id": "config", "type": "sensitive_data_scanner_configuration"},
            "included": [
                {"id": "g1", "type": "sensitive_data_scanner_group", "attributes": {"name": "group"}},
                {"id": "r1", "type": "sensitive_data_scanner_rule", "attributes": {"name": "rule"},
                 "relationships": {"group": {"data": {"id": "g1", "type": "sensitive_data_scanner_group"}}}}
            ],
            "meta": {"version": 7}
        }))
        .unwrap();

        assert_eq!(config.meta.version, Some(7));
        let rule = config.find_rule("r1").unwrap();
        assert_eq!(rule.relationships.as_ref().unwrap().group_id(), Some("g1"));
        assert!(config.find_rule("g1").is_none());
    }

    #[test]
    fn test_security_rule_uses_camel_case() {
        let rule = SecurityMonitoringRule {
            rule_type: Some(CLOUD_CONFIGURATION_RULE_TYPE.into()),
            name: "rule".into(),
            message: "msg".into(),
            is_enabled: true,
            options: RuleOptions {
                compliance_rule_options: Some(ComplianceRuleOptions {
                    resource_type: Some("gcp_compute_instance".into()),
                    complex_rule: Some(false),
                    rego_rule: Some(RegoRule {
                        policy: "package datadog".into(),
                        resource_types: vec!["gcp_compute_instance".into()],
                    }),
                }),
            },
            ..Default::default()
        };

        let json = serde_json::to_value(&rule).unwrap();
        assert_eq!(json["type"], "cloud_configuration");
        assert_eq!(json["isEnabled"], true);
        assert_eq!(
            json["options"]["complianceRuleOptions"]["regoRule"]["resourceTypes"][0],
            "gcp_compute_instance"
        );
        assert!(json.get("id").is_none());
    }
}
