//! `datadog_sensitive_data_scanner_rule`: a rule inside a scanning group.
//!
//! The scanner configuration is versioned as a whole; every write returns the
//! new version, which is kept in the computed `version` attribute and sent
//! back on update and delete.

use serde_json::{json, Map, Value};
use tracing::debug;

use super::state;
use super::ResourceHandler;
use crate::client::models::{
    ScannerMeta, ScanningRuleAttributes, ScanningRuleData, ScanningRuleDeleteRequest,
    ScanningRuleRelationships, ScanningRuleRequest, TextReplacement, TextReplacementType,
    SCANNING_RULE_TYPE,
};
use crate::client::DatadogApi;
use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;

/// Resource type name.
pub const TYPE_NAME: &str = "datadog_sensitive_data_scanner_rule";

/// Handler for sensitive data scanner rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct SensitiveDataScannerRule;

fn build_text_replacement(block: &Value) -> Result<TextReplacement, ProviderError> {
    let replacement_type = state::string(block, "type")
        .map(|t| t.parse::<TextReplacementType>())
        .transpose()
        .map_err(ProviderError::Validation)?;

    Ok(TextReplacement {
        number_of_chars: state::integer(block, "number_of_chars"),
        replacement_string: state::string(block, "replacement_string"),
        replacement_type,
    })
}

fn build_attributes(config: &Value) -> Result<ScanningRuleAttributes, ProviderError> {
    let text_replacement = state::block(config, "text_replacement")
        .map(build_text_replacement)
        .transpose()?;

    Ok(ScanningRuleAttributes {
        description: state::string(config, "description"),
        excluded_attributes: state::string_list(config, "excluded_attributes"),
        is_enabled: state::boolean(config, "is_enabled"),
        name: state::string(config, "name"),
        pattern: state::string(config, "pattern"),
        tags: state::string_list(config, "tags"),
        text_replacement,
    })
}

fn build_request(
    config: &Value,
    id: Option<String>,
    version: Option<i64>,
) -> Result<ScanningRuleRequest, ProviderError> {
    // The group relationship is only accepted on create.
    let relationships = match id {
        None => {
            let group_id = state::required_string(config, "group_id")?;
            Some(ScanningRuleRelationships::group(group_id))
        }
        Some(_) => None,
    };

    Ok(ScanningRuleRequest {
        data: ScanningRuleData {
            id,
            kind: SCANNING_RULE_TYPE.to_string(),
            attributes: build_attributes(config)?,
            relationships,
        },
        meta: ScannerMeta { version },
    })
}

fn apply_attributes(map: &mut Map<String, Value>, attributes: ScanningRuleAttributes) {
    state::set_opt(map, "description", attributes.description);
    map.insert(
        "excluded_attributes".into(),
        attributes.excluded_attributes.into(),
    );
    state::set_opt(map, "is_enabled", attributes.is_enabled);
    state::set_opt(map, "name", attributes.name);
    state::set_opt(map, "pattern", attributes.pattern);
    map.insert("tags".into(), attributes.tags.into());

    let text_replacement = match attributes.text_replacement {
        Some(tr) => json!([{
            "number_of_chars": tr.number_of_chars,
            "replacement_string": tr.replacement_string,
            "type": tr.replacement_type.map(|t| t.as_str()),
        }]),
        None => json!([]),
    };
    map.insert("text_replacement".into(), text_replacement);
}

fn apply_meta(map: &mut Map<String, Value>, meta: ScannerMeta) {
    if let Some(version) = meta.version {
        map.insert("version".into(), version.into());
    }
}

#[async_trait::async_trait]
impl ResourceHandler for SensitiveDataScannerRule {
    fn type_name(&self) -> &'static str {
        TYPE_NAME
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        state::check_required(config, &["group_id"], &mut diagnostics);

        let Some(block) = state::block(config, "text_replacement") else {
            return diagnostics;
        };
        let replacement = match build_text_replacement(block) {
            Ok(r) => r,
            Err(e) => {
                diagnostics.push(
                    Diagnostic::error(e.message())
                        .with_attribute("text_replacement.0.type"),
                );
                return diagnostics;
            }
        };

        match replacement.replacement_type {
            Some(t) if t.is_partial() && replacement.number_of_chars.map_or(true, |n| n <= 0) => {
                diagnostics.push(
                    Diagnostic::error("number_of_chars must be greater than 0")
                        .with_detail(format!("required when type is '{}'", t.as_str()))
                        .with_attribute("text_replacement.0.number_of_chars"),
                );
            }
            Some(TextReplacementType::ReplacementString)
                if replacement.replacement_string.is_none() =>
            {
                diagnostics.push(
                    Diagnostic::error("Missing required attribute 'replacement_string'")
                        .with_detail("required when type is 'replacement_string'")
                        .with_attribute("text_replacement.0.replacement_string"),
                );
            }
            _ => {}
        }
        diagnostics
    }

    async fn create(
        &self,
        api: &dyn DatadogApi,
        mut planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let request = build_request(&planned_state, None, None)?;

        let response = api
            .create_scanning_rule(&request)
            .await
            .map_err(|e| ProviderError::from_api("error creating SensitiveDataScannerRule", e))?;

        let id = response.data.id.ok_or_else(|| {
            ProviderError::Sdk("SensitiveDataScannerRule response is missing an id".into())
        })?;
        debug!(id = %id, "created sensitive data scanner rule");

        let map = state::object_mut(&mut planned_state)?;
        map.insert("id".into(), id.into());
        apply_attributes(map, response.data.attributes);
        apply_meta(map, response.meta);
        Ok(planned_state)
    }

    async fn read(
        &self,
        api: &dyn DatadogApi,
        mut current_state: Value,
    ) -> Result<Value, ProviderError> {
        let id = state::id(&current_state)?;

        let config = api
            .list_scanning_groups()
            .await
            .map_err(|e| ProviderError::from_api("error calling ListScanningGroups", e))?;

        let rule = config.find_rule(&id).ok_or_else(|| {
            ProviderError::NotFound(format!("SensitiveDataScannerRule {} not found", id))
        })?;
        let attributes: ScanningRuleAttributes = serde_json::from_value(rule.attributes.clone())?;
        let group_id = rule
            .relationships
            .as_ref()
            .and_then(|r| r.group_id())
            .map(str::to_string);

        let map = state::object_mut(&mut current_state)?;
        apply_attributes(map, attributes);
        if let Some(group_id) = group_id {
            map.insert("group_id".into(), group_id.into());
        }
        apply_meta(map, config.meta);
        Ok(current_state)
    }

    async fn update(
        &self,
        api: &dyn DatadogApi,
        prior_state: Value,
        mut planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let id = state::id(&prior_state)?;
        let version = state::integer(&planned_state, "version")
            .or_else(|| state::integer(&prior_state, "version"));
        let request = build_request(&planned_state, Some(id.clone()), version)?;

        let response = api
            .update_scanning_rule(&id, &request)
            .await
            .map_err(|e| ProviderError::from_api("error updating SensitiveDataScannerRule", e))?;

        let map = state::object_mut(&mut planned_state)?;
        map.insert("id".into(), response.data.id.unwrap_or(id).into());
        apply_attributes(map, response.data.attributes);
        apply_meta(map, response.meta);
        Ok(planned_state)
    }

    async fn delete(
        &self,
        api: &dyn DatadogApi,
        current_state: Value,
    ) -> Result<(), ProviderError> {
        let id = state::id(&current_state)?;
        let request = ScanningRuleDeleteRequest {
            meta: ScannerMeta {
                version: state::integer(&current_state, "version"),
            },
        };

        // On failure the rule is assumed to still exist and prior state is kept.
        api.delete_scanning_rule(&id, &request)
            .await
            .map_err(|e| ProviderError::from_api("error deleting SensitiveDataScannerRule", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::testing::InMemoryApi;

    fn config() -> Value {
        json!({
            "group_id": "group-1",
            "description": "Mask emails",
            "excluded_attributes": ["username"],
            "is_enabled": true,
            "name": "email",
            "pattern": "[a-z]+@[a-z]+\\.com",
            "tags": ["sensitive_data:email"],
            "text_replacement": [{
                "number_of_chars": 4,
                "type": "partial_replacement_from_beginning"
            }]
        })
    }

    #[test]
    fn test_build_request_for_create() {
        let request = build_request(&config(), None, None).unwrap();
        assert_eq!(request.data.kind, SCANNING_RULE_TYPE);
        assert_eq!(
            request.data.relationships.as_ref().unwrap().group_id(),
            Some("group-1")
        );
        let tr = request.data.attributes.text_replacement.unwrap();
        assert_eq!(tr.number_of_chars, Some(4));
        assert_eq!(
            tr.replacement_type,
            Some(TextReplacementType::PartialReplacementFromBeginning)
        );
        assert_eq!(request.data.attributes.excluded_attributes, vec!["username"]);
    }

    #[test]
    fn test_build_request_for_update_omits_group() {
        let request = build_request(&config(), Some("rule-1".into()), Some(3)).unwrap();
        assert!(request.data.relationships.is_none());
        assert_eq!(request.data.id.as_deref(), Some("rule-1"));
        assert_eq!(request.meta.version, Some(3));
    }

    #[test]
    fn test_invalid_replacement_type_is_rejected() {
        let mut cfg = config();
        cfg["text_replacement"] = json!([{"type": "scramble"}]);
        let err = build_request(&cfg, None, None).unwrap_err();
        assert!(matches!(err, ProviderError::Validation(_)));

        let diagnostics = SensitiveDataScannerRule.validate(&cfg);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("text_replacement.0.type")
        );
    }

    #[test]
    fn test_validate_replacement_requirements() {
        assert!(SensitiveDataScannerRule.validate(&config()).is_empty());

        let mut cfg = config();
        cfg["text_replacement"] = json!([{"type": "partial_replacement_from_end"}]);
        let diagnostics = SensitiveDataScannerRule.validate(&cfg);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("text_replacement.0.number_of_chars")
        );

        cfg["text_replacement"] = json!({"type": "replacement_string"});
        let diagnostics = SensitiveDataScannerRule.validate(&cfg);
        assert_eq!(
            diagnostics[0].attribute.as_deref(),
            Some("text_replacement.0.replacement_string")
        );

        let diagnostics = SensitiveDataScannerRule.validate(&json!({}));
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("group_id"));
    }

    #[tokio::test]
    async fn test_create_read_update_delete() {
        let api = InMemoryApi::new();
        let handler = SensitiveDataScannerRule;

        let created = handler.create(&api, config()).await.unwrap();
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["name"], "email");
        assert_eq!(created["text_replacement"][0]["number_of_chars"], 4);
        let created_version = created["version"].as_i64().unwrap();

        let read = handler.read(&api, json!({"id": id})).await.unwrap();
        assert_eq!(read["group_id"], "group-1");
        assert_eq!(read["tags"], json!(["sensitive_data:email"]));
        assert_eq!(read["version"], created_version);

        let mut planned = read.clone();
        planned["name"] = json!("email-renamed");
        planned["text_replacement"] = json!([]);
        let updated = handler.update(&api, read, planned).await.unwrap();
        assert_eq!(updated["id"], id.as_str());
        assert_eq!(updated["name"], "email-renamed");
        assert_eq!(updated["text_replacement"], json!([]));
        assert!(updated["version"].as_i64().unwrap() > created_version);

        handler.delete(&api, updated).await.unwrap();
        let err = handler.read(&api, json!({"id": id})).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_list_404_is_not_found() {
        let api = InMemoryApi::new();
        api.fail_next(ApiError::status(404, "Not Found", None));

        let err = SensitiveDataScannerRule
            .read(&api, json!({"id": "rule-9"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().starts_with("error calling ListScanningGroups"));
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let api = InMemoryApi::new();
        let handler = SensitiveDataScannerRule;
        let created = handler.create(&api, config()).await.unwrap();

        let mut stale = created.clone();
        stale["version"] = json!(0);
        let err = handler.delete(&api, stale).await.unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists(_)));

        handler.delete(&api, created).await.unwrap();
    }
}
