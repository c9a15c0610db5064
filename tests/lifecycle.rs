//! End-to-end resource lifecycles against the in-memory API.
//!
//! Each test walks create, update, import and destroy through the provider,
//! with deletes that stay visible for a while, and finishes with the same
//! destroy check a real acceptance run would use.

use std::sync::Arc;
use std::time::Duration;

use datadog_provider::testing::{
    assert_error_at, assert_no_errors, InMemoryApi, ProviderTester, TestError,
};
use datadog_provider::{DatadogProvider, ProviderService, RetryRunner};
use serde_json::{json, Value};

fn tester_with_lag(lag: u32) -> (Arc<InMemoryApi>, ProviderTester<DatadogProvider>) {
    let api = Arc::new(InMemoryApi::new().with_delete_lag(lag));
    let provider = DatadogProvider::new().with_api(api.clone());
    (api, ProviderTester::new(provider))
}

fn destroy_runner() -> RetryRunner {
    RetryRunner::fixed(2, Duration::from_secs(10))
}

#[tokio::test(start_paused = true)]
async fn test_integration_azure_lifecycle() {
    const TYPE: &str = "datadog_integration_azure";
    let (api, tester) = tester_with_lag(1);

    let created = tester
        .lifecycle_create(
            TYPE,
            json!({
                "tenant_name": "testc7f6-1234-5678-9101-3fcbf464test",
                "client_id": "testc7f6-1234-5678-9101-3fcbf464test",
                "client_secret": "testingx./Sw*g/Y33t..R1cH+hScMDt",
                "host_filters": "foo:bar,buzz:lightyear"
            }),
        )
        .await
        .unwrap();
    assert_eq!(created["automute"], false);
    assert_eq!(created["host_filters"], "foo:bar,buzz:lightyear");

    let updated = tester
        .lifecycle_update(
            TYPE,
            created,
            json!({
                "tenant_name": "testc7f6-1234-5678-9101-3fcbf464test",
                "client_id": "testc7f6-1234-5678-9101-3fcbf464test",
                "client_secret": "testingx./Sw*g/Y33t..R1cH+hScMDt",
                "host_filters": "foo:bar",
                "automute": true
            }),
        )
        .await
        .unwrap();
    assert_eq!(updated["automute"], true);
    assert_eq!(updated["host_filters"], "foo:bar");

    let id = updated["id"].as_str().unwrap().to_string();
    let imported = tester.import_resource(TYPE, &id).await.unwrap();
    assert_eq!(imported[0].state["id"], id.as_str());

    tester.lifecycle_delete(TYPE, updated.clone()).await.unwrap();
    tester
        .check_destroyed(TYPE, &[updated], &destroy_runner())
        .await
        .unwrap();
    assert!(api.azure_accounts().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sensitive_data_scanner_rule_lifecycle() {
    const TYPE: &str = "datadog_sensitive_data_scanner_rule";
    let (api, tester) = tester_with_lag(1);

    let config = json!({
        "group_id": "group-1",
        "name": "my rule",
        "description": "a description",
        "excluded_attributes": ["username"],
        "is_enabled": true,
        "pattern": "regex",
        "tags": ["sensitive_data:true"],
        "text_replacement": [{"type": "none"}]
    });
    let created = tester.lifecycle_create(TYPE, config).await.unwrap();
    let version = created["version"].as_i64().unwrap();

    let mut planned = created.clone();
    planned["name"] = json!("my rule updated");
    planned["text_replacement"] =
        json!([{"type": "partial_replacement_from_beginning", "number_of_chars": 10}]);
    let updated = tester.lifecycle_update(TYPE, created, planned).await.unwrap();
    assert_eq!(updated["name"], "my rule updated");
    assert_eq!(updated["text_replacement"][0]["number_of_chars"], 10);
    assert_eq!(updated["group_id"], "group-1");
    assert!(updated["version"].as_i64().unwrap() > version);
    assert_eq!(updated["version"], api.scanner_version());

    tester.lifecycle_delete(TYPE, updated.clone()).await.unwrap();
    tester
        .check_destroyed(TYPE, &[updated], &destroy_runner())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_cloud_configuration_rule_lifecycle() {
    const TYPE: &str = "datadog_cloud_configuration_rule";
    let (_api, tester) = tester_with_lag(1);

    let config = json!({
        "enabled": false,
        "message": "Acceptance test TF rule",
        "name": "tf-rule",
        "notifications": ["@channel"],
        "group_by": ["@resource"],
        "policy": "package datadog",
        "resource_type": "gcp_compute_instance",
        "related_resource_types": ["gcp_compute_disk"],
        "severity": "low",
        "tags": ["test:acceptance"]
    });
    let created = tester.lifecycle_create(TYPE, config).await.unwrap();
    let refreshed = tester
        .check_exists(TYPE, &[created.clone()])
        .await
        .unwrap();
    assert_eq!(refreshed[0], created);

    let planned = json!({
        "enabled": true,
        "message": "Acceptance test TF rule - updated",
        "name": "tf-rule - updated",
        "policy": "package datadog # updated",
        "resource_type": "gcp_compute_disk",
        "severity": "high"
    });
    let updated = tester.lifecycle_update(TYPE, created, planned).await.unwrap();
    assert_eq!(updated["related_resource_types"], json!([]));
    assert_eq!(updated["group_by"], json!([]));

    tester.lifecycle_delete(TYPE, updated.clone()).await.unwrap();
    tester
        .check_destroyed(TYPE, &[updated], &destroy_runner())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_destroy_check_fails_when_api_lags_too_long() {
    const TYPE: &str = "datadog_cloud_configuration_rule";
    let (_api, tester) = tester_with_lag(3);

    let created = tester
        .lifecycle_create(
            TYPE,
            json!({
                "enabled": true,
                "message": "m",
                "name": "n",
                "policy": "package datadog",
                "resource_type": "aws_s3_bucket",
                "severity": "info"
            }),
        )
        .await
        .unwrap();
    let id = created["id"].as_str().unwrap().to_string();
    tester.lifecycle_delete(TYPE, created.clone()).await.unwrap();

    let start = tokio::time::Instant::now();
    let err = tester
        .check_destroyed(TYPE, &[created], &destroy_runner())
        .await
        .unwrap_err();
    assert_eq!(start.elapsed(), Duration::from_secs(10));
    match err {
        TestError::NotDestroyed(reason) => {
            assert_eq!(reason, format!("{} {} still exists", TYPE, id));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_resource_validation_through_provider() {
    let (_api, tester) = tester_with_lag(0);
    let provider = tester.provider();

    let diagnostics = provider
        .validate_resource_config(
            "datadog_sensitive_data_scanner_rule",
            json!({
                "group_id": "group-1",
                "text_replacement": [{"type": "replacement_string"}]
            }),
        )
        .await
        .unwrap();
    assert_error_at(&diagnostics, "text_replacement.0.replacement_string");

    let diagnostics = provider
        .validate_resource_config(
            "datadog_cloud_configuration_rule",
            json!({
                "enabled": true,
                "message": "m",
                "name": "n",
                "policy": "p",
                "resource_type": "aws_s3_bucket",
                "severity": "critical"
            }),
        )
        .await
        .unwrap();
    assert_no_errors(&diagnostics);

    let err = tester
        .validate_resource_config("datadog_monitor", Value::Null)
        .await
        .unwrap_err();
    assert!(matches!(err, TestError::Provider(_)));
}
