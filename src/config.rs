//! Provider configuration.
//!
//! The host passes the provider block as JSON. Credentials may be omitted from
//! the block and supplied through the environment instead:
//!
//! | key        | environment                         |
//! |------------|-------------------------------------|
//! | `api_key`  | `DD_API_KEY`, `DATADOG_API_KEY`     |
//! | `app_key`  | `DD_APP_KEY`, `DATADOG_APP_KEY`     |
//! | `api_url`  | `DD_HOST`, `DATADOG_HOST`           |

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diagnostics::Diagnostic;
use crate::error::ProviderError;
use crate::retry::RetrySettings;

/// API endpoint used when none is configured.
pub const DEFAULT_API_URL: &str = "https://api.datadoghq.com";

/// Per-request HTTP timeout used when none is configured, in seconds.
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

const API_KEY_ENV: [&str; 2] = ["DD_API_KEY", "DATADOG_API_KEY"];
const APP_KEY_ENV: [&str; 2] = ["DD_APP_KEY", "DATADOG_APP_KEY"];
const API_URL_ENV: [&str; 2] = ["DD_HOST", "DATADOG_HOST"];

/// Settings for talking to the Datadog API.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Datadog API key.
    pub api_key: Option<String>,
    /// Datadog application key.
    pub app_key: Option<String>,
    /// Base URL of the API, e.g. `https://api.datadoghq.eu`.
    pub api_url: Option<String>,
    /// Per-request timeout in seconds.
    pub http_client_timeout: u64,
    /// Poll after deletes until the object is gone. Disabled when absent.
    pub delete_verification: Option<RetrySettings>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            app_key: None,
            api_url: None,
            http_client_timeout: DEFAULT_HTTP_TIMEOUT_SECS,
            delete_verification: None,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |k: &Option<String>| k.as_ref().map(|_| "<redacted>");
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("app_key", &redact(&self.app_key))
            .field("api_url", &self.api_url)
            .field("http_client_timeout", &self.http_client_timeout)
            .field("delete_verification", &self.delete_verification)
            .finish()
    }
}

impl ProviderConfig {
    /// Parse the provider block, filling gaps from the process environment.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(value, |key| std::env::var(key).ok())
    }

    /// Parse the provider block, filling gaps through `env`.
    pub fn from_value_with_env<F>(value: Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: ProviderConfig = match value {
            Value::Null => ProviderConfig::default(),
            other => serde_json::from_value(other)?,
        };

        let lookup = |keys: &[&str]| {
            keys.iter()
                .find_map(|k| env(k).filter(|v| !v.is_empty()))
        };
        if is_blank(&config.api_key) {
            config.api_key = lookup(&API_KEY_ENV);
        }
        if is_blank(&config.app_key) {
            config.app_key = lookup(&APP_KEY_ENV);
        }
        if is_blank(&config.api_url) {
            config.api_url = lookup(&API_URL_ENV);
        }
        Ok(config)
    }

    /// The API base URL without a trailing slash.
    pub fn api_url(&self) -> &str {
        self.api_url
            .as_deref()
            .unwrap_or(DEFAULT_API_URL)
            .trim_end_matches('/')
    }

    /// The per-request HTTP timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_client_timeout)
    }

    /// Check the configuration, returning errors and warnings.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        if is_blank(&self.api_key) {
            diagnostics.push(
                Diagnostic::error("Missing required attribute 'api_key'")
                    .with_detail("Set api_key or the DD_API_KEY environment variable")
                    .with_attribute("api_key"),
            );
        }
        if is_blank(&self.app_key) {
            diagnostics.push(
                Diagnostic::error("Missing required attribute 'app_key'")
                    .with_detail("Set app_key or the DD_APP_KEY environment variable")
                    .with_attribute("app_key"),
            );
        }

        let url = self.api_url();
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            diagnostics.push(
                Diagnostic::error("Invalid API URL")
                    .with_detail(format!("'{}' must start with http:// or https://", url))
                    .with_attribute("api_url"),
            );
        }

        if self.http_client_timeout == 0 {
            diagnostics.push(
                Diagnostic::error("HTTP client timeout must be greater than zero")
                    .with_attribute("http_client_timeout"),
            );
        }

        if let Some(settings) = &self.delete_verification {
            if settings.max_attempts == 0 {
                diagnostics.push(
                    Diagnostic::warning("Delete verification is disabled")
                        .with_detail("max_attempts is 0, deletes will not be polled")
                        .with_attribute("delete_verification.max_attempts"),
                );
            }
        }

        diagnostics
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, str::is_empty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::has_errors;
    use serde_json::json;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_parse_full_config() {
        let config = ProviderConfig::from_value_with_env(
            json!({
                "api_key": "api",
                "app_key": "app",
                "api_url": "https://api.datadoghq.eu/",
                "http_client_timeout": 30,
                "delete_verification": {"max_attempts": 5}
            }),
            no_env,
        )
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("api"));
        assert_eq!(config.api_url(), "https://api.datadoghq.eu");
        assert_eq!(config.timeout(), Duration::from_secs(30));
        let settings = config.delete_verification.unwrap();
        assert_eq!(settings.max_attempts, 5);
        assert_eq!(settings.delay_seconds, 10);
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value_with_env(Value::Null, no_env).unwrap();
        assert_eq!(config.api_url(), DEFAULT_API_URL);
        assert_eq!(config.http_client_timeout, DEFAULT_HTTP_TIMEOUT_SECS);
        assert!(config.delete_verification.is_none());
    }

    #[test]
    fn test_env_fallback() {
        let env = |key: &str| match key {
            "DD_API_KEY" => Some("from-dd".to_string()),
            "DATADOG_APP_KEY" => Some("from-datadog".to_string()),
            "DD_HOST" => Some(String::new()),
            "DATADOG_HOST" => Some("https://us5.datadoghq.com".to_string()),
            _ => None,
        };
        let config = ProviderConfig::from_value_with_env(json!({"app_key": ""}), env).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("from-dd"));
        assert_eq!(config.app_key.as_deref(), Some("from-datadog"));
        assert_eq!(config.api_url(), "https://us5.datadoghq.com");
    }

    #[test]
    fn test_explicit_values_win_over_env() {
        let env = |_: &str| Some("env".to_string());
        let config =
            ProviderConfig::from_value_with_env(json!({"api_key": "explicit"}), env).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("explicit"));
        assert_eq!(config.app_key.as_deref(), Some("env"));
    }

    #[test]
    fn test_invalid_type_is_serialization_error() {
        let value = json!({"http_client_timeout": "soon"});
        let err = ProviderConfig::from_value_with_env(value, no_env).unwrap_err();
        assert!(matches!(err, ProviderError::Serialization(_)));
    }

    #[test]
    fn test_validate_reports_missing_keys() {
        let config = ProviderConfig::default();
        let diagnostics = config.validate();

        assert!(has_errors(&diagnostics));
        let attrs: Vec<_> = diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(attrs, vec!["api_key", "app_key"]);
    }

    #[test]
    fn test_validate_url_and_timeout() {
        let config = ProviderConfig {
            api_key: Some("a".into()),
            app_key: Some("b".into()),
            api_url: Some("ftp://example.com".into()),
            http_client_timeout: 0,
            delete_verification: None,
        };
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("api_url"));
        assert_eq!(
            diagnostics[1].attribute.as_deref(),
            Some("http_client_timeout")
        );
    }

    #[test]
    fn test_zero_verification_budget_warns() {
        let config = ProviderConfig {
            api_key: Some("a".into()),
            app_key: Some("b".into()),
            delete_verification: Some(RetrySettings {
                max_attempts: 0,
                delay_seconds: 1,
            }),
            ..Default::default()
        };
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        assert!(!diagnostics[0].is_error());
    }

    #[test]
    fn test_debug_redacts_keys() {
        let config = ProviderConfig {
            api_key: Some("secret-api".into()),
            app_key: Some("secret-app".into()),
            ..Default::default()
        };
        let debug = format!("{:?}", config);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("<redacted>"));
    }
}
