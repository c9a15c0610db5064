//! reqwest-backed implementation of [`DatadogApi`].

use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::models::{
    AzureAccount, ScannerConfigResponse, ScanningRuleDeleteRequest, ScanningRuleRequest,
    ScanningRuleResponse, SecurityMonitoringRule,
};
use super::{ApiResult, DatadogApi};
use crate::config::ProviderConfig;
use crate::error::{ApiError, ProviderError};

const USER_AGENT: &str = concat!("datadog-provider/", env!("CARGO_PKG_VERSION"));

const AZURE_PATH: &str = "/api/v1/integration/azure";
const SCANNER_CONFIG_PATH: &str = "/api/v2/sensitive-data-scanner/config";
const SCANNER_RULES_PATH: &str = "/api/v2/sensitive-data-scanner/config/rules";
const SECURITY_RULES_PATH: &str = "/api/v2/security_monitoring/rules";

/// HTTP client authenticated with an API key and an application key.
#[derive(Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    app_key: String,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    /// Build a client from validated provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = required(&config.api_key, "api_key")?;
        let app_key = required(&config.app_key, "app_key")?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ProviderError::Configuration(format!("failed to build HTTP client: {}", e))
            })?;

        Ok(Self {
            http,
            base_url: config.api_url().to_string(),
            api_key,
            app_key,
        })
    }

    /// The API base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        debug!(%method, path, "sending API request");
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .header(ACCEPT, "application/json")
    }

    async fn send(&self, builder: RequestBuilder) -> ApiResult<Response> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = status.as_u16(), "API request failed");
        Err(ApiError::status(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unexpected status"),
            Some(body),
        ))
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> ApiResult<T> {
        let response = self.send(builder).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::transport(format!("failed to decode response: {}", e)))
    }

    async fn send_empty(&self, builder: RequestBuilder) -> ApiResult<()> {
        self.send(builder).await.map(|_| ())
    }
}

fn required(value: &Option<String>, name: &str) -> Result<String, ProviderError> {
    value
        .clone()
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ProviderError::Configuration(format!("{} is required", name)))
}

#[async_trait::async_trait]
impl DatadogApi for HttpClient {
    async fn list_azure_integrations(&self) -> ApiResult<Vec<AzureAccount>> {
        self.send_json(self.request(Method::GET, AZURE_PATH)).await
    }

    async fn create_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        self.send_empty(self.request(Method::POST, AZURE_PATH).json(account))
            .await
    }

    async fn update_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        self.send_empty(self.request(Method::PUT, AZURE_PATH).json(account))
            .await
    }

    async fn delete_azure_integration(&self, account: &AzureAccount) -> ApiResult<()> {
        self.send_empty(self.request(Method::DELETE, AZURE_PATH).json(account))
            .await
    }

    async fn list_scanning_groups(&self) -> ApiResult<ScannerConfigResponse> {
        self.send_json(self.request(Method::GET, SCANNER_CONFIG_PATH))
            .await
    }

    async fn create_scanning_rule(
        &self,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse> {
        self.send_json(self.request(Method::POST, SCANNER_RULES_PATH).json(request))
            .await
    }

    async fn update_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleRequest,
    ) -> ApiResult<ScanningRuleResponse> {
        let path = format!("{}/{}", SCANNER_RULES_PATH, id);
        self.send_json(self.request(Method::PATCH, &path).json(request))
            .await
    }

    async fn delete_scanning_rule(
        &self,
        id: &str,
        request: &ScanningRuleDeleteRequest,
    ) -> ApiResult<()> {
        let path = format!("{}/{}", SCANNER_RULES_PATH, id);
        self.send_empty(self.request(Method::DELETE, &path).json(request))
            .await
    }

    async fn get_security_monitoring_rule(&self, id: &str) -> ApiResult<SecurityMonitoringRule> {
        let path = format!("{}/{}", SECURITY_RULES_PATH, id);
        self.send_json(self.request(Method::GET, &path)).await
    }

    async fn create_security_monitoring_rule(
        &self,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule> {
        self.send_json(self.request(Method::POST, SECURITY_RULES_PATH).json(rule))
            .await
    }

    async fn update_security_monitoring_rule(
        &self,
        id: &str,
        rule: &SecurityMonitoringRule,
    ) -> ApiResult<SecurityMonitoringRule> {
        let path = format!("{}/{}", SECURITY_RULES_PATH, id);
        self.send_json(self.request(Method::PUT, &path).json(rule))
            .await
    }

    async fn delete_security_monitoring_rule(&self, id: &str) -> ApiResult<()> {
        let path = format!("{}/{}", SECURITY_RULES_PATH, id);
        self.send_empty(self.request(Method::DELETE, &path)).await
    }
}
