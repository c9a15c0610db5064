//! Error types for the Datadog provider.

use thiserror::Error;

/// Errors that can occur while handling a resource.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The requested resource was not found.
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// A validation error occurred.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An internal provider error occurred.
    #[error("SDK error: {0}")]
    Sdk(String),

    /// A configuration error occurred.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The requested resource type is unknown.
    #[error("Unknown resource type: {0}")]
    UnknownResource(String),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource already exists (create conflict).
    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    /// Permission denied (authentication/authorization failure).
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Quota or rate limit exceeded.
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Service temporarily unavailable.
    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// Operation timed out.
    #[error("Deadline exceeded: {0}")]
    DeadlineExceeded(String),

    /// Operation failed due to current state (precondition not met).
    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    /// Operation not implemented.
    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    /// Invalid request from client.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProviderError {
    /// Get the error message as a string.
    ///
    /// Returns a reference to the error message for any variant.
    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(msg) => msg,
            Self::Validation(msg) => msg,
            Self::Sdk(msg) => msg,
            Self::Configuration(msg) => msg,
            Self::UnknownResource(msg) => msg,
            Self::Serialization(_err) => "serialization error (see Debug output)",
            Self::AlreadyExists(msg) => msg,
            Self::PermissionDenied(msg) => msg,
            Self::ResourceExhausted(msg) => msg,
            Self::Unavailable(msg) => msg,
            Self::DeadlineExceeded(msg) => msg,
            Self::FailedPrecondition(msg) => msg,
            Self::Unimplemented(msg) => msg,
            Self::InvalidRequest(msg) => msg,
        }
    }

    /// Whether this error means the remote object no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Translate an API client error, prefixing it with `context`.
    ///
    /// # Examples
    ///
    /// ```
    /// use datadog_provider::{ApiError, ProviderError};
    ///
    /// let err = ApiError::status(404, "Not Found", None);
    /// let err = ProviderError::from_api("error getting rule", err);
    /// assert!(err.is_not_found());
    /// assert_eq!(err.message(), "error getting rule: 404 Not Found");
    /// ```
    pub fn from_api(context: &str, err: ApiError) -> Self {
        let msg = format!("{}: {}", context, err);
        match err.status {
            Some(404) => Self::NotFound(msg),
            Some(401) | Some(403) => Self::PermissionDenied(msg),
            Some(409) => Self::AlreadyExists(msg),
            Some(429) => Self::ResourceExhausted(msg),
            Some(status) if status >= 500 => Self::Unavailable(msg),
            Some(_) => Self::InvalidRequest(msg),
            None => Self::Unavailable(msg),
        }
    }
}

/// An error returned by the Datadog API client.
///
/// `status` is the HTTP response descriptor; it is `None` when the request
/// never produced a response (connect failure, timeout, undecodable body).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    /// HTTP status code, if a response was received.
    pub status: Option<u16>,
    /// Short description of the failure.
    pub message: String,
    /// Raw response body, if any.
    pub body: Option<String>,
}

impl ApiError {
    /// An error carrying an HTTP status.
    pub fn status(status: u16, message: impl Into<String>, body: Option<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            body,
        }
    }

    /// An error with no HTTP response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
            body: None,
        }
    }

    /// Whether the API answered with 404.
    pub fn is_not_found(&self) -> bool {
        self.status == Some(404)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(status) = self.status {
            write!(f, "{} ", status)?;
        }
        f.write_str(&self.message)?;
        if let Some(body) = self.body.as_deref().filter(|b| !b.is_empty()) {
            write!(f, ": {}", body)?;
        }
        Ok(())
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::status(status.as_u16(), err.to_string(), None),
            None => Self::transport(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(format!("{}", err), "Resource not found: resource-123");

        let err = ProviderError::Validation("invalid input".to_string());
        assert_eq!(format!("{}", err), "Validation error: invalid input");

        let err = ProviderError::UnknownResource("datadog_monitor".to_string());
        assert_eq!(format!("{}", err), "Unknown resource type: datadog_monitor");

        let err = ProviderError::DeadlineExceeded("rule still exists".to_string());
        assert_eq!(format!("{}", err), "Deadline exceeded: rule still exists");
    }

    #[test]
    fn test_message_method() {
        let err = ProviderError::NotFound("resource-123".to_string());
        assert_eq!(err.message(), "resource-123");

        let err = ProviderError::Configuration("invalid config".to_string());
        assert_eq!(err.message(), "invalid config");
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::status(400, "Bad Request", Some(r#"{"errors":["bad"]}"#.into()));
        assert_eq!(err.to_string(), r#"400 Bad Request: {"errors":["bad"]}"#);

        let err = ApiError::status(404, "Not Found", Some(String::new()));
        assert_eq!(err.to_string(), "404 Not Found");

        let err = ApiError::transport("connection refused");
        assert_eq!(err.to_string(), "connection refused");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_from_api_maps_status() {
        let cases = [
            (Some(404), "NotFound"),
            (Some(401), "PermissionDenied"),
            (Some(403), "PermissionDenied"),
            (Some(409), "AlreadyExists"),
            (Some(429), "ResourceExhausted"),
            (Some(502), "Unavailable"),
            (Some(400), "InvalidRequest"),
            (None, "Unavailable"),
        ];

        for (status, expected) in cases {
            let api = ApiError {
                status,
                message: "x".into(),
                body: None,
            };
            let err = ProviderError::from_api("ctx", api);
            let debug = format!("{:?}", err);
            assert!(
                debug.starts_with(expected),
                "status {:?} mapped to {}",
                status,
                debug
            );
        }
    }

    #[test]
    fn test_from_api_keeps_context() {
        let err = ProviderError::from_api(
            "error creating an Azure integration",
            ApiError::status(400, "Bad Request", Some("invalid tenant".into())),
        );
        assert_eq!(
            err.message(),
            "error creating an Azure integration: 400 Bad Request: invalid tenant"
        );
    }
}
