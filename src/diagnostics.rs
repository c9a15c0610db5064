//! Diagnostics reported back to the host.

use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    /// An error that prevents the operation from completing.
    Error,
    /// A warning that doesn't prevent the operation but should be addressed.
    Warning,
}

/// A diagnostic message from the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity of the diagnostic.
    pub severity: DiagnosticSeverity,
    /// A short summary of the issue.
    pub summary: String,
    /// A detailed description of the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// The attribute path where the issue occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
}

impl Diagnostic {
    /// Create an error diagnostic.
    pub fn error(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Error,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Create a warning diagnostic.
    pub fn warning(summary: impl Into<String>) -> Self {
        Self {
            severity: DiagnosticSeverity::Warning,
            summary: summary.into(),
            detail: None,
            attribute: None,
        }
    }

    /// Add detail to this diagnostic.
    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Set the attribute path for this diagnostic.
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = Some(attribute.into());
        self
    }

    /// Whether this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == DiagnosticSeverity::Error
    }
}

impl From<&ProviderError> for Diagnostic {
    fn from(err: &ProviderError) -> Self {
        Diagnostic::error(err.message()).with_detail(err.to_string())
    }
}

/// Whether any diagnostic in the slice is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;

    #[test]
    fn test_diagnostic_builders() {
        let diag = Diagnostic::error("missing api_key")
            .with_attribute("api_key")
            .with_detail("set DD_API_KEY");
        assert!(diag.is_error());
        assert_eq!(diag.attribute.as_deref(), Some("api_key"));
        assert_eq!(diag.detail.as_deref(), Some("set DD_API_KEY"));

        assert!(!Diagnostic::warning("slow").is_error());
    }

    #[test]
    fn test_diagnostic_from_api_error() {
        let err = ProviderError::from_api(
            "error deleting SensitiveDataScannerRule",
            ApiError::status(409, "Conflict", None),
        );
        let diag = Diagnostic::from(&err);
        assert!(diag.is_error());
        assert_eq!(
            diag.summary,
            "error deleting SensitiveDataScannerRule: 409 Conflict"
        );
        assert!(diag.detail.unwrap().starts_with("Resource already exists"));
    }

    #[test]
    fn test_has_errors() {
        assert!(!has_errors(&[Diagnostic::warning("w")]));
        assert!(has_errors(&[Diagnostic::warning("w"), Diagnostic::error("e")]));
    }

    #[test]
    fn test_serialization_skips_empty_fields() {
        let json = serde_json::to_value(Diagnostic::warning("careful")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"severity": "warning", "summary": "careful"})
        );
    }
}
