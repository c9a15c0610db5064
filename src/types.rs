//! Value types exchanged with the host.

use serde::{Deserialize, Serialize};

/// Provider name reported in metadata.
pub const PROVIDER_NAME: &str = "datadog";

/// A resource produced by an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type.
    pub resource_type: String,
    /// The imported state.
    pub state: serde_json::Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: serde_json::Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }
}

/// What the provider offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Provider name.
    pub name: String,
    /// Crate version of the provider.
    pub version: String,
    /// Resource type names, sorted.
    pub resources: Vec<String>,
}

impl ProviderMetadata {
    /// Whether `resource_type` is served by this provider.
    pub fn supports(&self, resource_type: &str) -> bool {
        self.resources.iter().any(|r| r == resource_type)
    }
}
