//! CatalogSource Custom Resource Definition
//!
//! A CatalogSource is one catalog record in the marketplace namespace. The
//! operator owns a default set of these and restores them when they drift.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// How the catalog content is served
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Catalog served by a gRPC registry pod built from `image`
    #[default]
    Grpc,
    /// Catalog read from an in-cluster ConfigMap
    ConfigMap,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Grpc => write!(f, "grpc"),
            Self::ConfigMap => write!(f, "configmap"),
        }
    }
}

/// Specification for a CatalogSource
///
/// The spec is the unit of convergence: the reconciler compares an existing
/// object's spec against its default definition and restores only the spec
/// on divergence, leaving metadata written by other actors alone.
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "bazaar.dev",
    version = "v1alpha1",
    kind = "CatalogSource",
    plural = "catalogsources",
    shortname = "csrc",
    namespaced,
    derive = "PartialEq",
    printcolumn = r#"{"name":"Display","type":"string","jsonPath":".spec.displayName"}"#,
    printcolumn = r#"{"name":"Type","type":"string","jsonPath":".spec.sourceType"}"#,
    printcolumn = r#"{"name":"Publisher","type":"string","jsonPath":".spec.publisher"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSourceSpec {
    /// How the catalog content is served
    #[serde(default)]
    pub source_type: SourceType,

    /// Registry image serving the catalog (grpc sources)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Pre-existing registry address, host:port (grpc sources without an image)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    /// Human-readable catalog name shown in UIs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Publisher of the catalog content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resolution priority; higher wins when catalogs offer the same package
    #[serde(default)]
    pub priority: i32,
}

impl CatalogSourceSpec {
    /// Validate the spec
    ///
    /// A grpc source needs somewhere to pull catalog content from.
    pub fn validate(&self) -> Result<(), String> {
        if self.source_type == SourceType::Grpc && self.image.is_none() && self.address.is_none() {
            return Err("grpc catalog source requires an image or an address".to_string());
        }
        Ok(())
    }
}
