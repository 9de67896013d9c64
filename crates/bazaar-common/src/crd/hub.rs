//! CatalogHub Custom Resource Definition
//!
//! The cluster-scoped hub configuration. A single well-known object (named
//! `cluster`) declares which default catalog sources are disabled; its status
//! reports the per-source outcome of applying that policy.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Outcome of applying the hub policy to one default source
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum SourceOutcome {
    /// The source was converged to its target state
    #[default]
    Success,
    /// Convergence failed; the queue will retry
    Error,
}

impl std::fmt::Display for SourceOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Error => write!(f, "Error"),
        }
    }
}

/// Per-source enable/disable override
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HubSourceOverride {
    /// Name of a default catalog source
    pub name: String,

    /// Whether the source is turned off
    #[serde(default)]
    pub disabled: bool,
}

/// Applied state of one default source, reported in status
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HubSourceStatus {
    /// Name of the default catalog source
    pub name: String,

    /// Whether the source is disabled by the current policy
    #[serde(default)]
    pub disabled: bool,

    /// Outcome of the last convergence attempt
    #[serde(default)]
    pub status: SourceOutcome,

    /// Error detail when status is Error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Status of the CatalogHub
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CatalogHubStatus {
    /// Applied state of every default source known to the operator
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<HubSourceStatus>,
}

/// Specification for the CatalogHub
///
/// `disableAllDefaultSources` turns off every default source; individual
/// `sources` entries override it in either direction. Entries naming sources
/// the operator does not own are ignored.
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "bazaar.dev",
    version = "v1alpha1",
    kind = "CatalogHub",
    plural = "cataloghubs",
    status = "CatalogHubStatus",
    printcolumn = r#"{"name":"DisableAll","type":"boolean","jsonPath":".spec.disableAllDefaultSources"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CatalogHubSpec {
    /// Disable every default catalog source
    #[serde(default)]
    pub disable_all_default_sources: bool,

    /// Per-source overrides, applied after the disable-all flag
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<HubSourceOverride>,
}
