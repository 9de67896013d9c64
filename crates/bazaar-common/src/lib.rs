//! Common types for Bazaar: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod backoff;
pub mod crd;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// API group for all Bazaar custom resources
pub const API_GROUP: &str = "bazaar.dev";

/// Namespace where default catalog sources are managed
pub const MARKETPLACE_NAMESPACE: &str = "bazaar-marketplace";

/// Well-known name of the singleton CatalogHub configuration object.
///
/// The hub configuration is cluster-scoped and there is structurally never
/// more than one meaningful instance; events for any other name are rejected.
pub const DEFAULT_HUB_NAME: &str = "cluster";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "bazaar-operator";
