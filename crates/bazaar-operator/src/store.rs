//! Cluster store access for the two resource kinds.
//!
//! Reconcilers talk to the cluster through the [`CatalogStore`] trait so the
//! Kubernetes client can be mocked in tests. NotFound is normalized here:
//! gets return `Option`, deletes of absent objects succeed. Reconcilers never
//! see NotFound as an error.

use async_trait::async_trait;
use kube::api::{DeleteParams, Patch, PatchParams, PostParams};
use kube::{Api, Client};

#[cfg(test)]
use mockall::automock;

use bazaar_common::crd::{CatalogHub, CatalogHubStatus, CatalogSource, CatalogSourceSpec};
use bazaar_common::{Result, DEFAULT_HUB_NAME, FIELD_MANAGER};

/// Trait abstracting cluster operations on catalog sources and the hub.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Get a catalog source by name; `None` when absent.
    async fn get_catalog_source(&self, name: &str) -> Result<Option<CatalogSource>>;

    /// Create a catalog source.
    async fn create_catalog_source(&self, source: &CatalogSource) -> Result<()>;

    /// Overwrite the spec of an existing catalog source in one atomic call.
    async fn update_catalog_source_spec(&self, name: &str, spec: &CatalogSourceSpec)
        -> Result<()>;

    /// Delete a catalog source. Deleting an absent object is success.
    async fn delete_catalog_source(&self, name: &str) -> Result<()>;

    /// Get the singleton hub configuration object; `None` when absent.
    async fn get_hub(&self) -> Result<Option<CatalogHub>>;

    /// Patch the hub's status subresource.
    async fn patch_hub_status(&self, name: &str, status: &CatalogHubStatus) -> Result<()>;
}

/// Real Kubernetes-backed store.
///
/// Catalog sources live in the marketplace namespace; the hub is
/// cluster-scoped.
pub struct KubeCatalogStore {
    sources: Api<CatalogSource>,
    hubs: Api<CatalogHub>,
}

impl KubeCatalogStore {
    /// Create a store bound to the given namespace for catalog sources.
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            sources: Api::namespaced(client.clone(), namespace),
            hubs: Api::all(client),
        }
    }
}

fn is_not_found(err: &kube::Error) -> bool {
    matches!(err, kube::Error::Api(ae) if ae.code == 404)
}

#[async_trait]
impl CatalogStore for KubeCatalogStore {
    async fn get_catalog_source(&self, name: &str) -> Result<Option<CatalogSource>> {
        match self.sources.get(name).await {
            Ok(source) => Ok(Some(source)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_catalog_source(&self, source: &CatalogSource) -> Result<()> {
        self.sources.create(&PostParams::default(), source).await?;
        Ok(())
    }

    async fn update_catalog_source_spec(
        &self,
        name: &str,
        spec: &CatalogSourceSpec,
    ) -> Result<()> {
        let patch = serde_json::json!({ "spec": spec });
        self.sources
            .patch(name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn delete_catalog_source(&self, name: &str) -> Result<()> {
        match self.sources.delete(name, &DeleteParams::default()).await {
            Ok(_) => Ok(()),
            Err(err) if is_not_found(&err) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn get_hub(&self) -> Result<Option<CatalogHub>> {
        match self.hubs.get(DEFAULT_HUB_NAME).await {
            Ok(hub) => Ok(Some(hub)),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn patch_hub_status(&self, name: &str, status: &CatalogHubStatus) -> Result<()> {
        let patch = serde_json::json!({ "status": status });
        self.hubs
            .patch_status(name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}
