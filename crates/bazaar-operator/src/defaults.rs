//! Convergence of default catalog sources.
//!
//! [`Defaults`] pairs a registry snapshot with a disabled-name set and pushes
//! one name (or all of them) toward its target state: absent when disabled,
//! present and matching its definition otherwise. Every operation is
//! idempotent; running it twice without external mutation leaves the cluster
//! unchanged after the second run.

use std::collections::BTreeSet;

use tracing::{debug, info};

use bazaar_common::crd::CatalogSource;
use bazaar_common::Result;

use crate::registry::DefaultRegistry;
use crate::store::CatalogStore;

/// One convergence pass over the default registry.
pub struct Defaults<'a> {
    registry: &'a DefaultRegistry,
    disabled: BTreeSet<String>,
}

impl<'a> Defaults<'a> {
    /// Pair a registry with the disabled set to converge against.
    pub fn new(registry: &'a DefaultRegistry, disabled: BTreeSet<String>) -> Self {
        Self { registry, disabled }
    }

    /// Converge a single name.
    ///
    /// A name outside the registry is a stale queue entry, not a cluster
    /// problem: logged and treated as success. Store errors surface to the
    /// caller; the enclosing loop owns retries.
    pub async fn ensure(&self, store: &dyn CatalogStore, name: &str) -> Result<()> {
        let Some(definition) = self.registry.get(name) else {
            info!(source = name, "not a default catalog source, nothing to ensure");
            return Ok(());
        };

        if self.disabled.contains(name) {
            // Target is absence; the store treats deleting an absent object
            // as success.
            store.delete_catalog_source(name).await?;
            debug!(source = name, "disabled catalog source ensured absent");
            return Ok(());
        }

        match store.get_catalog_source(name).await? {
            None => {
                let fresh = CatalogSource::new(name, definition.spec.clone());
                store.create_catalog_source(&fresh).await?;
                info!(source = name, "created default catalog source");
            }
            Some(existing) if existing.spec == definition.spec => {
                debug!(source = name, "catalog source matches its definition");
            }
            Some(_) => {
                store
                    .update_catalog_source_spec(name, &definition.spec)
                    .await?;
                info!(source = name, "restored default catalog source spec");
            }
        }
        Ok(())
    }

    /// Converge every name in the registry, stopping at the first error.
    pub async fn ensure_all(&self, store: &dyn CatalogStore) -> Result<()> {
        for name in self.registry.names() {
            self.ensure(store, name).await?;
        }
        Ok(())
    }
}
