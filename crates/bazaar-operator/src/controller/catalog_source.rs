//! Catalog-source control loop: filter and reconciler.

use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::debug;

use bazaar_common::crd::CatalogSource;
use bazaar_common::Result;

use crate::defaults::Defaults;
use crate::registry::DefaultRegistry;
use crate::state::HubState;
use crate::store::CatalogStore;
use crate::watch::EventFilter;

use super::Reconcile;

/// Relevance policy for catalog-source events.
///
/// Only default sources matter, and only once they can have drifted: a
/// brand-new object needs no restorative action, and a state-unknown delete
/// is ignored because converging against an unconfirmed deletion risks a
/// delete-then-recreate race with no guaranteed ordering.
pub struct CatalogSourceFilter {
    registry: Arc<DefaultRegistry>,
}

impl CatalogSourceFilter {
    /// Build the filter over the default registry.
    pub fn new(registry: Arc<DefaultRegistry>) -> Self {
        Self { registry }
    }
}

impl EventFilter<CatalogSource> for CatalogSourceFilter {
    fn create(&self, _obj: &CatalogSource) -> bool {
        false
    }

    fn update(&self, old: &CatalogSource, _new: &CatalogSource) -> bool {
        self.registry.contains(&old.name_any())
    }

    fn delete(&self, obj: &CatalogSource, state_unknown: bool) -> bool {
        if state_unknown {
            return false;
        }
        self.registry.contains(&obj.name_any())
    }

    fn generic(&self, obj: &CatalogSource) -> bool {
        self.registry.contains(&obj.name_any())
    }
}

/// Converges one catalog source against the registry and the hub state.
pub struct CatalogSourceReconciler {
    registry: Arc<DefaultRegistry>,
    state: Arc<HubState>,
    store: Arc<dyn CatalogStore>,
}

impl CatalogSourceReconciler {
    /// Wire the reconciler to its collaborators.
    pub fn new(
        registry: Arc<DefaultRegistry>,
        state: Arc<HubState>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            registry,
            state,
            store,
        }
    }
}

#[async_trait]
impl Reconcile for CatalogSourceReconciler {
    async fn reconcile(&self, name: &str) -> Result<()> {
        debug!(source = name, "reconciling catalog source");
        Defaults::new(&self.registry, self.state.disabled())
            .ensure(self.store.as_ref(), name)
            .await
    }
}
