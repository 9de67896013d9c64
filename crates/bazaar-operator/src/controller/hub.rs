//! Hub-configuration control loop: filter, policy derivation, and handler.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use kube::ResourceExt;
use tracing::{debug, info, warn};

use bazaar_common::crd::{
    CatalogHub, CatalogHubSpec, CatalogHubStatus, HubSourceStatus, SourceOutcome,
};
use bazaar_common::{Error, Result, DEFAULT_HUB_NAME};

use crate::defaults::Defaults;
use crate::registry::DefaultRegistry;
use crate::state::HubState;
use crate::store::CatalogStore;
use crate::watch::EventFilter;

use super::Reconcile;

/// Relevance policy for hub-configuration events.
///
/// The hub kind is cluster-scoped with exactly one meaningful name; events
/// for any other name are rejected outright.
pub struct HubFilter;

impl EventFilter<CatalogHub> for HubFilter {
    fn create(&self, obj: &CatalogHub) -> bool {
        obj.name_any() == DEFAULT_HUB_NAME
    }

    fn update(&self, old: &CatalogHub, _new: &CatalogHub) -> bool {
        old.name_any() == DEFAULT_HUB_NAME
    }

    fn delete(&self, obj: &CatalogHub, state_unknown: bool) -> bool {
        if state_unknown {
            return false;
        }
        obj.name_any() == DEFAULT_HUB_NAME
    }

    fn generic(&self, obj: &CatalogHub) -> bool {
        obj.name_any() == DEFAULT_HUB_NAME
    }
}

/// Derive the disabled-name partition of the registry from a hub spec.
///
/// `disableAllDefaultSources` seeds every registry name; per-source entries
/// override it in either direction. Entries naming unknown sources are
/// dropped.
pub fn disabled_sources(spec: &CatalogHubSpec, registry: &DefaultRegistry) -> BTreeSet<String> {
    let mut disabled: BTreeSet<String> = if spec.disable_all_default_sources {
        registry.names().map(str::to_string).collect()
    } else {
        BTreeSet::new()
    };

    for source in &spec.sources {
        if !registry.contains(&source.name) {
            debug!(source = %source.name, "hub names a source the operator does not own, ignoring");
            continue;
        }
        if source.disabled {
            disabled.insert(source.name.clone());
        } else {
            disabled.remove(&source.name);
        }
    }
    disabled
}

/// Applies a hub configuration: shared state, cluster convergence, status.
pub struct HubHandler {
    registry: Arc<DefaultRegistry>,
    state: Arc<HubState>,
    store: Arc<dyn CatalogStore>,
}

impl HubHandler {
    /// Wire the handler to its collaborators.
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

    /// Apply one observed hub configuration.
    ///
    /// Shared state is replaced before any cluster write: the derivation is
    /// deterministic, so a retried batch recomputes the same partition and
    /// re-attempts only the cluster writes. Every registry name is converged
    /// (a superset of the names whose status changed); unchanged names are
    /// read-only no-ops. The per-source outcome is written to the hub status
    /// and the first convergence error is returned for retry.
    pub async fn handle(&self, hub: &CatalogHub) -> Result<()> {
        let disabled = disabled_sources(&hub.spec, &self.registry);
        let previous = self.state.replace(disabled.clone());
        if previous != disabled {
            info!(
                disabled = ?disabled,
                was = ?previous,
                "hub policy changed"
            );
        }

        let defaults = Defaults::new(&self.registry, disabled.clone());
        let mut sources = Vec::new();
        let mut first_err: Option<Error> = None;

        for name in self.registry.names() {
            let is_disabled = disabled.contains(name);
            match defaults.ensure(self.store.as_ref(), name).await {
                Ok(()) => sources.push(HubSourceStatus {
                    name: name.to_string(),
                    disabled: is_disabled,
                    status: SourceOutcome::Success,
                    message: None,
                }),
                Err(err) => {
                    warn!(source = name, error = %err, "failed to converge default catalog source");
                    sources.push(HubSourceStatus {
                        name: name.to_string(),
                        disabled: is_disabled,
                        status: SourceOutcome::Error,
                        message: Some(err.to_string()),
                    });
                    first_err.get_or_insert(err);
                }
            }
        }

        let status = CatalogHubStatus { sources };
        if let Err(err) = self.store.patch_hub_status(&hub.name_any(), &status).await {
            warn!(error = %err, "failed to patch hub status");
            first_err.get_or_insert(err);
        }

        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Reconciles the singleton hub object on a relevant event.
pub struct HubReconciler {
    store: Arc<dyn CatalogStore>,
    handler: HubHandler,
}

impl HubReconciler {
    /// Wire the reconciler to its collaborators.
    pub fn new(
        registry: Arc<DefaultRegistry>,
        state: Arc<HubState>,
        store: Arc<dyn CatalogStore>,
    ) -> Self {
        Self {
            store: store.clone(),
            handler: HubHandler::new(registry, state, store),
        }
    }
}

#[async_trait]
impl Reconcile for HubReconciler {
    async fn reconcile(&self, name: &str) -> Result<()> {
        info!(hub = name, "reconciling hub configuration");
        // The object may have been deleted after the event fired.
        let Some(hub) = self.store.get_hub().await? else {
            debug!(hub = name, "hub configuration absent, nothing to apply");
            return Ok(());
        };
        self.handler.handle(&hub).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{definition, FakeStore};
    use crate::watch::Event;

    fn registry() -> Arc<DefaultRegistry> {
        Arc::new(
            DefaultRegistry::from_definitions(vec![
                definition("community", "img:v1"),
                definition("certified", "img:v2"),
            ])
            .expect("registry"),
        )
    }

    fn hub(spec: CatalogHubSpec) -> CatalogHub {
        CatalogHub::new(DEFAULT_HUB_NAME, spec)
    }

    fn overrides(entries: &[(&str, bool)]) -> CatalogHubSpec {
        CatalogHubSpec {
            disable_all_default_sources: false,
            sources: entries
                .iter()
                .map(|(name, disabled)| bazaar_common::crd::HubSourceOverride {
                    name: name.to_string(),
                    disabled: *disabled,
                })
                .collect(),
        }
    }

    mod filter {
        use super::*;

        #[test]
        fn test_only_the_singleton_name_is_relevant() {
            let filter = HubFilter;
            let singleton = hub(CatalogHubSpec::default());
            let impostor = CatalogHub::new("not-the-cluster", CatalogHubSpec::default());

            assert!(filter.relevant(&Event::Create {
                obj: singleton.clone()
            }));
            assert!(filter.relevant(&Event::Generic {
                obj: singleton.clone()
            }));
            assert!(filter.relevant(&Event::Delete {
                obj: singleton.clone(),
                state_unknown: false,
            }));
            assert!(filter.relevant(&Event::Update {
                old: singleton.clone(),
                new: singleton.clone(),
            }));

            assert!(!filter.relevant(&Event::Create {
                obj: impostor.clone()
            }));
            assert!(!filter.relevant(&Event::Generic {
                obj: impostor.clone()
            }));
            assert!(!filter.relevant(&Event::Update {
                old: impostor.clone(),
                new: impostor.clone(),
            }));
        }

        #[test]
        fn test_state_unknown_delete_is_suppressed() {
            let filter = HubFilter;
            assert!(!filter.relevant(&Event::Delete {
                obj: hub(CatalogHubSpec::default()),
                state_unknown: true,
            }));
        }
    }

    mod derivation {
        use super::*;

        fn set(names: &[&str]) -> BTreeSet<String> {
            names.iter().map(|n| n.to_string()).collect()
        }

        #[test]
        fn test_empty_spec_disables_nothing() {
            assert!(disabled_sources(&CatalogHubSpec::default(), &registry()).is_empty());
        }

        #[test]
        fn test_disable_all_covers_every_registry_name() {
            let spec = CatalogHubSpec {
                disable_all_default_sources: true,
                sources: Vec::new(),
            };
            assert_eq!(
                disabled_sources(&spec, &registry()),
                set(&["certified", "community"])
            );
        }

        #[test]
        fn test_override_wins_over_disable_all() {
            let spec = CatalogHubSpec {
                disable_all_default_sources: true,
                sources: overrides(&[("community", false)]).sources,
            };
            assert_eq!(disabled_sources(&spec, &registry()), set(&["certified"]));
        }

        #[test]
        fn test_per_source_disable() {
            let spec = overrides(&[("certified", true)]);
            assert_eq!(disabled_sources(&spec, &registry()), set(&["certified"]));
        }

        #[test]
        fn test_unknown_names_are_ignored() {
            let spec = overrides(&[("somebody-elses", true)]);
            assert!(disabled_sources(&spec, &registry()).is_empty());
        }
    }

    mod handler {
        use super::*;

        /// Hub disables certified: its object is deleted, community is left
        /// untouched, state and status both reflect the partition.
        #[tokio::test]
        async fn test_disable_removes_object_and_updates_state() {
            let store = Arc::new(FakeStore::with_sources(vec![
                definition("community", "img:v1"),
                definition("certified", "img:v2"),
            ]));
            let state = Arc::new(HubState::new());
            let handler = HubHandler::new(registry(), state.clone(), store.clone());

            handler
                .handle(&hub(overrides(&[("certified", true)])))
                .await
                .expect("handle");

            assert!(!store.snapshot().contains_key("certified"));
            assert_eq!(
                store.snapshot().get("community").map(|s| s.spec.clone()),
                Some(definition("community", "img:v1").spec)
            );
            assert!(state.is_disabled("certified"));
            assert!(!state.is_disabled("community"));

            let status = store.last_status().expect("status patched");
            let certified = status
                .sources
                .iter()
                .find(|s| s.name == "certified")
                .expect("certified status");
            assert!(certified.disabled);
            assert_eq!(certified.status, SourceOutcome::Success);
        }

        /// Disable then re-enable: the object comes back equal to its
        /// definition.
        #[tokio::test]
        async fn test_disable_then_enable_round_trip() {
            let store = Arc::new(FakeStore::with_sources(vec![
                definition("community", "img:v1"),
                definition("certified", "img:v2"),
            ]));
            let state = Arc::new(HubState::new());
            let handler = HubHandler::new(registry(), state.clone(), store.clone());

            handler
                .handle(&hub(overrides(&[("certified", true)])))
                .await
                .expect("disable");
            assert!(!store.snapshot().contains_key("certified"));

            handler
                .handle(&hub(overrides(&[("certified", false)])))
                .await
                .expect("enable");

            let recreated = store.snapshot().remove("certified").expect("recreated");
            assert_eq!(recreated.spec, definition("certified", "img:v2").spec);
            assert!(!state.is_disabled("certified"));
        }

        /// A mid-batch failure surfaces the error, but shared state was
        /// already replaced and the status covers every source.
        #[tokio::test]
        async fn test_failure_mid_batch_keeps_state_and_reports_status() {
            let store = Arc::new(FakeStore::with_sources(vec![
                definition("community", "img:v1"),
                definition("certified", "img:v2"),
            ]));
            *store.fail_delete_of.lock().expect("lock") = Some("certified".to_string());
            let state = Arc::new(HubState::new());
            let handler = HubHandler::new(registry(), state.clone(), store.clone());

            let err = handler
                .handle(&hub(overrides(&[("certified", true)])))
                .await
                .expect_err("delete failure surfaces");
            assert!(err.is_retryable());

            // Desired partition is durable in memory despite the failed write.
            assert!(state.is_disabled("certified"));

            let status = store.last_status().expect("status patched");
            let certified = status
                .sources
                .iter()
                .find(|s| s.name == "certified")
                .expect("certified status");
            assert_eq!(certified.status, SourceOutcome::Error);
            assert!(certified.message.is_some());
            let community = status
                .sources
                .iter()
                .find(|s| s.name == "community")
                .expect("community status");
            assert_eq!(community.status, SourceOutcome::Success);
        }

        /// Applying the same spec twice leaves the cluster unchanged.
        #[tokio::test]
        async fn test_handle_is_idempotent() {
            let store = Arc::new(FakeStore::with_sources(vec![definition(
                "community",
                "img:v1",
            )]));
            let state = Arc::new(HubState::new());
            let handler = HubHandler::new(registry(), state, store.clone());
            let spec = overrides(&[("certified", true)]);

            handler.handle(&hub(spec.clone())).await.expect("first");
            let after_first = store.snapshot();
            handler.handle(&hub(spec)).await.expect("second");
            assert_eq!(store.snapshot(), after_first);
        }
    }

    mod reconciler {
        use super::*;

        #[tokio::test]
        async fn test_absent_hub_object_is_a_noop() {
            let store = Arc::new(FakeStore::with_sources(vec![definition(
                "community",
                "img:v1",
            )]));
            let state = Arc::new(HubState::new());
            let reconciler = HubReconciler::new(registry(), state.clone(), store.clone());

            reconciler
                .reconcile(DEFAULT_HUB_NAME)
                .await
                .expect("noop on absent hub");

            // Nothing was converged or disabled.
            assert!(store.snapshot().contains_key("community"));
            assert!(state.disabled().is_empty());
            assert!(store.last_status().is_none());
        }

        #[tokio::test]
        async fn test_reconcile_applies_current_hub_spec() {
            let store = Arc::new(FakeStore::with_sources(vec![
                definition("community", "img:v1"),
                definition("certified", "img:v2"),
            ]));
            store.set_hub(hub(overrides(&[("community", true)])));
            let state = Arc::new(HubState::new());
            let reconciler = HubReconciler::new(registry(), state.clone(), store.clone());

            reconciler.reconcile(DEFAULT_HUB_NAME).await.expect("apply");

            assert!(!store.snapshot().contains_key("community"));
            assert!(store.snapshot().contains_key("certified"));
            assert!(state.is_disabled("community"));
        }
    }
}
