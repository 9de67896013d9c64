//! Builds the control-loop futures the operator runs.
//!
//! Each `build_*` function wires one resource kind's {api, filter,
//! reconciler} triple into a [`ControlLoop`] and returns it as a boxed
//! future for the caller to compose. Hub registration is gated on API
//! discovery: the hub kind is optional per cluster capability, and its
//! absence must not be an error.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use kube::api::Api;
use kube::discovery::Discovery;
use kube::Client;
use tracing::{info, warn};

use bazaar_common::backoff::Backoff;
use bazaar_common::crd::{CatalogHub, CatalogSource};
use bazaar_common::API_GROUP;

use crate::controller::catalog_source::{CatalogSourceFilter, CatalogSourceReconciler};
use crate::controller::hub::{HubFilter, HubReconciler};
use crate::controller::ControlLoop;
use crate::registry::DefaultRegistry;
use crate::state::HubState;
use crate::store::CatalogStore;

/// Boxed control-loop future, composed by the caller.
pub type LoopFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Build the catalog-source control loop.
pub fn build_catalog_loop(
    client: Client,
    namespace: &str,
    registry: Arc<DefaultRegistry>,
    state: Arc<HubState>,
    store: Arc<dyn CatalogStore>,
) -> LoopFuture {
    let api: Api<CatalogSource> = Api::namespaced(client, namespace);
    let control_loop = ControlLoop {
        name: "catalogsource",
        api,
        filter: Arc::new(CatalogSourceFilter::new(registry.clone())),
        reconciler: Arc::new(CatalogSourceReconciler::new(registry, state, store)),
        backoff: Backoff::default(),
    };

    info!("- CatalogSource control loop");
    Box::pin(control_loop.run())
}

/// Build the hub-configuration control loop.
///
/// Callers must gate this on [`hub_api_available`].
pub fn build_hub_loop(
    client: Client,
    registry: Arc<DefaultRegistry>,
    state: Arc<HubState>,
    store: Arc<dyn CatalogStore>,
) -> LoopFuture {
    let api: Api<CatalogHub> = Api::all(client);
    let control_loop = ControlLoop {
        name: "cataloghub",
        api,
        filter: Arc::new(HubFilter),
        reconciler: Arc::new(HubReconciler::new(registry, state, store)),
        backoff: Backoff::default(),
    };

    info!("- CatalogHub control loop");
    Box::pin(control_loop.run())
}

/// Whether this cluster serves the CatalogHub kind.
///
/// Runs a single API discovery pass. Discovery failure is reported as
/// unavailable rather than an error; the catalog-source loop keeps running
/// with whatever hub state exists.
pub async fn hub_api_available(client: &Client) -> bool {
    let discovery = match Discovery::new(client.clone()).run().await {
        Ok(discovery) => discovery,
        Err(err) => {
            warn!(error = %err, "API discovery failed; assuming CatalogHub is unavailable");
            return false;
        }
    };

    for group in discovery.groups() {
        if group.name() != API_GROUP {
            continue;
        }
        for (ar, _caps) in group.resources_by_stability() {
            if ar.kind == "CatalogHub" {
                return true;
            }
        }
    }
    false
}
