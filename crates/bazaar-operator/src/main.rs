//! Bazaar Operator - default catalog source lifecycle management

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::Parser;
use kube::{Client, CustomResourceExt};

use bazaar_common::crd::{CatalogHub, CatalogSource};
use bazaar_common::telemetry::{init_telemetry, TelemetryConfig};
use bazaar_common::{FIELD_MANAGER, MARKETPLACE_NAMESPACE};
use bazaar_operator::controller::hub::disabled_sources;
use bazaar_operator::defaults::Defaults;
use bazaar_operator::registry::DefaultRegistry;
use bazaar_operator::runner::{build_catalog_loop, build_hub_loop, hub_api_available};
use bazaar_operator::state::HubState;
use bazaar_operator::store::{CatalogStore, KubeCatalogStore};

/// Bazaar - keeps default catalog sources converged with the cluster hub policy
#[derive(Parser, Debug)]
#[command(name = "bazaar-operator", version, about, long_about = None)]
struct Cli {
    /// Generate CRD manifests and exit
    #[arg(long)]
    crd: bool,

    /// Namespace where default catalog sources are managed
    #[arg(long, default_value = MARKETPLACE_NAMESPACE)]
    namespace: String,

    /// Directory of CatalogSource manifests defining the defaults
    #[arg(long)]
    defaults_dir: Option<PathBuf>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        print!("{}", serde_yaml::to_string(&CatalogSource::crd())?);
        println!("---");
        print!("{}", serde_yaml::to_string(&CatalogHub::crd())?);
        return Ok(());
    }

    init_telemetry(&TelemetryConfig {
        service_name: "bazaar-operator".to_string(),
        json: cli.log_json,
    })?;

    let registry = Arc::new(match &cli.defaults_dir {
        Some(dir) => DefaultRegistry::load_dir(dir)?,
        None => {
            tracing::warn!("no --defaults-dir given; operator owns no default catalog sources");
            DefaultRegistry::empty()
        }
    });
    tracing::info!(
        defaults = registry.len(),
        namespace = %cli.namespace,
        "loaded default registry"
    );

    let client = Client::try_default().await?;
    ensure_crds_installed(&client).await?;

    let state = Arc::new(HubState::new());
    let store: Arc<dyn CatalogStore> =
        Arc::new(KubeCatalogStore::new(client.clone(), &cli.namespace));

    // Seed hub state from the current cluster policy before the loops start,
    // then converge once: initial watch observations are creates, which the
    // catalog filter ignores, so boot-time drift is repaired here.
    let hub_available = hub_api_available(&client).await;
    if hub_available {
        if let Some(hub) = store.get_hub().await? {
            state.replace(disabled_sources(&hub.spec, &registry));
        }
    }
    Defaults::new(&registry, state.disabled())
        .ensure_all(store.as_ref())
        .await
        .context("initial convergence of default catalog sources failed")?;

    tracing::info!("starting control loops:");
    let mut loops = vec![build_catalog_loop(
        client.clone(),
        &cli.namespace,
        registry.clone(),
        state.clone(),
        store.clone(),
    )];
    if hub_available {
        loops.push(build_hub_loop(client, registry, state, store));
    } else {
        tracing::warn!("CatalogHub API not available; hub configuration loop disabled");
    }

    tokio::select! {
        _ = futures::future::join_all(loops) => {}
        _ = shutdown_signal() => tracing::info!("shutdown signal received"),
    }
    Ok(())
}

/// Install the CatalogSource CRD with server-side apply.
///
/// The CatalogHub CRD is deliberately not installed here: the hub kind is a
/// cluster capability owned elsewhere, and the operator adapts to its
/// absence.
async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
    use kube::api::{Api, Patch, PatchParams};

    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    tracing::info!("Installing CatalogSource CRD...");
    crds.patch(
        "catalogsources.bazaar.dev",
        &params,
        &Patch::Apply(&CatalogSource::crd()),
    )
    .await
    .context("failed to install CatalogSource CRD")?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
