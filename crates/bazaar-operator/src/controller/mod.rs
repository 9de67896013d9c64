//! The control-loop engine and the two loop wirings.
//!
//! A [`ControlLoop`] is the registrable capability triple the rest of the
//! system plugs into: a watched resource kind, an event filter, and a
//! reconcile function. The engine turns the kind's watch stream into
//! classified events, applies the filter, and drains accepted names through
//! a work queue. Within one loop reconciles are strictly serialized, so at
//! most one convergence attempt per name is ever in flight; the two loops
//! run concurrently and coordinate only through the shared hub state.

pub mod catalog_source;
pub mod hub;

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use kube::api::Api;
use kube::runtime::{watcher, WatchStreamExt};
use kube::Resource;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use bazaar_common::backoff::Backoff;
use bazaar_common::Result;

use crate::watch::{Classifier, EventFilter};

/// A reconcile function: converge one name, or return a retryable error.
///
/// Implementations are pure with respect to their inputs beyond the cluster
/// store and shared hub state; they never retry internally.
#[async_trait]
pub trait Reconcile: Send + Sync {
    /// Converge the named resource toward its target state.
    async fn reconcile(&self, name: &str) -> Result<()>;
}

/// One registrable control loop over a watched resource kind.
pub struct ControlLoop<K> {
    /// Loop name used in logs.
    pub name: &'static str,
    /// The watched resource kind.
    pub api: Api<K>,
    /// Relevance policy applied before queueing.
    pub filter: Arc<dyn EventFilter<K>>,
    /// Convergence logic for accepted names.
    pub reconciler: Arc<dyn Reconcile>,
    /// Retry schedule for failed reconciles.
    pub backoff: Backoff,
}

impl<K> ControlLoop<K>
where
    K: Resource + Clone + DeserializeOwned + Debug + Send + Sync + 'static,
{
    /// Run the loop until the enclosing future is dropped (process shutdown).
    pub async fn run(self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let retry_tx = tx.downgrade();
        let watch = watch_and_filter(self.name, self.api, self.filter, tx);
        let work = drain_queue(self.name, self.reconciler, rx, retry_tx, self.backoff);
        tokio::join!(watch, work);
    }
}

/// Watch the kind, classify raw events, and queue names the filter accepts.
async fn watch_and_filter<K>(
    loop_name: &'static str,
    api: Api<K>,
    filter: Arc<dyn EventFilter<K>>,
    tx: mpsc::UnboundedSender<String>,
) where
    K: Resource + Clone + DeserializeOwned + Debug + Send + 'static,
{
    let mut classifier = Classifier::new();
    let mut stream = watcher(api, watcher::Config::default())
        .default_backoff()
        .boxed();

    while let Some(item) = stream.next().await {
        match item {
            Ok(raw) => {
                for event in classifier.classify(raw) {
                    if !filter.relevant(&event) {
                        continue;
                    }
                    let name = event.name();
                    debug!(
                        controller = loop_name,
                        event = event.kind(),
                        source = %name,
                        "queueing reconcile"
                    );
                    if tx.send(name).is_err() {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(controller = loop_name, error = %err, "watch stream error");
            }
        }
    }
}

/// Drain the work queue, serializing reconciles and re-enqueueing retryable
/// failures after a jittered backoff delay.
async fn drain_queue(
    loop_name: &'static str,
    reconciler: Arc<dyn Reconcile>,
    mut rx: mpsc::UnboundedReceiver<String>,
    retry_tx: mpsc::WeakUnboundedSender<String>,
    backoff: Backoff,
) {
    let mut attempts: HashMap<String, u32> = HashMap::new();

    while let Some(name) = rx.recv().await {
        match reconciler.reconcile(&name).await {
            Ok(()) => {
                attempts.remove(&name);
                debug!(controller = loop_name, source = %name, "reconcile complete");
            }
            Err(err) if err.is_retryable() => {
                let attempt = attempts
                    .entry(name.clone())
                    .and_modify(|a| *a += 1)
                    .or_insert(1);
                let delay = backoff.delay(*attempt);
                warn!(
                    controller = loop_name,
                    source = %name,
                    attempt = *attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "reconcile failed, requeueing"
                );
                if let Some(tx) = retry_tx.upgrade() {
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        let _ = tx.send(name);
                    });
                }
            }
            Err(err) => {
                error!(
                    controller = loop_name,
                    source = %name,
                    error = %err,
                    "reconcile failed permanently, dropping from queue"
                );
                attempts.remove(&name);
            }
        }
    }
}
