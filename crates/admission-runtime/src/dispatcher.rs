//! Request Dispatcher (spec §4.4, component C4).
//!
//! Fans an incoming request out to every plugin that declares interest in
//! its `{operation, kind}`, mutators first, then validators, and stops at
//! the first forbid. The dispatcher is stateless per request; the only
//! shared state is the readiness gate and the plugins' own immutable
//! wiring (spec §5).

use std::sync::Arc;
use std::time::Duration;

use admission_core::cache::ReadinessGate;
use admission_core::error::Forbid;
use admission_core::model::Operation;
use tracing::instrument;

use crate::plugin::{Plugin, RawRequest};

/// Fans requests out to an ordered, already-initialized set of plugins.
pub struct Dispatcher {
    plugins: Vec<Arc<dyn Plugin>>,
    readiness: ReadinessGate,
}

impl Dispatcher {
    pub fn new(plugins: Vec<Arc<dyn Plugin>>, readiness: ReadinessGate) -> Self {
        Self { plugins, readiness }
    }

    fn interested(&self, request: &RawRequest) -> impl Iterator<Item = &Arc<dyn Plugin>> {
        self.plugins
            .iter()
            .filter(move |plugin| plugin.handles(request.operation) && plugin.interested_kinds().contains(&request.kind.as_str()))
    }

    /// Blocks (by polling) until the readiness gate flips, then admits the
    /// request. Transports with their own deadline should race this against
    /// `tokio::time::timeout` themselves; the dispatcher never silently
    /// admits a request while not ready, no matter how long that takes.
    pub async fn wait_until_ready(&self, poll_interval: Duration) {
        self.readiness.wait_until_ready(poll_interval).await;
    }

    /// Dispatches one request. Returns the (possibly mutated) request on
    /// success, or the first forbid encountered. `NotReady` is returned
    /// immediately without invoking any plugin (spec §4.4).
    #[instrument(skip(self, request), fields(operation = ?request.operation, kind = %request.kind, namespace = %request.namespace, name = %request.name))]
    pub fn dispatch(&self, mut request: RawRequest) -> Result<RawRequest, Forbid> {
        if !self.readiness.ready() {
            tracing::debug!("rejecting request: caches not yet synced");
            return Err(Forbid::not_ready());
        }

        for plugin in self.interested(&request) {
            let forbid = plugin.admit(&mut request);
            if !forbid.is_empty() {
                tracing::debug!(plugin = plugin.name(), %forbid, "mutator forbid short-circuited dispatch");
                return Err(forbid);
            }
        }

        for plugin in self.interested(&request) {
            let forbid = plugin.validate(&request);
            if !forbid.is_empty() {
                tracing::debug!(plugin = plugin.name(), %forbid, "validator forbid short-circuited dispatch");
                return Err(forbid);
            }
        }

        Ok(request)
    }
}
