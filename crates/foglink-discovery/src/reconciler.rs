//! Registry ↔ discovery status reconciliation
//!
//! The registry is updated by single-instance probes, the discovery cache by
//! bulk passes. Every flow here ends with the registry pulled from the
//! cache, so once a call returns, an instance's `last_status` is `success`
//! exactly when it appears in [`DiscoveryOrchestrator::available`].

use foglink_common::endpoint::{is_loopback, normalize_url};
use foglink_common::now_millis;
use foglink_common::protocol::error::{FoglinkError, Result};
use foglink_registry::{AddOptions, InstanceStatus, MetaPatch};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::orchestrator::{DiscoveredEndpoint, DiscoveryOrchestrator};
use crate::prober::ProbeResult;

/// Invoked after the registry changed, e.g. to re-render a view.
pub type ChangeCallback = Arc<dyn Fn() + Send + Sync>;

const NOT_DISCOVERED: &str = "not reachable in the latest discovery pass";
const PROXY_DOWN: &str = "not reachable: proxy unavailable";

pub struct StatusReconciler {
    orchestrator: Arc<DiscoveryOrchestrator>,
    on_change: Option<ChangeCallback>,
}

impl StatusReconciler {
    pub fn new(orchestrator: Arc<DiscoveryOrchestrator>) -> Self {
        Self {
            orchestrator,
            on_change: None,
        }
    }

    pub fn with_callback(mut self, on_change: ChangeCallback) -> Self {
        self.on_change = Some(on_change);
        self
    }

    pub fn orchestrator(&self) -> &Arc<DiscoveryOrchestrator> {
        &self.orchestrator
    }

    /// Copies the discovery cache into the registry.
    ///
    /// Instances with an accessible entry become `success` with that entry's
    /// latency and host name. All others become `failed`. A non-loopback
    /// instance on a sandboxed host with the relay down is always reported
    /// as such; otherwise a reason recorded by an earlier failed probe is kept.
    pub async fn pull_from_discovery(&self) {
        let available = self.orchestrator.available();
        let mut reachable: HashMap<&str, &DiscoveredEndpoint> = HashMap::new();
        for endpoint in &available {
            // available() is priority-ordered, so the first entry wins
            reachable.entry(endpoint.instance_url.as_str()).or_insert(endpoint);
        }

        let proxy_down = self.orchestrator.environment().is_sandboxed()
            && !self.orchestrator.proxy().is_available();
        let now = now_millis();

        {
            let mut registry = self.orchestrator.registry().write().await;
            for instance in registry.instances() {
                let patch = match reachable.get(instance.url.as_str()) {
                    Some(endpoint) => MetaPatch::success(
                        endpoint.latency_ms,
                        endpoint.remote_host_name.clone(),
                        now,
                    ),
                    None => {
                        let reason = match (&instance.last_status, &instance.last_error) {
                            _ if proxy_down && !is_loopback(&instance.url) => PROXY_DOWN.to_string(),
                            (InstanceStatus::Failed, Some(err)) => err.clone(),
                            _ => NOT_DISCOVERED.to_string(),
                        };
                        MetaPatch::failure(reason, now)
                    }
                };
                registry.update_meta(&instance.url, patch);
            }
        }

        debug!("Pulled {} reachable instances into the registry", reachable.len());
        self.notify();
    }

    /// Re-runs discovery so the cache reflects the latest probe outcomes.
    pub async fn push_to_discovery(&self) -> Vec<DiscoveredEndpoint> {
        self.orchestrator.discover().await
    }

    /// Probes one registered instance and reconciles both directions.
    ///
    /// # Errors
    /// [`FoglinkError::Validation`] if `url` is malformed or not registered.
    /// Probe failures are reported through the returned [`ProbeResult`].
    pub async fn probe_instance(&self, url: &str) -> Result<ProbeResult> {
        let url = normalize_url(url)?;
        {
            let mut registry = self.orchestrator.registry().write().await;
            if !registry.contains(&url) {
                return Err(FoglinkError::Validation(format!("{} is not registered", url)));
            }
            registry.update_meta(&url, MetaPatch::new().status(InstanceStatus::Checking));
        }
        self.notify();

        let result = self.orchestrator.probe_endpoint(&url).await;
        self.record(&url, &result).await;
        match result.error_message() {
            None => info!("{} reachable via {} in {:?}ms", url, result.method, result.latency_ms),
            Some(reason) => warn!("{} not reachable via {}: {}", url, result.method, reason),
        }

        self.push_to_discovery().await;
        self.pull_from_discovery().await;
        Ok(result)
    }

    /// Bulk discovery followed by a pull into the registry.
    pub async fn discover_all(&self) -> Vec<DiscoveredEndpoint> {
        let view = self.orchestrator.discover().await;
        self.pull_from_discovery().await;
        view
    }

    /// Registers an instance, optionally probing it first.
    ///
    /// With `validate`, an unreachable instance is not registered and the
    /// probe's reason is returned as [`FoglinkError::ProbeUnreachable`]. A
    /// successful validation is recorded and then reconciled like
    /// [`probe_instance`](Self::probe_instance).
    pub async fn register(&self, url: &str, options: AddOptions, validate: bool) -> Result<String> {
        let normalized = normalize_url(url)?;
        let probe = if validate {
            let result = self.orchestrator.probe_endpoint(&normalized).await;
            if let Some(reason) = result.error_message() {
                return Err(FoglinkError::ProbeUnreachable(format!(
                    "{} failed validation: {}",
                    normalized, reason
                )));
            }
            Some(result)
        } else {
            None
        };

        let added = self.orchestrator.registry().write().await.try_add(url, options)?;
        match probe {
            Some(result) => {
                self.record(&added, &result).await;
                self.push_to_discovery().await;
                self.pull_from_discovery().await;
            }
            None => self.notify(),
        }
        Ok(added)
    }

    async fn record(&self, url: &str, result: &ProbeResult) {
        let now = now_millis();
        let patch = match result.error_message() {
            None => MetaPatch::success(result.latency_ms, result.remote_host_name.clone(), now),
            Some(reason) => MetaPatch::failure(reason, now),
        };
        self.orchestrator.registry().write().await.update_meta(url, patch);
    }

    fn notify(&self) {
        if let Some(on_change) = &self.on_change {
            on_change();
        }
    }
}
