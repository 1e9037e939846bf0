//! Discovery fan-out, ranking and failover dispatch
//!
//! A discovery pass probes every registered instance along the routes the
//! environment allows, ranks the reachable ones and swaps the result in as a
//! new cache generation. Readers always see either the previous generation or
//! the new one in full.

use foglink_common::endpoint::{is_loopback, join_path, normalize_url, proxy_path_token};
use foglink_common::protocol::error::{FoglinkError, Result};
use foglink_common::protocol::ProbeMethod;
use foglink_common::transport::{HttpReply, Transport};
use foglink_registry::InstanceRegistry;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock as StdRwLock};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::environment::{Environment, EnvironmentDetector, Strategy};
use crate::prober::{ConnectivityProber, DirectRoute, ProbeFailure, ProbeResult, ProbeRoute, RelayRoute};
use crate::proxy::{build_relay_config, ProxyProber};
use crate::status::ConnectionStatus;

/// One reachable route to a registered instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredEndpoint {
    /// Instance label
    pub name: String,
    /// Base URL requests are sent to (the relay route for proxied entries)
    pub url: String,
    /// Registered URL of the instance behind `url`
    pub instance_url: String,
    pub accessible: bool,
    pub method: ProbeMethod,
    pub latency_ms: Option<u64>,
    pub remote_health: Option<String>,
    pub remote_host_name: Option<String>,
    /// Lower is preferred
    pub priority: u32,
}

/// A route queued for probing in one pass.
struct Candidate {
    index: usize,
    name: String,
    instance_url: String,
    route: Arc<dyn ProbeRoute>,
}

#[derive(Default)]
struct CacheGeneration {
    generation: u64,
    endpoints: Arc<Vec<DiscoveredEndpoint>>,
}

/// Orchestrates discovery passes over a shared registry.
pub struct DiscoveryOrchestrator {
    registry: Arc<RwLock<InstanceRegistry>>,
    detector: Arc<EnvironmentDetector>,
    proxy: Arc<ProxyProber>,
    prober: ConnectivityProber,
    transport: Arc<dyn Transport>,
    config: DiscoveryConfig,
    cache: StdRwLock<CacheGeneration>,
}

impl DiscoveryOrchestrator {
    pub fn new(
        registry: Arc<RwLock<InstanceRegistry>>,
        detector: Arc<EnvironmentDetector>,
        transport: Arc<dyn Transport>,
        config: DiscoveryConfig,
    ) -> Self {
        let proxy = Arc::new(ProxyProber::new(transport.clone(), config.proxy.clone()));
        let prober = ConnectivityProber::new(transport.clone(), config.probe.clone());
        Self {
            registry,
            detector,
            proxy,
            prober,
            transport,
            config,
            cache: StdRwLock::new(CacheGeneration::default()),
        }
    }

    pub fn registry(&self) -> &Arc<RwLock<InstanceRegistry>> {
        &self.registry
    }

    pub fn proxy(&self) -> &ProxyProber {
        &self.proxy
    }

    pub fn prober(&self) -> &ConnectivityProber {
        &self.prober
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Environment classification for this session.
    pub fn environment(&self) -> Environment {
        self.detector.detect()
    }

    /// Runs one discovery pass and replaces the cache with its result.
    pub async fn discover(&self) -> Vec<DiscoveredEndpoint> {
        let instances: Vec<(String, String)> = {
            let registry = self.registry.read().await;
            registry
                .instances()
                .into_iter()
                .map(|i| {
                    let label = i.label();
                    (i.url, label)
                })
                .collect()
        };

        if instances.is_empty() {
            debug!("No registered instances, nothing to discover");
            self.swap(Vec::new());
            return Vec::new();
        }

        let environment = self.detector.detect();
        let mut candidates = Vec::new();

        match environment.strategy {
            Strategy::Direct => {
                for (index, (url, name)) in instances.iter().enumerate() {
                    candidates.push(direct_candidate(index, url, name));
                }
            }
            Strategy::ProxyFallback => {
                let desired = build_relay_config(instances.iter().map(|(url, _)| url));
                if self.proxy.check_availability(&desired).await {
                    for (token, upstream) in self.proxy.routes() {
                        let upstream = normalize_url(&upstream).unwrap_or(upstream);
                        let Some(index) = instances.iter().position(|(url, _)| *url == upstream)
                        else {
                            debug!("Relay route {} maps to unregistered {}", token, upstream);
                            continue;
                        };
                        candidates.push(Candidate {
                            index,
                            name: instances[index].1.clone(),
                            instance_url: upstream,
                            route: Arc::new(RelayRoute::new(self.proxy.relay_url(), token)),
                        });
                    }
                } else {
                    info!("Relay unavailable, probing loopback instances only");
                }

                for (index, (url, name)) in instances.iter().enumerate() {
                    if is_loopback(url) {
                        candidates.push(direct_candidate(index, url, name));
                    }
                }
            }
        }

        let outcomes = self.probe_all(candidates).await;
        let view = rank(instances.len(), outcomes);

        info!(
            "Discovery found {} of {} instances reachable ({})",
            view.len(),
            instances.len(),
            environment
        );
        self.swap(view.clone());
        view
    }

    /// Probes every candidate concurrently; one failing probe never aborts
    /// the others.
    async fn probe_all(&self, candidates: Vec<Candidate>) -> Vec<(Candidate, ProbeResult)> {
        let handles: Vec<_> = candidates
            .iter()
            .map(|candidate| {
                let prober = self.prober.clone();
                let route = candidate.route.clone();
                tokio::spawn(async move { prober.probe(route.as_ref()).await })
            })
            .collect();

        let results = futures::future::join_all(handles).await;

        candidates
            .into_iter()
            .zip(results)
            .map(|(candidate, joined)| {
                let result = joined.unwrap_or_else(|e| {
                    warn!("Probe task for {} failed: {}", candidate.instance_url, e);
                    ProbeResult::failed(
                        candidate.route.method(),
                        ProbeFailure::Unreachable(format!("probe task failed: {}", e)),
                    )
                });
                (candidate, result)
            })
            .collect()
    }

    /// Probes a single registered URL along the route the environment allows.
    ///
    /// Loopback instances and trusted hosts are probed directly. Any other
    /// instance on a sandboxed host goes through the relay, and fails with
    /// [`ProbeFailure::ProxyUnavailable`] when the relay is down.
    pub async fn probe_endpoint(&self, url: &str) -> ProbeResult {
        if !self.detector.detect().is_sandboxed() || is_loopback(url) {
            return self.prober.probe_direct(url).await;
        }

        let desired = {
            let registry = self.registry.read().await;
            let mut urls = registry.urls().to_vec();
            if !urls.iter().any(|u| u == url) {
                urls.push(url.to_string());
            }
            build_relay_config(&urls)
        };
        if !self.proxy.check_availability(&desired).await {
            return ProbeResult::failed(ProbeMethod::Proxy, ProbeFailure::ProxyUnavailable);
        }

        let token = self
            .proxy
            .routes()
            .into_iter()
            .find(|(_, upstream)| normalize_url(upstream).as_deref().unwrap_or(upstream.as_str()) == url)
            .map(|(token, _)| token)
            .unwrap_or_else(|| proxy_path_token(url));
        self.prober.probe_via_relay(self.proxy.relay_url(), &token).await
    }

    /// Full cache of the current generation, ranked.
    pub fn cached(&self) -> Arc<Vec<DiscoveredEndpoint>> {
        self.snapshot().1
    }

    /// Accessible entries sorted by ascending priority.
    pub fn available(&self) -> Vec<DiscoveredEndpoint> {
        let mut available: Vec<DiscoveredEndpoint> = self
            .cached()
            .iter()
            .filter(|e| e.accessible)
            .cloned()
            .collect();
        available.sort_by_key(|e| e.priority);
        available
    }

    /// Preferred endpoint, if any is reachable.
    pub fn best(&self) -> Option<DiscoveredEndpoint> {
        self.available().into_iter().next()
    }

    /// Sends `GET path` to the best endpoint, failing over in priority order.
    ///
    /// Each endpoint that fails is marked inaccessible in the current cache
    /// generation so later selections skip it.
    ///
    /// # Errors
    /// [`FoglinkError::NoEndpointReachable`] when every endpoint failed or
    /// none was available.
    pub async fn dispatch(&self, path: &str) -> Result<HttpReply> {
        let (generation, _) = self.snapshot();
        let candidates = self.available();
        if candidates.is_empty() {
            return Err(FoglinkError::NoEndpointReachable(
                "no accessible endpoints, run discovery first".to_string(),
            ));
        }

        let attempted = candidates.len();
        for endpoint in candidates {
            let url = join_path(&endpoint.url, path);
            match self.transport.get(&url, self.config.request_timeout).await {
                Ok(reply) if reply.is_success() => {
                    debug!("Dispatched {} via {} ({})", path, endpoint.name, endpoint.method);
                    return Ok(reply);
                }
                Ok(reply) => warn!("{} answered HTTP {}, failing over", url, reply.status),
                Err(e) => warn!("{} failed, failing over: {}", url, e),
            }
            self.mark_inaccessible(generation, &endpoint.url);
        }

        Err(FoglinkError::NoEndpointReachable(format!(
            "all {} endpoints failed for {}",
            attempted, path
        )))
    }

    /// Aggregate reachability with a remedy suggestion.
    pub async fn connection_status(&self) -> ConnectionStatus {
        let total = self.registry.read().await.len();
        let available = self.available();
        let mut reachable: Vec<&str> = available.iter().map(|e| e.instance_url.as_str()).collect();
        reachable.dedup();

        ConnectionStatus::new(
            self.detector.detect(),
            self.proxy.is_available(),
            self.proxy.relay_url(),
            total,
            reachable.len(),
            available.first().map(|e| e.url.clone()),
        )
    }

    fn snapshot(&self) -> (u64, Arc<Vec<DiscoveredEndpoint>>) {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        (cache.generation, cache.endpoints.clone())
    }

    fn swap(&self, endpoints: Vec<DiscoveredEndpoint>) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        cache.generation += 1;
        cache.endpoints = Arc::new(endpoints);
    }

    /// Copy-on-write update of one entry; ignored if a newer pass replaced
    /// the generation the failure was observed in.
    fn mark_inaccessible(&self, generation: u64, url: &str) {
        let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
        if cache.generation != generation {
            debug!("Cache moved on, not marking {}", url);
            return;
        }
        let mut next = cache.endpoints.as_ref().clone();
        for endpoint in next.iter_mut().filter(|e| e.url == url) {
            endpoint.accessible = false;
        }
        cache.endpoints = Arc::new(next);
    }
}

fn direct_candidate(index: usize, url: &str, name: &str) -> Candidate {
    Candidate {
        index,
        name: name.to_string(),
        instance_url: url.to_string(),
        route: Arc::new(DirectRoute::new(url)),
    }
}

/// Keeps one accessible entry per instance and orders them.
///
/// Loopback-direct entries rank by registration index; everything else ranks
/// by registration index offset past all of them.
fn rank(instance_count: usize, outcomes: Vec<(Candidate, ProbeResult)>) -> Vec<DiscoveredEndpoint> {
    let offset = instance_count as u32;
    let mut best: BTreeMap<String, DiscoveredEndpoint> = BTreeMap::new();

    for (candidate, result) in outcomes {
        if !result.accessible {
            continue;
        }
        let loopback_direct =
            result.method == ProbeMethod::Direct && is_loopback(&candidate.instance_url);
        let priority = candidate.index as u32 + if loopback_direct { 0 } else { offset };

        if best
            .get(&candidate.instance_url)
            .is_some_and(|existing| existing.priority <= priority)
        {
            continue;
        }

        let endpoint = DiscoveredEndpoint {
            name: candidate.name,
            url: candidate.route.base_url(),
            instance_url: candidate.instance_url.clone(),
            accessible: true,
            method: result.method,
            latency_ms: result.latency_ms,
            remote_health: result.remote_health,
            remote_host_name: result.remote_host_name,
            priority,
        };
        best.insert(candidate.instance_url, endpoint);
    }

    let mut view: Vec<DiscoveredEndpoint> = best.into_values().collect();
    view.sort_by_key(|e| e.priority);
    view
}
