//! Single-endpoint reachability probe
//!
//! One bounded `GET` of the FogLAMP health path, either on the instance
//! itself or on the relay route that forwards to it. Every failure is
//! folded into a [`ProbeResult`]; nothing is raised past this module and
//! nothing is retried here.

use foglink_common::endpoint::join_path;
use foglink_common::protocol::error::FoglinkError;
use foglink_common::protocol::{PingResponse, ProbeMethod};
use foglink_common::transport::Transport;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::config::ProbeConfig;

/// Where a probe is sent.
pub trait ProbeRoute: Send + Sync {
    fn method(&self) -> ProbeMethod;

    /// Base address the health path is appended to.
    fn base_url(&self) -> String;
}

/// The instance's own address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectRoute {
    pub instance_url: String,
}

impl DirectRoute {
    pub fn new(instance_url: impl Into<String>) -> Self {
        Self {
            instance_url: instance_url.into(),
        }
    }
}

impl ProbeRoute for DirectRoute {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Direct
    }

    fn base_url(&self) -> String {
        self.instance_url.clone()
    }
}

/// The relay's forwarding path for one instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRoute {
    pub relay_url: String,
    pub token: String,
}

impl RelayRoute {
    pub fn new(relay_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            relay_url: relay_url.into(),
            token: token.into(),
        }
    }
}

impl ProbeRoute for RelayRoute {
    fn method(&self) -> ProbeMethod {
        ProbeMethod::Proxy
    }

    fn base_url(&self) -> String {
        join_path(&self.relay_url, &self.token)
    }
}

/// Why a probe did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeFailure {
    /// The bound elapsed (milliseconds)
    Timeout(u64),
    /// Refused, DNS, reset, or a non-success status
    Unreachable(String),
    /// Answered, but not with a FogLAMP ping body
    InvalidResponse(String),
    /// Sandboxed host and the relay is down
    ProxyUnavailable,
}

impl std::fmt::Display for ProbeFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProbeFailure::Timeout(ms) => write!(f, "timed out after {}ms", ms),
            ProbeFailure::Unreachable(msg) => write!(f, "unreachable: {}", msg),
            ProbeFailure::InvalidResponse(msg) => write!(f, "invalid response: {}", msg),
            ProbeFailure::ProxyUnavailable => write!(f, "proxy unavailable"),
        }
    }
}

impl From<FoglinkError> for ProbeFailure {
    fn from(err: FoglinkError) -> Self {
        match err {
            FoglinkError::ProbeTimeout(ms) => ProbeFailure::Timeout(ms),
            FoglinkError::InvalidResponse(msg) => ProbeFailure::InvalidResponse(msg),
            FoglinkError::ProxyUnavailable(_) => ProbeFailure::ProxyUnavailable,
            FoglinkError::ProbeUnreachable(msg) | FoglinkError::Transport(msg) => {
                ProbeFailure::Unreachable(msg)
            }
            other => ProbeFailure::Unreachable(other.to_string()),
        }
    }
}

/// Normalized probe outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub accessible: bool,
    pub method: ProbeMethod,
    /// Whole milliseconds, only set when accessible
    pub latency_ms: Option<u64>,
    pub remote_health: Option<String>,
    pub remote_host_name: Option<String>,
    pub error: Option<ProbeFailure>,
}

impl ProbeResult {
    pub fn reachable(method: ProbeMethod, latency_ms: u64, ping: PingResponse) -> Self {
        Self {
            accessible: true,
            method,
            latency_ms: Some(latency_ms),
            remote_health: ping.health,
            remote_host_name: ping.host_name,
            error: None,
        }
    }

    pub fn failed(method: ProbeMethod, failure: ProbeFailure) -> Self {
        Self {
            accessible: false,
            method,
            latency_ms: None,
            remote_health: None,
            remote_host_name: None,
            error: Some(failure),
        }
    }

    /// Failure reason as text, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Issues health probes through a shared [`Transport`].
#[derive(Clone)]
pub struct ConnectivityProber {
    transport: Arc<dyn Transport>,
    config: ProbeConfig,
}

impl ConnectivityProber {
    pub fn new(transport: Arc<dyn Transport>, config: ProbeConfig) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// Probes one route.
    pub async fn probe(&self, route: &dyn ProbeRoute) -> ProbeResult {
        let method = route.method();
        let url = join_path(&route.base_url(), &self.config.health_path);

        let started = Instant::now();
        let reply = match self.transport.get(&url, self.config.timeout).await {
            Ok(reply) => reply,
            Err(e) => {
                debug!("Probe {} ({}) failed: {}", url, method, e);
                return ProbeResult::failed(method, e.into());
            }
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        if !reply.is_success() {
            debug!("Probe {} ({}) returned HTTP {}", url, method, reply.status);
            return ProbeResult::failed(
                method,
                ProbeFailure::Unreachable(format!("HTTP status {}", reply.status)),
            );
        }

        match reply.json::<PingResponse>() {
            Ok(ping) => {
                debug!("Probe {} ({}) ok in {}ms", url, method, latency_ms);
                ProbeResult::reachable(method, latency_ms, ping)
            }
            Err(e) => ProbeResult::failed(method, e.into()),
        }
    }

    /// Probes an instance at its own address.
    pub async fn probe_direct(&self, instance_url: &str) -> ProbeResult {
        self.probe(&DirectRoute::new(instance_url)).await
    }

    /// Probes an instance through the relay.
    pub async fn probe_via_relay(&self, relay_url: &str, token: &str) -> ProbeResult {
        self.probe(&RelayRoute::new(relay_url, token)).await
    }
}
