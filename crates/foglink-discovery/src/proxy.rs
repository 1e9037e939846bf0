//! Local relay availability and configuration
//!
//! The relay forwards `/{token}/...` to the upstream instance mapped to
//! `token`. This module checks whether the relay is up, pushes the mapping
//! generated from the registry, and keeps the mapping the relay acknowledged.

use foglink_common::endpoint::{join_path, proxy_path_token};
use foglink_common::protocol::error::{FoglinkError, Result};
use foglink_common::protocol::{RelayConfig, RelayHealth};
use foglink_common::transport::Transport;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

use crate::config::ProxyConfig;

/// Builds the relay mapping for a set of instance URLs.
///
/// Later URLs win when two instances produce the same token.
pub fn build_relay_config<'a>(urls: impl IntoIterator<Item = &'a String>) -> RelayConfig {
    let instances: BTreeMap<String, String> = urls
        .into_iter()
        .map(|url| (proxy_path_token(url), url.clone()))
        .collect();
    RelayConfig::new(instances)
}

/// Health checker and configuration pusher for the local relay.
pub struct ProxyProber {
    transport: Arc<dyn Transport>,
    config: ProxyConfig,
    available: AtomicBool,
    routes: RwLock<BTreeMap<String, String>>,
}

impl ProxyProber {
    pub fn new(transport: Arc<dyn Transport>, config: ProxyConfig) -> Self {
        Self {
            transport,
            config,
            available: AtomicBool::new(false),
            routes: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn relay_url(&self) -> &str {
        &self.config.relay_url
    }

    /// Result of the most recent [`check_availability`](Self::check_availability).
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    /// Token → upstream mapping last acknowledged by the relay.
    pub fn routes(&self) -> BTreeMap<String, String> {
        self.routes.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Checks the relay's `/health` and, when it answers, pushes `desired`.
    ///
    /// The available flag is cleared before the check so a previous positive
    /// never outlives a failed one. A failed push does not make the relay
    /// unavailable; the previously acknowledged routes stay in place.
    pub async fn check_availability(&self, desired: &RelayConfig) -> bool {
        self.available.store(false, Ordering::SeqCst);

        let url = join_path(&self.config.relay_url, "/health");
        let healthy = match self.transport.get(&url, self.config.timeout).await {
            Ok(reply) if reply.is_success() => {
                let status = reply.json::<RelayHealth>().ok().and_then(|h| h.status);
                debug!("Relay health status: {}", status.as_deref().unwrap_or("unspecified"));
                true
            }
            Ok(reply) => {
                info!("Relay at {} unhealthy: HTTP {}", self.config.relay_url, reply.status);
                false
            }
            Err(e) => {
                info!("Relay at {} unavailable: {}", self.config.relay_url, e);
                false
            }
        };

        if !healthy {
            return false;
        }

        self.available.store(true, Ordering::SeqCst);
        debug!("Relay at {} is available", self.config.relay_url);

        if let Err(e) = self.push_configuration(desired).await {
            warn!("Relay configuration push failed, routes may be stale: {}", e);
        }
        true
    }

    /// Sends `desired` to `POST /config` and adopts the acknowledged mapping.
    pub async fn push_configuration(&self, desired: &RelayConfig) -> Result<RelayConfig> {
        let url = join_path(&self.config.relay_url, "/config");
        let body = serde_json::to_value(desired)?;
        let reply = self
            .transport
            .post_json(&url, body, self.config.timeout)
            .await?
            .error_for_status()?;

        let acknowledged: RelayConfig = reply.json()?;
        let rejected = desired
            .instances
            .keys()
            .filter(|k| !acknowledged.instances.contains_key(*k))
            .count();
        if rejected > 0 {
            warn!("Relay did not acknowledge {} of {} routes", rejected, desired.instances.len());
        }

        let mut routes = self
            .routes
            .write()
            .map_err(|e| FoglinkError::Transport(format!("route table poisoned: {}", e)))?;
        *routes = acknowledged.instances.clone();
        info!("Relay now routes {} instances", routes.len());

        Ok(acknowledged)
    }

    /// Current mapping as reported by `GET /config`.
    pub async fn fetch_configuration(&self) -> Result<RelayConfig> {
        let url = join_path(&self.config.relay_url, "/config");
        self.transport
            .get(&url, self.config.timeout)
            .await?
            .error_for_status()?
            .json()
    }
}
