use anyhow::{Context, Result};
use foglink_discovery::{DiscoveryConfig, HostSignals, ProbeConfig, ProxyConfig, Session, DEFAULT_RELAY_URL};
use foglink_registry::FileStore;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const STATE_DIR_ENV: &str = "FOGLINK_STATE_DIR";
pub const RELAY_URL_ENV: &str = "FOGLINK_RELAY_URL";

/// Options as given on the command line, before defaults are applied.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub state_dir: Option<String>,
    pub relay_url: Option<String>,
    pub probe_timeout_ms: Option<u64>,
    pub proxy_timeout_ms: Option<u64>,
    pub host: HostSignals,
}

/// Resolved runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub state_dir: PathBuf,
    pub relay_url: String,
    pub probe_timeout: Duration,
    pub proxy_timeout: Duration,
    pub host: HostSignals,
}

impl Settings {
    /// Applies flag > environment variable > default.
    ///
    /// `env` looks up a variable by name; pass `|k| std::env::var(k).ok()`
    /// for the process environment.
    pub fn resolve(overrides: Overrides, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let state_dir = match overrides.state_dir.or_else(|| env(STATE_DIR_ENV)) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .map(|d| d.join("foglink"))
                .context("No config directory on this platform, pass --state-dir")?,
        };

        let relay_url = overrides
            .relay_url
            .or_else(|| env(RELAY_URL_ENV))
            .unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());
        let relay_url = foglink_common::endpoint::normalize_url(&relay_url)
            .with_context(|| format!("Invalid relay URL '{}'", relay_url))?;

        let probe = ProbeConfig::default();
        let proxy = ProxyConfig::default();
        Ok(Self {
            state_dir,
            relay_url,
            probe_timeout: overrides
                .probe_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(probe.timeout),
            proxy_timeout: overrides
                .proxy_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(proxy.timeout),
            host: overrides.host,
        })
    }

    pub fn discovery_config(&self) -> DiscoveryConfig {
        DiscoveryConfig {
            probe: ProbeConfig {
                timeout: self.probe_timeout,
                ..Default::default()
            },
            proxy: ProxyConfig {
                relay_url: self.relay_url.clone(),
                timeout: self.proxy_timeout,
            },
            ..Default::default()
        }
    }

    /// Session backed by a file store in the state directory.
    pub fn session(&self) -> Session {
        Session::builder()
            .store(Arc::new(FileStore::new(&self.state_dir)))
            .host(Arc::new(self.host.clone()))
            .config(self.discovery_config())
            .build()
    }
}
