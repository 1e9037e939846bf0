use std::time::Duration;

/// Relay base address used when nothing else is configured.
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3001";

/// FogLAMP health path probed on every instance.
pub const DEFAULT_HEALTH_PATH: &str = "/foglamp/ping";

/// Connectivity probe configuration.
#[derive(Debug, Clone)]
pub struct ProbeConfig {
    /// Bound on a single probe, connect through body
    pub timeout: Duration,
    /// Path requested on the instance (or its relay route)
    pub health_path: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(3000),
            health_path: DEFAULT_HEALTH_PATH.to_string(),
        }
    }
}

/// Relay (local proxy) configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    pub relay_url: String,
    /// Bound on the relay health check and configuration push
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            relay_url: DEFAULT_RELAY_URL.to_string(),
            timeout: Duration::from_millis(2000),
        }
    }
}

/// Everything the discovery layer needs to know up front.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    pub probe: ProbeConfig,
    pub proxy: ProxyConfig,
    /// Bound on each attempt of a dispatched data request
    pub request_timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::default(),
            proxy: ProxyConfig::default(),
            request_timeout: Duration::from_millis(3000),
        }
    }
}
