//! Hosting-context classification
//!
//! Decides once per session whether the add-in runs in a trusted desktop
//! host (instances reachable directly) or a sandboxed web host (private
//! network access blocked, so the relay is preferred).

use foglink_common::endpoint::host_of;
use foglink_common::protocol::error::Result;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Web-hosted productivity-suite domains. Subdomains match too.
pub const SANDBOXED_DOMAINS: &[&str] = &[
    "office.com",
    "office365.com",
    "live.com",
    "officeapps.live.com",
    "sharepoint.com",
    "microsoft.com",
];

/// Platform identifiers reported by the host when rendering in a browser.
const WEB_PLATFORMS: &[&str] = &["officeonline", "web"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvironmentKind {
    TrustedHost,
    SandboxedHost,
}

/// Connection strategy derived from the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Probe every instance directly
    Direct,
    /// Prefer the relay, still probe loopback instances directly
    ProxyFallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub kind: EnvironmentKind,
    pub strategy: Strategy,
}

impl Environment {
    pub const TRUSTED: Environment = Environment {
        kind: EnvironmentKind::TrustedHost,
        strategy: Strategy::Direct,
    };

    pub const SANDBOXED: Environment = Environment {
        kind: EnvironmentKind::SandboxedHost,
        strategy: Strategy::ProxyFallback,
    };

    pub fn is_sandboxed(&self) -> bool {
        self.kind == EnvironmentKind::SandboxedHost
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            EnvironmentKind::TrustedHost => write!(f, "trusted-host (direct)"),
            EnvironmentKind::SandboxedHost => write!(f, "sandboxed-host (proxy-fallback)"),
        }
    }
}

/// What the host exposes about where the add-in is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostSignals {
    /// Host platform identifier, e.g. `PC`, `Mac`, `OfficeOnline`
    pub platform: Option<String>,
    /// Network origin of the page, e.g. `https://excel.officeapps.live.com`
    pub origin: Option<String>,
    /// Rendered inside a frame owned by another origin
    pub framed: bool,
    /// Loaded over a secure transport
    pub secure: bool,
}

/// Source of [`HostSignals`]. Reading them may fail.
pub trait HostContext: Send + Sync {
    fn signals(&self) -> Result<HostSignals>;
}

impl HostContext for HostSignals {
    fn signals(&self) -> Result<HostSignals> {
        Ok(self.clone())
    }
}

/// Applies the classification rules, first match wins.
pub fn classify(signals: &HostSignals) -> Environment {
    if let Some(platform) = &signals.platform {
        let platform = platform.trim().to_ascii_lowercase();
        if WEB_PLATFORMS.contains(&platform.as_str()) {
            return Environment::SANDBOXED;
        }
    }

    if let Some(host) = signals.origin.as_deref().and_then(host_of) {
        let host = host.to_ascii_lowercase();
        let hosted = SANDBOXED_DOMAINS
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)));
        if hosted {
            return Environment::SANDBOXED;
        }
    }

    let secure = signals.secure
        || signals
            .origin
            .as_deref()
            .map(|o| o.trim().to_ascii_lowercase().starts_with("https://"))
            .unwrap_or(false);
    if signals.framed && secure {
        return Environment::SANDBOXED;
    }

    Environment::TRUSTED
}

/// Session-scoped, cached environment classification.
pub struct EnvironmentDetector {
    host: Arc<dyn HostContext>,
    cached: Mutex<Option<Environment>>,
}

impl EnvironmentDetector {
    pub fn new(host: Arc<dyn HostContext>) -> Self {
        Self {
            host,
            cached: Mutex::new(None),
        }
    }

    /// Classification for this session, computed on first use.
    ///
    /// Failing to read the host signals classifies as trusted/direct.
    pub fn detect(&self) -> Environment {
        if let Some(env) = self.cached.lock().ok().and_then(|c| *c) {
            return env;
        }

        let env = match self.host.signals() {
            Ok(signals) => classify(&signals),
            Err(e) => {
                warn!("Could not inspect host context, assuming trusted host: {}", e);
                Environment::TRUSTED
            }
        };
        info!("Environment classified as {}", env);

        if let Ok(mut cached) = self.cached.lock() {
            *cached = Some(env);
        }
        env
    }

    /// Forgets the cached classification; the next `detect` re-inspects.
    pub fn reset(&self) {
        if let Ok(mut cached) = self.cached.lock() {
            *cached = None;
        }
    }
}
