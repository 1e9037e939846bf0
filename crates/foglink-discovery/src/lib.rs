pub mod config;
pub mod environment;
pub mod orchestrator;
pub mod prober;
pub mod proxy;
pub mod reconciler;
pub mod session;
pub mod status;

pub use config::{DiscoveryConfig, ProbeConfig, ProxyConfig, DEFAULT_HEALTH_PATH, DEFAULT_RELAY_URL};
pub use environment::{Environment, EnvironmentDetector, EnvironmentKind, HostContext, HostSignals, Strategy};
pub use orchestrator::{DiscoveredEndpoint, DiscoveryOrchestrator};
pub use prober::{ConnectivityProber, DirectRoute, ProbeFailure, ProbeResult, ProbeRoute, RelayRoute};
pub use proxy::{build_relay_config, ProxyProber};
pub use reconciler::{ChangeCallback, StatusReconciler};
pub use session::{Session, SessionBuilder};
pub use status::ConnectionStatus;
