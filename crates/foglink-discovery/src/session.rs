use foglink_common::transport::{HttpTransport, Transport};
use foglink_registry::{InstanceRegistry, KvStore, MemoryStore};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::config::DiscoveryConfig;
use crate::environment::{Environment, EnvironmentDetector, HostContext, HostSignals};
use crate::orchestrator::DiscoveryOrchestrator;
use crate::reconciler::{ChangeCallback, StatusReconciler};

/// The connectivity core for one session, wired once at start-up.
pub struct Session {
    orchestrator: Arc<DiscoveryOrchestrator>,
    reconciler: StatusReconciler,
}

impl Session {
    pub fn builder() -> SessionBuilder {
        SessionBuilder::default()
    }

    pub fn registry(&self) -> &Arc<RwLock<InstanceRegistry>> {
        self.orchestrator.registry()
    }

    pub fn orchestrator(&self) -> &Arc<DiscoveryOrchestrator> {
        &self.orchestrator
    }

    pub fn reconciler(&self) -> &StatusReconciler {
        &self.reconciler
    }

    pub fn environment(&self) -> Environment {
        self.orchestrator.environment()
    }
}

/// Builder for [`Session`].
///
/// Unset parts default to an in-memory store, empty host signals (trusted
/// host), the hyper transport and default timeouts.
#[derive(Default)]
pub struct SessionBuilder {
    store: Option<Arc<dyn KvStore>>,
    host: Option<Arc<dyn HostContext>>,
    transport: Option<Arc<dyn Transport>>,
    config: DiscoveryConfig,
    on_change: Option<ChangeCallback>,
}

impl SessionBuilder {
    pub fn store(mut self, store: Arc<dyn KvStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn host(mut self, host: Arc<dyn HostContext>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn config(mut self, config: DiscoveryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn on_change(mut self, on_change: ChangeCallback) -> Self {
        self.on_change = Some(on_change);
        self
    }

    pub fn build(self) -> Session {
        let store = self.store.unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let host = self
            .host
            .unwrap_or_else(|| Arc::new(HostSignals::default()));
        let transport = self
            .transport
            .unwrap_or_else(|| Arc::new(HttpTransport::new()));

        let registry = Arc::new(RwLock::new(InstanceRegistry::load(store)));
        let detector = Arc::new(EnvironmentDetector::new(host));
        let orchestrator = Arc::new(DiscoveryOrchestrator::new(
            registry,
            detector,
            transport,
            self.config,
        ));

        let mut reconciler = StatusReconciler::new(orchestrator.clone());
        if let Some(on_change) = self.on_change {
            reconciler = reconciler.with_callback(on_change);
        }

        Session {
            orchestrator,
            reconciler,
        }
    }
}
