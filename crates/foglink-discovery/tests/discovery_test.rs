//! Discovery Integration Tests
//!
//! Runs the full session (registry, detector, relay prober, orchestrator and
//! reconciler) over real HTTP against mock FogLAMP instances and a mock
//! relay, all bound to loopback.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use foglink_common::protocol::error::FoglinkError;
use foglink_common::protocol::ProbeMethod;
use foglink_discovery::{
    DiscoveryConfig, EnvironmentKind, HostSignals, ProbeConfig, ProxyConfig, Session,
};
use foglink_registry::{AddOptions, InstanceStatus, MemoryStore};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

// ============================================================================
// Mock FogLAMP Instance
// ============================================================================

#[derive(Clone)]
struct FogLampState {
    host_name: String,
    healthy: Arc<AtomicBool>,
    /// Added before every ping reply
    delay: Duration,
}

/// A FogLAMP instance serving `/foglamp/ping` and `/foglamp/statistics`.
struct MockFogLamp {
    addr: SocketAddr,
    healthy: Arc<AtomicBool>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockFogLamp {
    async fn start(host_name: &str) -> Self {
        Self::start_with_delay(host_name, Duration::ZERO).await
    }

    async fn start_with_delay(host_name: &str, delay: Duration) -> Self {
        async fn ping(State(state): State<FogLampState>) -> Response {
            tokio::time::sleep(state.delay).await;
            if !state.healthy.load(Ordering::SeqCst) {
                return (StatusCode::SERVICE_UNAVAILABLE, "down").into_response();
            }
            Json(json!({
                "health": "green",
                "hostName": state.host_name,
                "serviceName": "FogLAMP",
                "uptime": 120.5
            }))
            .into_response()
        }

        async fn statistics(State(state): State<FogLampState>) -> Response {
            if !state.healthy.load(Ordering::SeqCst) {
                return (StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response();
            }
            Json(json!([{"key": "READINGS", "value": 42, "host": state.host_name}])).into_response()
        }

        let healthy = Arc::new(AtomicBool::new(true));
        let app = Router::new()
            .route("/foglamp/ping", get(ping))
            .route("/foglamp/statistics", get(statistics))
            .with_state(FogLampState {
                host_name: host_name.to_string(),
                healthy: healthy.clone(),
                delay,
            });

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock FogLAMP");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            healthy,
            _handle: handle,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }
}

// ============================================================================
// Mock Relay
// ============================================================================

type Routes = Arc<Mutex<BTreeMap<String, String>>>;

/// A relay that accepts route pushes and answers pings for mapped tokens.
struct MockRelay {
    addr: SocketAddr,
    routes: Routes,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockRelay {
    async fn start() -> Self {
        async fn health() -> Json<Value> {
            Json(json!({"status": "ok"}))
        }

        async fn get_config(State(routes): State<Routes>) -> Json<Value> {
            let routes = routes.lock().await;
            Json(json!({ "instances": *routes }))
        }

        async fn post_config(State(routes): State<Routes>, Json(body): Json<Value>) -> Json<Value> {
            let pushed: BTreeMap<String, String> =
                serde_json::from_value(body["instances"].clone()).unwrap_or_default();
            let mut routes = routes.lock().await;
            *routes = pushed;
            Json(json!({ "instances": *routes }))
        }

        async fn forward(
            State(routes): State<Routes>,
            Path((token, rest)): Path<(String, String)>,
        ) -> Response {
            let mapped = routes.lock().await.contains_key(&token);
            if !mapped || rest != "foglamp/ping" {
                return (StatusCode::NOT_FOUND, "no route").into_response();
            }
            Json(json!({"health": "green", "hostName": format!("relayed-{}", token)})).into_response()
        }

        let routes: Routes = Arc::new(Mutex::new(BTreeMap::new()));
        let app = Router::new()
            .route("/health", get(health))
            .route("/config", get(get_config).post(post_config))
            .route("/:token/*rest", get(forward))
            .with_state(routes.clone());

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock relay");
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            routes,
            _handle: handle,
        }
    }

    fn url(&self) -> String {
        format!("http://{}", self.addr)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// An address nothing is listening on.
async fn closed_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn config(relay_url: String) -> DiscoveryConfig {
    DiscoveryConfig {
        probe: ProbeConfig {
            timeout: Duration::from_millis(1000),
            ..Default::default()
        },
        proxy: ProxyConfig {
            relay_url,
            timeout: Duration::from_millis(1000),
        },
        request_timeout: Duration::from_millis(1000),
    }
}

fn sandboxed() -> Arc<HostSignals> {
    Arc::new(HostSignals {
        platform: Some("OfficeOnline".to_string()),
        ..Default::default()
    })
}

async fn session(urls: &[String], host: Arc<HostSignals>, relay_url: String) -> Session {
    let session = Session::builder()
        .store(Arc::new(MemoryStore::new()))
        .host(host)
        .config(config(relay_url))
        .build();
    {
        let mut registry = session.registry().write().await;
        for url in urls {
            assert!(registry.add(url, AddOptions::default()));
        }
    }
    session
}

async fn assert_reconciled(session: &Session) {
    let available = session.orchestrator().available();
    let registry = session.registry().read().await;
    for instance in registry.instances() {
        let discovered = available.iter().any(|e| e.instance_url == instance.url);
        assert_eq!(
            instance.last_status == InstanceStatus::Success,
            discovered,
            "{} out of sync",
            instance.url
        );
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_trusted_host_single_loopback_instance() {
    let foglamp = MockFogLamp::start("bench").await;
    let session = session(&[foglamp.url()], Arc::new(HostSignals::default()), closed_url().await).await;

    let view = session.reconciler().discover_all().await;
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].method, ProbeMethod::Direct);
    assert_eq!(view[0].priority, 0);
    assert_eq!(view[0].remote_host_name.as_deref(), Some("bench"));
    assert_eq!(session.orchestrator().best().unwrap().url, foglamp.url());
    assert_reconciled(&session).await;
}

#[tokio::test]
async fn test_sandboxed_remote_instance_with_relay_down() {
    let session = session(
        &["http://10.0.0.5:8081".to_string()],
        sandboxed(),
        closed_url().await,
    )
    .await;
    assert_eq!(session.environment().kind, EnvironmentKind::SandboxedHost);

    let view = session.reconciler().discover_all().await;
    assert!(view.is_empty());

    let status = session.orchestrator().connection_status().await;
    assert_eq!(status.total_instances, 1);
    assert_eq!(status.accessible_instances, 0);
    assert!(!status.proxy_available);
    assert!(status.suggestion.unwrap().contains("Start the local proxy"));

    let registry = session.registry().read().await;
    let meta = registry.get_meta("http://10.0.0.5:8081");
    assert_eq!(meta.last_status, InstanceStatus::Failed);
    assert!(meta.last_error.unwrap().contains("proxy unavailable"));
}

#[tokio::test]
async fn test_sandboxed_loopback_outranks_relayed_instance() {
    let foglamp = MockFogLamp::start("bench").await;
    let relay = MockRelay::start().await;
    // remote registered first; loopback must still win
    let session = session(
        &["http://10.0.0.5:8081".to_string(), foglamp.url()],
        sandboxed(),
        relay.url(),
    )
    .await;

    let view = session.reconciler().discover_all().await;
    assert_eq!(view.len(), 2);
    assert_eq!(view[0].instance_url, foglamp.url());
    assert_eq!(view[0].method, ProbeMethod::Direct);
    assert_eq!(view[1].instance_url, "http://10.0.0.5:8081");
    assert_eq!(view[1].method, ProbeMethod::Proxy);
    assert_eq!(view[1].url, format!("{}/10-0-0-5", relay.url()));
    assert_eq!(view[1].remote_host_name.as_deref(), Some("relayed-10-0-0-5"));
    assert!(view[0].priority < view[1].priority);

    // the relay holds exactly what was pushed
    let routes = relay.routes.lock().await;
    assert_eq!(routes.get("local"), Some(&foglamp.url()));
    assert_eq!(
        routes.get("10-0-0-5").map(String::as_str),
        Some("http://10.0.0.5:8081")
    );
    drop(routes);
    assert_reconciled(&session).await;
}

#[tokio::test]
async fn test_single_probe_reconciles_both_ways() {
    let foglamp = MockFogLamp::start("bench").await;
    let session = session(&[foglamp.url()], Arc::new(HostSignals::default()), closed_url().await).await;
    assert!(session.orchestrator().available().is_empty());

    let result = session.reconciler().probe_instance(&foglamp.url()).await.unwrap();
    assert!(result.accessible);

    let available = session.orchestrator().available();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].instance_url, foglamp.url());

    let registry = session.registry().read().await;
    let meta = registry.get_meta(&foglamp.url());
    assert_eq!(meta.last_status, InstanceStatus::Success);
    assert!(meta.last_latency_ms.is_some());
    assert_eq!(meta.remote_host_name.as_deref(), Some("bench"));
    drop(registry);
    assert_reconciled(&session).await;
}

#[tokio::test]
async fn test_instance_going_down_is_reconciled() {
    let foglamp = MockFogLamp::start("bench").await;
    let session = session(&[foglamp.url()], Arc::new(HostSignals::default()), closed_url().await).await;
    session.reconciler().discover_all().await;
    assert_reconciled(&session).await;

    foglamp.set_healthy(false);
    let result = session.reconciler().probe_instance(&foglamp.url()).await.unwrap();
    assert!(!result.accessible);
    assert!(session.orchestrator().available().is_empty());

    let registry = session.registry().read().await;
    let meta = registry.get_meta(&foglamp.url());
    assert_eq!(meta.last_status, InstanceStatus::Failed);
    assert_eq!(meta.last_error.as_deref(), Some("unreachable: HTTP status 503"));
    drop(registry);
    assert_reconciled(&session).await;
}

#[tokio::test]
async fn test_loopback_reachable_with_relay_down() {
    let foglamp = MockFogLamp::start("bench").await;
    let session = session(
        &["http://10.0.0.5:8081".to_string(), foglamp.url()],
        sandboxed(),
        closed_url().await,
    )
    .await;

    let view = session.reconciler().discover_all().await;
    assert_eq!(view.len(), 1);
    assert_eq!(view[0].instance_url, foglamp.url());
    assert_eq!(view[0].method, ProbeMethod::Direct);
    assert_reconciled(&session).await;
}

#[tokio::test]
async fn test_discovery_probes_instances_concurrently() {
    let delay = Duration::from_millis(500);
    let a = MockFogLamp::start_with_delay("a", delay).await;
    let b = MockFogLamp::start_with_delay("b", delay).await;
    let c = MockFogLamp::start_with_delay("c", delay).await;
    let session = session(
        &[a.url(), b.url(), c.url()],
        Arc::new(HostSignals::default()),
        closed_url().await,
    )
    .await;

    let started = std::time::Instant::now();
    let view = session.orchestrator().discover().await;
    let elapsed = started.elapsed();

    assert_eq!(view.len(), 3);
    // one-after-another would take at least 1500ms
    assert!(elapsed < Duration::from_millis(1200), "discovery took {:?}", elapsed);
}

#[tokio::test]
async fn test_discovery_is_idempotent() {
    let first = MockFogLamp::start("a").await;
    let second = MockFogLamp::start("b").await;
    let session = session(
        &[first.url(), second.url()],
        Arc::new(HostSignals::default()),
        closed_url().await,
    )
    .await;

    let key = |view: Vec<foglink_discovery::DiscoveredEndpoint>| {
        view.into_iter()
            .map(|e| (e.instance_url, e.priority, e.method, e.accessible))
            .collect::<Vec<_>>()
    };
    let once = key(session.orchestrator().discover().await);
    let twice = key(session.orchestrator().discover().await);
    assert_eq!(once, twice);
    assert_eq!(once.len(), 2);
}

#[tokio::test]
async fn test_dispatch_fails_over_to_next_endpoint() {
    let primary = MockFogLamp::start("primary").await;
    let secondary = MockFogLamp::start("secondary").await;
    let session = session(
        &[primary.url(), secondary.url()],
        Arc::new(HostSignals::default()),
        closed_url().await,
    )
    .await;
    session.orchestrator().discover().await;
    assert_eq!(session.orchestrator().best().unwrap().url, primary.url());

    primary.set_healthy(false);
    let reply = session
        .orchestrator()
        .dispatch("/foglamp/statistics")
        .await
        .unwrap();
    let body: Value = reply.json().unwrap();
    assert_eq!(body[0]["host"], "secondary");

    // primary is skipped until the next discovery
    assert_eq!(session.orchestrator().best().unwrap().url, secondary.url());

    secondary.set_healthy(false);
    let err = session
        .orchestrator()
        .dispatch("/foglamp/statistics")
        .await
        .unwrap_err();
    assert!(matches!(err, FoglinkError::NoEndpointReachable(_)));
}

#[tokio::test]
async fn test_removing_active_instance_moves_pointer() {
    let session = session(
        &["http://127.0.0.1:8081".to_string(), "http://10.0.0.5:8081".to_string()],
        Arc::new(HostSignals::default()),
        closed_url().await,
    )
    .await;

    let mut registry = session.registry().write().await;
    assert!(registry.set_active("http://127.0.0.1:8081"));
    assert!(registry.remove("http://127.0.0.1:8081"));
    assert_eq!(registry.active().as_deref(), Some("http://10.0.0.5:8081"));
}

#[tokio::test]
async fn test_relay_config_fetch_matches_push() {
    let foglamp = MockFogLamp::start("bench").await;
    let relay = MockRelay::start().await;
    let session = session(&[foglamp.url()], sandboxed(), relay.url()).await;

    session.orchestrator().discover().await;
    let fetched = session.orchestrator().proxy().fetch_configuration().await.unwrap();
    assert_eq!(fetched.instances, session.orchestrator().proxy().routes());
}
