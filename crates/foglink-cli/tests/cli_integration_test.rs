//! CLI Integration Tests
//!
//! Test Scenarios:
//! 1. Registry commands through the built binary, state kept in a temp dir
//! 2. Command functions against a scripted transport (no network)
//! 3. Error exits for unknown instances

use foglink_cli::commands;
use foglink_common::transport::{ScriptedReply, ScriptedTransport};
use foglink_discovery::{HostSignals, Session};
use foglink_registry::FileStore;
use serde_json::json;
use std::path::Path;
use std::process::{Command, Output};
use std::sync::Arc;

// ============================================================================
// Test Helpers
// ============================================================================

fn foglink(state_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_foglink"))
        .arg("--state-dir")
        .arg(state_dir)
        .args(args)
        .env_remove("FOGLINK_RELAY_URL")
        .env("RUST_LOG", "warn")
        .output()
        .expect("Failed to run foglink")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn scripted_session(dir: &Path, host: HostSignals, transport: ScriptedTransport) -> Session {
    Session::builder()
        .store(Arc::new(FileStore::new(dir)))
        .host(Arc::new(host))
        .transport(Arc::new(transport))
        .build()
}

fn ping(host: &str) -> ScriptedReply {
    ScriptedReply::json(json!({"health": "green", "hostName": host}))
}

fn text(out: Vec<u8>) -> String {
    String::from_utf8(out).unwrap()
}

// ============================================================================
// Binary
// ============================================================================

#[test]
fn test_add_list_remove_roundtrip() {
    let dir = tempfile::tempdir().unwrap();

    let output = foglink(dir.path(), &["add", "127.0.0.1:8081/", "--name", "bench"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Registered http://127.0.0.1:8081"));

    let output = foglink(dir.path(), &["add", "http://10.0.0.5:8081"]);
    assert!(output.status.success());

    let listed = stdout(&foglink(dir.path(), &["list"]));
    let lines: Vec<&str> = listed.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("* http://127.0.0.1:8081"));
    assert!(lines[0].contains("bench"));
    assert!(lines[0].contains("unknown"));
    assert!(lines[1].contains("FogLAMP (10.0.0.5:8081)"));

    let output = foglink(dir.path(), &["remove", "http://127.0.0.1:8081"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Active instance is now http://10.0.0.5:8081"));

    let listed = stdout(&foglink(dir.path(), &["list"]));
    assert_eq!(listed.lines().count(), 1);
    assert!(listed.starts_with("* http://10.0.0.5:8081"));
}

#[test]
fn test_duplicate_add_fails() {
    let dir = tempfile::tempdir().unwrap();
    assert!(foglink(dir.path(), &["add", "http://10.0.0.5:8081"]).status.success());

    let output = foglink(dir.path(), &["add", "10.0.0.5:8081/"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("already registered"));
}

#[test]
fn test_unknown_instance_commands_fail() {
    let dir = tempfile::tempdir().unwrap();
    assert!(!foglink(dir.path(), &["use", "http://10.0.0.5:8081"]).status.success());
    assert!(!foglink(dir.path(), &["remove", "http://10.0.0.5:8081"]).status.success());
    assert!(!foglink(dir.path(), &["rename", "http://10.0.0.5:8081", "x"]).status.success());
}

#[test]
fn test_use_and_rename() {
    let dir = tempfile::tempdir().unwrap();
    foglink(dir.path(), &["add", "http://127.0.0.1:8081"]);
    foglink(dir.path(), &["add", "http://10.0.0.5:8081"]);

    assert!(foglink(dir.path(), &["use", "10.0.0.5:8081"]).status.success());
    assert!(foglink(dir.path(), &["rename", "http://10.0.0.5:8081", "Plant A"]).status.success());

    let listed = stdout(&foglink(dir.path(), &["list"]));
    let active: Vec<&str> = listed.lines().filter(|l| l.starts_with('*')).collect();
    assert_eq!(active.len(), 1);
    assert!(active[0].contains("http://10.0.0.5:8081"));
    assert!(active[0].contains("Plant A"));
}

#[test]
fn test_proxy_config_prints_mapping() {
    let dir = tempfile::tempdir().unwrap();
    foglink(dir.path(), &["add", "http://127.0.0.1:8081"]);
    foglink(dir.path(), &["add", "http://192.168.0.208:8081"]);

    let output = foglink(dir.path(), &["proxy-config"]);
    assert!(output.status.success());
    let mapping: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        mapping,
        json!({"instances": {
            "local": "http://127.0.0.1:8081",
            "192-168-0-208": "http://192.168.0.208:8081"
        }})
    );
}

// ============================================================================
// Commands
// ============================================================================

#[tokio::test]
async fn test_probe_and_status_commands() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new().with("http://10.0.0.5:8081/foglamp/ping", ping("gw-1"));
    let session = scripted_session(dir.path(), HostSignals::default(), transport);
    session
        .registry()
        .write()
        .await
        .try_add("http://10.0.0.5:8081", Default::default())
        .unwrap();

    let mut out = Vec::new();
    commands::probe(&session, "http://10.0.0.5:8081", &mut out).await.unwrap();
    let out = text(out);
    assert!(out.starts_with("http://10.0.0.5:8081: reachable via direct in"));
    assert!(out.contains("host gw-1"));

    let mut out = Vec::new();
    commands::status(&session, &mut out).await.unwrap();
    let out = text(out);
    assert!(out.contains("1 of 1 instances accessible"));
    assert!(out.contains("Best endpoint: http://10.0.0.5:8081"));
    assert!(!out.contains("Suggestion"));
}

#[tokio::test]
async fn test_discover_sandboxed_without_relay_suggests_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let host = HostSignals {
        origin: Some("https://excel.officeapps.live.com".into()),
        ..Default::default()
    };
    let session = scripted_session(dir.path(), host, ScriptedTransport::new());
    session
        .registry()
        .write()
        .await
        .try_add("http://10.0.0.5:8081", Default::default())
        .unwrap();

    let mut out = Vec::new();
    commands::discover(&session, &mut out).await.unwrap();
    let out = text(out);
    assert!(out.contains("No reachable instances"));
    assert!(out.contains("0 of 1 instances accessible"));
    assert!(out.contains("Suggestion: Start the local proxy"));

    // the failed status was persisted to the state dir
    let reloaded = foglink_registry::InstanceRegistry::load(Arc::new(FileStore::new(dir.path())));
    assert_eq!(
        reloaded.get_meta("http://10.0.0.5:8081").last_status,
        foglink_registry::InstanceStatus::Failed
    );
}

#[tokio::test]
async fn test_get_writes_raw_body_from_failover() {
    let dir = tempfile::tempdir().unwrap();
    let transport = ScriptedTransport::new()
        .with("http://127.0.0.1:8081/foglamp/ping", ping("a"))
        .with("http://10.0.0.5:8081/foglamp/ping", ping("b"))
        .with("http://127.0.0.1:8081/foglamp/statistics", ScriptedReply::Timeout)
        .with(
            "http://10.0.0.5:8081/foglamp/statistics",
            ScriptedReply::json(json!([{"key": "READINGS", "value": 9}])),
        );
    let session = scripted_session(dir.path(), HostSignals::default(), transport);
    {
        let mut registry = session.registry().write().await;
        registry.try_add("http://127.0.0.1:8081", Default::default()).unwrap();
        registry.try_add("http://10.0.0.5:8081", Default::default()).unwrap();
    }

    let mut out = Vec::new();
    commands::get(&session, "/foglamp/statistics", &mut out).await.unwrap();
    let out = text(out);
    let body: serde_json::Value = serde_json::from_str(out.trim()).unwrap();
    assert_eq!(body, json!([{"key": "READINGS", "value": 9}]));
}

#[tokio::test]
async fn test_get_with_nothing_reachable_errors() {
    let dir = tempfile::tempdir().unwrap();
    let session = scripted_session(dir.path(), HostSignals::default(), ScriptedTransport::new());
    session
        .registry()
        .write()
        .await
        .try_add("http://10.0.0.5:8081", Default::default())
        .unwrap();

    let mut out = Vec::new();
    let err = commands::get(&session, "/foglamp/statistics", &mut out)
        .await
        .unwrap_err();
    assert!(err.to_string().starts_with("No endpoint reachable"));
}

#[tokio::test]
async fn test_proxy_config_push_without_relay_errors() {
    let dir = tempfile::tempdir().unwrap();
    let session = scripted_session(dir.path(), HostSignals::default(), ScriptedTransport::new());
    session
        .registry()
        .write()
        .await
        .try_add("http://10.0.0.5:8081", Default::default())
        .unwrap();

    let mut out = Vec::new();
    let err = commands::proxy_config(&session, true, &mut out).await.unwrap_err();
    assert_eq!(err.to_string(), "Proxy unavailable: http://127.0.0.1:3001");
    assert!(out.is_empty());
}

#[test]
fn test_https_instance_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let output = foglink(dir.path(), &["add", "https://10.0.0.5:8081"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("https is not supported"));
}
