// Copyright 2025 Foglink Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Command implementations
//!
//! Each command takes the session and a writer for its output, so the same
//! code serves the binary (stdout) and the tests (a buffer).

use anyhow::{bail, Result};
use foglink_common::protocol::error::FoglinkError;
use foglink_discovery::{build_relay_config, DiscoveredEndpoint, Session};
use foglink_registry::AddOptions;
use std::io::Write;

pub async fn add(
    session: &Session,
    url: &str,
    name: Option<String>,
    validate: bool,
    out: &mut impl Write,
) -> Result<()> {
    let options = AddOptions { display_name: name };
    let added = session.reconciler().register(url, options, validate).await?;
    writeln!(out, "Registered {}", added)?;
    Ok(())
}

pub async fn remove(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let mut registry = session.registry().write().await;
    if !registry.remove(url) {
        bail!("'{}' is not registered", url);
    }
    writeln!(out, "Removed {}", url)?;
    if let Some(active) = registry.active() {
        writeln!(out, "Active instance is now {}", active)?;
    }
    Ok(())
}

pub async fn list(session: &Session, out: &mut impl Write) -> Result<()> {
    let mut registry = session.registry().write().await;
    if registry.is_empty() {
        writeln!(out, "No instances registered")?;
        return Ok(());
    }

    let active = registry.active();
    for instance in registry.instances() {
        let marker = if active.as_deref() == Some(instance.url.as_str()) { "*" } else { " " };
        let mut line = format!(
            "{} {:<32} {:<28} {}",
            marker,
            instance.url,
            instance.label(),
            instance.last_status
        );
        if let Some(ms) = instance.last_latency_ms {
            line.push_str(&format!(" {}ms", ms));
        }
        if let Some(err) = &instance.last_error {
            line.push_str(&format!(" ({})", err));
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(())
}

pub async fn use_instance(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    if !session.registry().write().await.set_active(url) {
        bail!("'{}' is not registered", url);
    }
    writeln!(out, "Active instance set to {}", url)?;
    Ok(())
}

pub async fn rename(session: &Session, url: &str, name: &str, out: &mut impl Write) -> Result<()> {
    let name = Some(name.to_string()).filter(|n| !n.trim().is_empty());
    if !session.registry().write().await.rename(url, name) {
        bail!("'{}' is not registered", url);
    }
    writeln!(out, "Renamed {}", url)?;
    Ok(())
}

pub async fn probe(session: &Session, url: &str, out: &mut impl Write) -> Result<()> {
    let result = session.reconciler().probe_instance(url).await?;
    match result.error_message() {
        None => {
            let mut line = format!(
                "{}: reachable via {} in {}ms",
                url,
                result.method,
                result.latency_ms.unwrap_or_default()
            );
            if let Some(health) = &result.remote_health {
                line.push_str(&format!(", health {}", health));
            }
            if let Some(host) = &result.remote_host_name {
                line.push_str(&format!(", host {}", host));
            }
            writeln!(out, "{}", line)?;
        }
        Some(reason) => writeln!(out, "{}: not reachable via {}: {}", url, result.method, reason)?,
    }
    Ok(())
}

pub async fn discover(session: &Session, out: &mut impl Write) -> Result<()> {
    let view = session.reconciler().discover_all().await;
    if view.is_empty() {
        writeln!(out, "No reachable instances")?;
    }
    for endpoint in &view {
        writeln!(out, "{}", format_endpoint(endpoint))?;
    }
    status_summary(session, out).await
}

pub async fn status(session: &Session, out: &mut impl Write) -> Result<()> {
    session.reconciler().discover_all().await;
    status_summary(session, out).await
}

async fn status_summary(session: &Session, out: &mut impl Write) -> Result<()> {
    let status = session.orchestrator().connection_status().await;
    writeln!(out, "{}", status)?;
    if let Some(best) = &status.best {
        writeln!(out, "Best endpoint: {}", best)?;
    }
    if let Some(suggestion) = &status.suggestion {
        writeln!(out, "Suggestion: {}", suggestion)?;
    }
    Ok(())
}

/// Prints the relay mapping for the registry, or pushes it and prints what
/// the relay acknowledged.
pub async fn proxy_config(session: &Session, push: bool, out: &mut impl Write) -> Result<()> {
    let desired = {
        let registry = session.registry().read().await;
        build_relay_config(registry.urls())
    };

    if !push {
        writeln!(out, "{}", serde_json::to_string_pretty(&desired)?)?;
        return Ok(());
    }

    let proxy = session.orchestrator().proxy();
    if !proxy.check_availability(&desired).await {
        return Err(FoglinkError::ProxyUnavailable(proxy.relay_url().to_string()).into());
    }
    let acknowledged = foglink_common::RelayConfig::new(proxy.routes());
    writeln!(out, "{}", serde_json::to_string_pretty(&acknowledged)?)?;
    Ok(())
}

/// Discovers, then sends `GET path` through the failover chain and writes
/// the raw body.
pub async fn get(session: &Session, path: &str, out: &mut impl Write) -> Result<()> {
    session.reconciler().discover_all().await;
    let reply = session.orchestrator().dispatch(path).await?;
    out.write_all(&reply.body)?;
    writeln!(out)?;
    Ok(())
}

fn format_endpoint(endpoint: &DiscoveredEndpoint) -> String {
    let mut line = format!(
        "[{}] {} {} via {}",
        endpoint.priority, endpoint.name, endpoint.url, endpoint.method
    );
    if let Some(ms) = endpoint.latency_ms {
        line.push_str(&format!(" {}ms", ms));
    }
    if let Some(health) = &endpoint.remote_health {
        line.push_str(&format!(" health={}", health));
    }
    line
}
