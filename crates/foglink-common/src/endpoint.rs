//! Endpoint URL helpers
//!
//! Normalization of user-supplied instance URLs, loopback classification and
//! the relay path-token rule. Everything here is pure and deterministic.

use hyper::Uri;
use std::net::IpAddr;

use crate::protocol::error::{FoglinkError, Result};

/// Relay path token used for every loopback instance.
pub const LOOPBACK_TOKEN: &str = "local";

/// Prefix of path tokens derived from URLs that could not be parsed.
pub const HASHED_TOKEN_PREFIX: &str = "instance-";

/// Normalizes a user-supplied instance URL.
///
/// Prepends `http://` when no scheme is present, strips trailing slashes and
/// lower-cases the scheme and host. The result is `http://host[:port]`;
/// `https` (the transport speaks plain HTTP only), paths and queries are
/// rejected.
///
/// # Example
///
/// ```
/// use foglink_common::endpoint::normalize_url;
///
/// assert_eq!(normalize_url("127.0.0.1:8081/").unwrap(), "http://127.0.0.1:8081");
/// ```
pub fn normalize_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(FoglinkError::Validation("URL is empty".to_string()));
    }

    let mut url = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("http://{}", trimmed)
    };

    while url.ends_with('/') {
        url.pop();
    }

    let uri: Uri = url
        .parse()
        .map_err(|e| FoglinkError::Validation(format!("'{}': {}", raw.trim(), e)))?;

    let scheme = uri.scheme_str().map(str::to_ascii_lowercase);
    match scheme.as_deref() {
        Some("http") => {}
        Some("https") => {
            return Err(FoglinkError::Validation(format!(
                "'{}': https is not supported, TLS is unavailable",
                raw.trim()
            )))
        }
        other => {
            return Err(FoglinkError::Validation(format!(
                "'{}': unsupported scheme {}",
                raw.trim(),
                other.unwrap_or("<none>")
            )))
        }
    }

    let host = match uri.host() {
        Some(host) if !host.is_empty() => host.to_ascii_lowercase(),
        _ => return Err(FoglinkError::Validation(format!("'{}': missing host", raw.trim()))),
    };

    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("");
    if !path.is_empty() && path != "/" {
        return Err(FoglinkError::Validation(format!(
            "'{}': expected a base URL without path, got {}",
            raw.trim(),
            path
        )));
    }

    Ok(match uri.port_u16() {
        Some(port) => format!("http://{}:{}", host, port),
        None => format!("http://{}", host),
    })
}

/// Host part of a URL, without IPv6 brackets.
pub fn host_of(url: &str) -> Option<String> {
    let uri: Uri = url.parse().ok()?;
    let host = uri.host()?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        None
    } else {
        Some(host.to_string())
    }
}

/// Whether a host name refers to this machine.
pub fn is_loopback_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>()
        .map(|ip| ip.is_loopback())
        .unwrap_or(false)
}

/// Whether a URL points at a loopback address.
pub fn is_loopback(url: &str) -> bool {
    host_of(url).map(|h| is_loopback_host(&h)).unwrap_or(false)
}

/// Relay path token for an instance URL.
///
/// - loopback hosts map to [`LOOPBACK_TOKEN`]
/// - other hosts map to the lower-cased host with `.` (and `:`) replaced by `-`
/// - unparseable input maps to [`HASHED_TOKEN_PREFIX`] + hex of [`string_hash`]
///
/// Collisions are not resolved beyond this; a handful of instances is assumed.
pub fn proxy_path_token(url: &str) -> String {
    match host_of(url) {
        Some(host) if is_loopback_host(&host) => LOOPBACK_TOKEN.to_string(),
        Some(host) => host.to_lowercase().replace(['.', ':'], "-"),
        None => format!("{}{:x}", HASHED_TOKEN_PREFIX, string_hash(url)),
    }
}

/// Stable, non-cryptographic 32-bit hash of a string.
///
/// Classic `h * 31 + c` over UTF-16 code units with wrapping arithmetic,
/// returned as the absolute value so the hex rendering carries no sign.
pub fn string_hash(input: &str) -> u32 {
    let mut hash: i32 = 0;
    for unit in input.encode_utf16() {
        hash = hash
            .wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(unit as i32);
    }
    hash.unsigned_abs()
}

/// Joins a base URL and a path with exactly one slash between them.
pub fn join_path(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}

/// Human readable label for an instance without a user-assigned name.
pub fn default_label(url: &str) -> String {
    match host_of(url) {
        Some(host) if is_loopback_host(&host) => format!("Local FogLAMP ({})", authority_of(url)),
        Some(_) => format!("FogLAMP ({})", authority_of(url)),
        None => url.to_string(),
    }
}

fn authority_of(url: &str) -> String {
    url.parse::<Uri>()
        .ok()
        .and_then(|uri| uri.authority().map(|a| a.as_str().to_string()))
        .unwrap_or_else(|| url.to_string())
}
