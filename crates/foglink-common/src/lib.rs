//! Foglink Common Types and Transport
//!
//! Shared building blocks for the foglink connectivity core: the error type,
//! the FogLAMP and relay payloads, endpoint URL helpers and the HTTP
//! transport abstraction.
//!
//! # Components
//!
//! - [`protocol`] - error type, ping and relay payloads, [`ProbeMethod`]
//! - [`endpoint`] - URL normalization, loopback detection, relay path tokens
//! - [`transport`] - the [`Transport`](transport::Transport) trait and its implementations
//!
//! # Example
//!
//! ```
//! use foglink_common::endpoint::{normalize_url, proxy_path_token};
//!
//! let url = normalize_url("192.168.0.208:8081/").unwrap();
//! assert_eq!(url, "http://192.168.0.208:8081");
//! assert_eq!(proxy_path_token(&url), "192-168-0-208");
//! ```

pub mod endpoint;
pub mod protocol;
pub mod transport;

pub use protocol::*;

/// Milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
