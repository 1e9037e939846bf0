//! Foglink Transport Layer
//!
//! Every outbound HTTP request made by the connectivity core goes through the
//! [`Transport`] trait. Each call carries its own timeout; exceeding it yields
//! [`FoglinkError::ProbeTimeout`], while refused connections and other network
//! failures yield [`FoglinkError::ProbeUnreachable`].
//!
//! # Components
//!
//! - **[`HttpTransport`]**: hyper-based client used in production
//! - **[`ScriptedTransport`]**: canned replies keyed by URL, for tests and dry runs
//! - **[`HttpReply`]**: status code plus collected body

pub mod http;
pub mod scripted;

pub use http::HttpTransport;
pub use scripted::{ScriptedReply, ScriptedTransport};

use futures::future::BoxFuture;
use hyper::body::Bytes;
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::protocol::error::{FoglinkError, Result};

/// A fully collected HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Bytes,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decodes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| FoglinkError::InvalidResponse(format!("undecodable body: {}", e)))
    }

    /// Fails with [`FoglinkError::ProbeUnreachable`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(FoglinkError::ProbeUnreachable(format!("HTTP status {}", self.status)))
        }
    }
}

/// Outbound HTTP used by the probers and the dispatcher.
pub trait Transport: Send + Sync {
    /// Issues a `GET` and collects the body, bounded by `timeout`.
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<HttpReply>>;

    /// Issues a `POST` with a JSON body, bounded by `timeout`.
    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HttpReply>>;
}
