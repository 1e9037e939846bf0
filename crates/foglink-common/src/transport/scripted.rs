//! Canned-reply [`Transport`]
//!
//! Replies are looked up by exact URL. Unknown URLs behave like a refused
//! connection. Every request is recorded so callers can assert on routing.

use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use super::{HttpReply, Transport};
use crate::protocol::error::{FoglinkError, Result};

/// What a scripted URL answers with.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Respond with this status and body
    Respond(HttpReply),
    /// Behave as if the timeout elapsed
    Timeout,
    /// Behave as if the connection was refused
    Refused,
}

impl ScriptedReply {
    /// 200 with a JSON body
    pub fn json(value: serde_json::Value) -> Self {
        ScriptedReply::Respond(HttpReply::new(200, value.to_string()))
    }

    pub fn status(status: u16) -> Self {
        ScriptedReply::Respond(HttpReply::new(status, ""))
    }
}

/// In-memory transport driven by a URL → reply table.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: Mutex<HashMap<String, ScriptedReply>>,
    requests: Mutex<Vec<(String, String)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets (or replaces) the reply for a URL.
    pub fn script(&self, url: impl Into<String>, reply: ScriptedReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.insert(url.into(), reply);
        }
    }

    /// Builder-style variant of [`script`](Self::script).
    pub fn with(self, url: impl Into<String>, reply: ScriptedReply) -> Self {
        self.script(url, reply);
        self
    }

    /// `(method, url)` pairs in the order they were issued.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Number of requests issued to `url` with any method.
    pub fn hits(&self, url: &str) -> usize {
        self.requests().iter().filter(|(_, u)| u == url).count()
    }

    fn answer(&self, method: &str, url: &str, timeout: Duration) -> Result<HttpReply> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((method.to_string(), url.to_string()));
        }

        let reply = self
            .replies
            .lock()
            .ok()
            .and_then(|replies| replies.get(url).cloned())
            .unwrap_or(ScriptedReply::Refused);

        match reply {
            ScriptedReply::Respond(reply) => Ok(reply),
            ScriptedReply::Timeout => Err(FoglinkError::ProbeTimeout(timeout.as_millis() as u64)),
            ScriptedReply::Refused => Err(FoglinkError::ProbeUnreachable(format!(
                "connection refused: {}",
                url
            ))),
        }
    }
}

impl Transport for ScriptedTransport {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<HttpReply>> {
        async move { self.answer("GET", url, timeout) }.boxed()
    }

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        _body: serde_json::Value,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HttpReply>> {
        async move { self.answer("POST", url, timeout) }.boxed()
    }
}
