//! hyper-backed [`Transport`]
//!
//! A single pooled client is shared by every request. Each call is wrapped in
//! `tokio::time::timeout`, covering connect, send and body collection.

use futures::future::BoxFuture;
use futures::FutureExt;
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::Request;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;
use tracing::debug;

use super::{HttpReply, Transport};
use crate::protocol::error::{FoglinkError, Result};

/// HTTP/1 client for `http://` endpoints.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HttpTransport {
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new()).build_http();
        Self { client }
    }

    async fn send(&self, request: Request<Full<Bytes>>, timeout: Duration) -> Result<HttpReply> {
        let uri = request.uri().to_string();
        let exchange = async {
            let response = self
                .client
                .request(request)
                .await
                .map_err(|e| FoglinkError::ProbeUnreachable(format!("HTTP request failed: {}", e)))?;

            let status = response.status().as_u16();
            let body = response
                .into_body()
                .collect()
                .await
                .map_err(|e| FoglinkError::Transport(format!("Failed to read response: {}", e)))?
                .to_bytes();

            Ok::<_, FoglinkError>(HttpReply { status, body })
        };

        let reply = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| FoglinkError::ProbeTimeout(timeout.as_millis() as u64))??;

        debug!("{} -> {}", uri, reply.status);
        Ok(reply)
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HttpTransport {
    fn get<'a>(&'a self, url: &'a str, timeout: Duration) -> BoxFuture<'a, Result<HttpReply>> {
        async move {
            let request = Request::builder()
                .method("GET")
                .uri(url)
                .header("Accept", "application/json")
                .body(Full::new(Bytes::new()))?;
            self.send(request, timeout).await
        }
        .boxed()
    }

    fn post_json<'a>(
        &'a self,
        url: &'a str,
        body: serde_json::Value,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HttpReply>> {
        async move {
            let body = serde_json::to_vec(&body)?;
            let request = Request::builder()
                .method("POST")
                .uri(url)
                .header("Content-Type", "application/json")
                .body(Full::new(Bytes::from(body)))?;
            self.send(request, timeout).await
        }
        .boxed()
    }
}
