//! Minimal HTTP/1.1 client shared by the etcd and Consul backends.
//!
//! One connection per request, bounded by a timeout. Connection,
//! handshake, and timeout failures all surface as `StoreError::Unreachable`.

use std::time::Duration;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

const AGENT: &str = "fleetsync/0.1";

/// Content type for `key=value&...` request bodies.
pub(crate) const FORM: &str = "application/x-www-form-urlencoded";

/// A response with its body fully read.
#[derive(Debug)]
pub(crate) struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
}

/// A `host:port` endpoint with a per-request timeout.
#[derive(Debug, Clone)]
pub(crate) struct HttpEndpoint {
    address: String,
    timeout: Duration,
}

impl HttpEndpoint {
    pub fn new(address: &str, timeout: Duration) -> Self {
        let address = address
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        Self { address, timeout }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send a request and read the whole response.
    pub async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        body: Option<(&'static str, String)>,
    ) -> StoreResult<HttpResponse> {
        let uri = format!("http://{}{}", self.address, path_and_query);

        let exchange = async {
            let stream = tokio::net::TcpStream::connect(&self.address)
                .await
                .map_err(|e| StoreError::Unreachable(format!("{}: {e}", self.address)))?;

            let io = TokioIo::new(stream);
            let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
                .await
                .map_err(|e| StoreError::Unreachable(format!("{}: {e}", self.address)))?;

            // Drive the connection in the background.
            tokio::spawn(async move {
                let _ = conn.await;
            });

            let mut builder = Request::builder()
                .method(method.clone())
                .uri(&uri)
                .header(HOST, &self.address)
                .header(USER_AGENT, AGENT);
            let payload = match body {
                Some((content_type, body)) => {
                    builder = builder.header(CONTENT_TYPE, content_type);
                    Bytes::from(body)
                }
                None => Bytes::new(),
            };
            let req = builder
                .body(Full::new(payload))
                .map_err(|e| StoreError::Protocol(e.to_string()))?;

            let resp = sender
                .send_request(req)
                .await
                .map_err(|e| StoreError::Unreachable(format!("{uri}: {e}")))?;
            let status = resp.status();
            let body = resp
                .into_body()
                .collect()
                .await
                .map_err(|e| StoreError::Unreachable(format!("{uri}: {e}")))?
                .to_bytes();

            debug!(%method, %uri, %status, "store request");
            Ok(HttpResponse { status, body })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unreachable(format!(
                "{uri}: timed out after {:?}",
                self.timeout
            ))),
        }
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

/// Percent-encode a single URL component (query value, form field, segment).
pub(crate) fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for b in raw.bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

/// Percent-encode a `/`-separated key path, keeping the separators.
pub(crate) fn encode_path(key: &str) -> String {
    key.split('/')
        .map(encode_component)
        .collect::<Vec<_>>()
        .join("/")
}
