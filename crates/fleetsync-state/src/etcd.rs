//! EtcdStore: etcd v2 keys API over HTTP.
//!
//! ```text
//! GET    /v2/keys{key}                  → 200 {"node": {...}} | 404
//! PUT    /v2/keys{key}  value=..&ttl=.. → 200 | 201
//! DELETE /v2/keys{key}                  → 200 | 404
//! GET    /v2/keys{prefix}?recursive=true
//! GET    /v2/machines                   → "http://a:2379, http://b:2379"
//! ```
//!
//! etcd expires keys with a TTL natively, so a crashed host's heartbeat
//! record disappears on its own.

use std::time::Duration;

use http::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::http::{encode_component, encode_path, HttpEndpoint, HttpResponse, FORM};
use crate::kv::KvStore;
use crate::types::ttl_secs;

#[derive(Debug, Deserialize)]
struct EtcdResponse {
    node: EtcdNode,
}

#[derive(Debug, Deserialize)]
struct EtcdNode {
    key: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<EtcdNode>,
}

impl EtcdNode {
    /// Collect every leaf key below (and including) this node.
    fn collect_leaves(self, out: &mut Vec<String>) {
        if self.dir {
            for child in self.nodes {
                child.collect_leaves(out);
            }
        } else {
            out.push(self.key);
        }
    }
}

/// Key-value client for an etcd v2 endpoint.
#[derive(Debug, Clone)]
pub struct EtcdStore {
    endpoint: HttpEndpoint,
}

impl EtcdStore {
    /// Create a client for `host:port`, bounding every request by `timeout`.
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            endpoint: HttpEndpoint::new(address, timeout),
        }
    }

    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    fn keys_path(key: &str) -> String {
        let key = if key.starts_with('/') {
            key.to_string()
        } else {
            format!("/{key}")
        };
        format!("/v2/keys{}", encode_path(&key))
    }

    fn parse_node(resp: &HttpResponse) -> StoreResult<EtcdNode> {
        let parsed: EtcdResponse = serde_json::from_slice(&resp.body)
            .map_err(|e| StoreError::Deserialize(e.to_string()))?;
        Ok(parsed.node)
    }
}

fn unexpected(resp: &HttpResponse, what: &str) -> StoreError {
    StoreError::Protocol(format!(
        "unexpected status {} for {what}: {}",
        resp.status,
        String::from_utf8_lossy(&resp.body).trim()
    ))
}

/// Parse the `/v2/machines` body: a comma-separated list of client URLs.
fn parse_machines(body: &str) -> Vec<String> {
    body.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

impl KvStore for EtcdStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let resp = self
            .endpoint
            .send(Method::GET, &Self::keys_path(key), None)
            .await?;
        match resp.status {
            StatusCode::OK => Ok(Some(Self::parse_node(&resp)?.value.unwrap_or_default())),
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(&resp, key)),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StoreResult<()> {
        let mut form = format!("value={}", encode_component(value));
        if let Some(ttl) = ttl {
            // etcd refuses a zero TTL; one second is the shortest it keeps.
            form.push_str(&format!("&ttl={}", ttl_secs(ttl).max(1)));
        }
        let resp = self
            .endpoint
            .send(Method::PUT, &Self::keys_path(key), Some((FORM, form)))
            .await?;
        match resp.status {
            StatusCode::OK | StatusCode::CREATED => {
                debug!(%key, ?ttl, "etcd key stored");
                Ok(())
            }
            _ => Err(unexpected(&resp, key)),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let resp = self
            .endpoint
            .send(Method::DELETE, &Self::keys_path(key), None)
            .await?;
        match resp.status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            _ => Err(unexpected(&resp, key)),
        }
    }

    async fn find(&self, prefix: &str) -> StoreResult<Option<Vec<String>>> {
        let path = format!("{}?recursive=true", Self::keys_path(prefix));
        let resp = self.endpoint.send(Method::GET, &path, None).await?;
        match resp.status {
            StatusCode::OK => {
                let mut keys = Vec::new();
                Self::parse_node(&resp)?.collect_leaves(&mut keys);
                Ok(Some(keys))
            }
            StatusCode::NOT_FOUND => Ok(None),
            _ => Err(unexpected(&resp, prefix)),
        }
    }

    async fn members(&self) -> StoreResult<Vec<String>> {
        let resp = self.endpoint.send(Method::GET, "/v2/machines", None).await?;
        if resp.status != StatusCode::OK {
            return Err(unexpected(&resp, "/v2/machines"));
        }
        Ok(parse_machines(&String::from_utf8_lossy(&resp.body)))
    }
}
