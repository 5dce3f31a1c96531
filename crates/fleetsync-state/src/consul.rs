//! ConsulHealth: Consul health API as the external check source.
//!
//! Hosts report puppet and validation runs as TTL checks on their local
//! Consul agent; failing runs are reported as `warning` so Consul does not
//! deregister services during bootstrap. The tracker decides how to weigh
//! them.

use std::time::Duration;

use http::{Method, StatusCode};

use crate::error::{StoreError, StoreResult};
use crate::health::{CheckState, HealthCheck, HealthSource};
use crate::http::{encode_component, HttpEndpoint, HttpResponse};

/// Read-only client for `/v1/health/*`.
#[derive(Debug, Clone)]
pub struct ConsulHealth {
    endpoint: HttpEndpoint,
}

impl ConsulHealth {
    /// Create a client for a Consul agent at `host:port`.
    pub fn new(address: &str, timeout: Duration) -> Self {
        Self {
            endpoint: HttpEndpoint::new(address, timeout),
        }
    }

    pub fn address(&self) -> &str {
        self.endpoint.address()
    }

    async fn fetch(&self, path: &str) -> StoreResult<Vec<HealthCheck>> {
        let resp = self.endpoint.send(Method::GET, path, None).await?;
        parse_checks(&resp, path)
    }
}

fn parse_checks(resp: &HttpResponse, path: &str) -> StoreResult<Vec<HealthCheck>> {
    if resp.status != StatusCode::OK {
        return Err(StoreError::Protocol(format!(
            "unexpected status {} for {path}",
            resp.status
        )));
    }
    serde_json::from_slice(&resp.body).map_err(|e| StoreError::Deserialize(e.to_string()))
}

impl HealthSource for ConsulHealth {
    async fn checks_in_state(&self, state: CheckState) -> StoreResult<Vec<HealthCheck>> {
        self.fetch(&format!("/v1/health/state/{state}")).await
    }

    async fn node_checks(&self, node: &str) -> StoreResult<Vec<HealthCheck>> {
        self.fetch(&format!("/v1/health/node/{}", encode_component(node)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeServer;

    const WARNINGS: &str = r#"[
        {"Node":"cp1","CheckID":"puppet","Name":"puppet","Status":"warning","Output":"exit 4"},
        {"Node":"st1","CheckID":"disk","Name":"disk","Status":"warning","Output":"87% used"}
    ]"#;

    #[tokio::test]
    async fn fetches_checks_by_state_and_node() {
        let server = FakeServer::start(|_method, path, _body| match path.as_str() {
            "/v1/health/state/warning" => (200, WARNINGS.to_string()),
            "/v1/health/state/critical" => (200, "[]".to_string()),
            "/v1/health/node/cp1" => (
                200,
                r#"[{"Node":"cp1","Name":"serfHealth","Status":"passing"}]"#.to_string(),
            ),
            _ => (404, String::new()),
        })
        .await;
        let consul = ConsulHealth::new(&server.address(), Duration::from_secs(2));

        let warnings = consul.checks_in_state(CheckState::Warning).await.unwrap();
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0].node, "cp1");
        assert_eq!(warnings[1].output, "87% used");

        assert!(consul
            .checks_in_state(CheckState::Critical)
            .await
            .unwrap()
            .is_empty());

        let node = consul.node_checks("cp1").await.unwrap();
        assert_eq!(node[0].status, CheckState::Passing);
    }

    #[tokio::test]
    async fn non_ok_status_is_protocol_error() {
        let server = FakeServer::start(|_, _, _| (500, "rpc error".to_string())).await;
        let consul = ConsulHealth::new(&server.address(), Duration::from_secs(2));

        let err = consul.node_checks("cp1").await.unwrap_err();
        assert!(matches!(err, StoreError::Protocol(_)));
    }
}
