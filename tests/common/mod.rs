//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use edge_gateway::auth::{CredentialVerifier, UserIdentity};
use edge_gateway::config::ServiceConfig;
use edge_gateway::http::RequestIds;
use edge_gateway::{GatewayConfig, GatewayError, GatewayServer, Shutdown};

/// What a mock upstream saw.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: Method,
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
}

#[derive(Clone)]
struct UpstreamState {
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
    delay: Option<Duration>,
}

/// Mock backend recording every request it receives.
pub struct MockUpstream {
    pub addr: SocketAddr,
    captured: Arc<Mutex<Vec<CapturedRequest>>>,
}

impl MockUpstream {
    pub async fn start() -> Self {
        Self::start_with_delay(None).await
    }

    /// Backend that sleeps before answering anything but `/health`.
    pub async fn start_slow(delay: Duration) -> Self {
        Self::start_with_delay(Some(delay)).await
    }

    async fn start_with_delay(delay: Option<Duration>) -> Self {
        let captured = Arc::new(Mutex::new(Vec::new()));
        let state = UpstreamState {
            captured: captured.clone(),
            delay,
        };

        let app = Router::new()
            .route("/health", get(|| async { Json(json!({ "status": "healthy" })) }))
            .fallback(record)
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, captured }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.lock().unwrap().clone()
    }

    pub fn last(&self) -> CapturedRequest {
        self.requests().pop().expect("upstream saw no requests")
    }
}

async fn record(State(state): State<UpstreamState>, request: Request) -> impl IntoResponse {
    let captured = CapturedRequest {
        method: request.method().clone(),
        path: request.uri().path().to_string(),
        query: request.uri().query().map(str::to_string),
        headers: request.headers().clone(),
    };
    state.captured.lock().unwrap().push(captured.clone());

    if let Some(delay) = state.delay {
        tokio::time::sleep(delay).await;
    }

    (
        StatusCode::OK,
        [("connection", "keep-alive"), ("x-upstream", "mock")],
        Json(json!({
            "upstream": true,
            "path": captured.path,
            "user_id": captured.headers.get("x-user-id").and_then(|v| v.to_str().ok()),
        })),
    )
}

/// Address nothing listens on.
pub async fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// Verifier with two fixed accounts, both with password `secret`.
pub struct StubVerifier;

pub const ADMIN_EMAIL: &str = "admin@example.com";
pub const USER_EMAIL: &str = "user@example.com";
pub const PASSWORD: &str = "secret";

#[async_trait]
impl CredentialVerifier for StubVerifier {
    async fn verify(
        &self,
        email: &str,
        password: &str,
        _ids: &RequestIds,
    ) -> Result<UserIdentity, GatewayError> {
        if password != PASSWORD {
            return Err(GatewayError::InvalidCredentials);
        }
        let (id, name, role) = match email {
            ADMIN_EMAIL => (1, "Ada", "admin"),
            USER_EMAIL => (2, "Linus", "user"),
            _ => return Err(GatewayError::InvalidCredentials),
        };
        Ok(UserIdentity {
            id,
            name: name.to_string(),
            email: email.to_string(),
            role: role.to_string(),
        })
    }
}

/// Default config with every service pointed at `upstream`.
pub fn config_for(upstream: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.services = ["user", "product", "order"]
        .into_iter()
        .map(|name| ServiceConfig::new(name, upstream))
        .collect();
    config.observability.metrics_enabled = false;
    config
}

/// A running gateway bound to an ephemeral port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub client: reqwest::Client,
    shutdown: Shutdown,
}

impl TestGateway {
    pub async fn spawn(config: GatewayConfig) -> Self {
        let server = GatewayServer::builder(config)
            .credential_verifier(Arc::new(StubVerifier))
            .build()
            .await
            .unwrap();

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = Shutdown::new();
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = server.run(listener, server_shutdown).await;
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .build()
            .unwrap();

        Self {
            addr,
            client,
            shutdown,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Log in and return the session id.
    pub async fn login(&self, email: &str) -> String {
        let response = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": PASSWORD }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        body["data"]["session_id"].as_str().unwrap().to_string()
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Send `GET <target>` verbatim over a fresh connection, bypassing client
    /// URL normalization. Returns the status code and the raw body.
    pub async fn raw_get(&self, target: &str) -> (u16, String) {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            target, self.addr
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut raw = Vec::new();
        stream.read_to_end(&mut raw).await.unwrap();
        let text = String::from_utf8_lossy(&raw).into_owned();
        let status = text
            .split_whitespace()
            .nth(1)
            .and_then(|code| code.parse().ok())
            .unwrap();
        let body = text
            .split_once("\r\n\r\n")
            .map(|(_, body)| body.to_string())
            .unwrap_or_default();
        (status, body)
    }
}

impl Drop for TestGateway {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}
