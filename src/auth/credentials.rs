//! Credential verification against the user service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::GatewayError;
use crate::http::request::{RequestIds, X_CORRELATION_ID, X_REQUEST_ID};

/// Identity returned by a successful credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub role: String,
}

/// Checks an email/password pair. Implemented by the user service client and
/// by test doubles.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(
        &self,
        email: &str,
        password: &str,
        ids: &RequestIds,
    ) -> Result<UserIdentity, GatewayError>;
}

#[derive(Debug, Serialize)]
struct LoginPayload<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    message: String,
    data: Option<UserIdentity>,
}

/// Calls `POST <service>/<path>` on the configured user service.
#[derive(Debug, Clone)]
pub struct UserServiceClient {
    http: reqwest::Client,
    service: String,
    url: String,
    user_agent: String,
}

impl UserServiceClient {
    pub fn new(
        service: impl Into<String>,
        base_url: &str,
        path: &str,
        timeout: Duration,
        user_agent: impl Into<String>,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::InternalFault(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            service: service.into(),
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            user_agent: user_agent.into(),
        })
    }

    fn unreachable(&self, e: impl std::fmt::Display) -> GatewayError {
        GatewayError::UpstreamUnreachable {
            service: self.service.clone(),
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl CredentialVerifier for UserServiceClient {
    async fn verify(
        &self,
        email: &str,
        password: &str,
        ids: &RequestIds,
    ) -> Result<UserIdentity, GatewayError> {
        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(X_REQUEST_ID, &ids.request_id)
            .header(X_CORRELATION_ID, &ids.correlation_id)
            .json(&LoginPayload { email, password })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::InvalidCredentials);
        }
        if status != StatusCode::OK {
            tracing::warn!(
                request_id = %ids.request_id,
                service = %self.service,
                status = %status,
                "Credential check returned unexpected status"
            );
            return Err(GatewayError::UpstreamBadStatus {
                service: self.service.clone(),
                status,
            });
        }

        let reply: LoginReply = response.json().await.map_err(|e| self.unreachable(e))?;
        match reply {
            LoginReply { success: true, data: Some(user), .. } => Ok(user),
            LoginReply { message, .. } => {
                tracing::info!(request_id = %ids.request_id, reason = %message, "Login rejected");
                Err(GatewayError::InvalidCredentials)
            }
        }
    }
}
