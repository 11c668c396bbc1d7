//! Gateway-local authentication endpoints.
//!
//! # Responsibilities
//! - `POST /login`: verify credentials, mint a session, set the cookie
//! - `POST /logout`: best-effort session delete, clear the cookie
//! - `GET /me`: return the caller's session record
//! - `POST /refresh`: reset the session TTL
//! - `POST /logout-all`: invalidate every session of the caller's user
//!
//! # Design Decisions
//! - Logout never fails because of the store; the cookie is always cleared
//! - Handlers accept any credential transport the resolver accepts

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, State},
    http::{
        header::{SET_COOKIE, USER_AGENT},
        Extensions, HeaderMap, HeaderValue, Method, Uri,
    },
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::auth::credentials::{CredentialVerifier, UserIdentity};
use crate::auth::resolver::AuthResolver;
use crate::auth::session::{Role, Session};
use crate::error::{GatewayError, GatewayResult};
use crate::http::request::RequestIds;
use crate::http::response::ApiResponse;
use crate::observability::metrics;
use crate::security::rate_limit::client_address;

/// Cookie attributes for the session cookie.
#[derive(Debug, Clone)]
pub struct CookieSettings {
    pub name: String,
    pub secure: bool,
    pub max_age_secs: u64,
}

impl CookieSettings {
    fn suffix(&self) -> &'static str {
        if self.secure {
            "; Secure"
        } else {
            ""
        }
    }

    pub fn issue(&self, session_id: &str) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
            self.name,
            session_id,
            self.max_age_secs,
            self.suffix()
        ))
        .ok()
    }

    pub fn clear(&self) -> Option<HeaderValue> {
        HeaderValue::from_str(&format!(
            "{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT{}",
            self.name,
            self.suffix()
        ))
        .ok()
    }
}

/// State shared by the auth handlers.
#[derive(Clone)]
pub struct AuthState {
    pub resolver: AuthResolver,
    pub verifier: Arc<dyn CredentialVerifier>,
    pub cookie: CookieSettings,
    pub trust_forwarded: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Serialize)]
struct LoginData {
    #[serde(flatten)]
    user: UserIdentity,
    session_id: String,
    expires_in: u64,
}

/// Build the auth router with every path fully qualified under `mount`.
pub fn routes(state: AuthState, mount: &str) -> Router {
    let mount = mount.trim_end_matches('/');
    Router::new()
        .route(&format!("{}/login", mount), post(login).fallback(method_not_allowed))
        .route(&format!("{}/logout", mount), post(logout).fallback(method_not_allowed))
        .route(&format!("{}/me", mount), get(me).fallback(method_not_allowed))
        .route(&format!("{}/refresh", mount), post(refresh).fallback(method_not_allowed))
        .route(
            &format!("{}/logout-all", mount),
            post(logout_all).fallback(method_not_allowed),
        )
        .with_state(state)
}

async fn method_not_allowed(method: Method, uri: Uri) -> GatewayError {
    GatewayError::MethodNotAllowed {
        method,
        path: uri.path().to_string(),
    }
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(value) = cookie {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}

fn request_ids(extensions: &Extensions, headers: &HeaderMap) -> RequestIds {
    extensions
        .get::<RequestIds>()
        .cloned()
        .unwrap_or_else(|| RequestIds::from_headers(headers))
}

async fn login(
    State(state): State<AuthState>,
    headers: HeaderMap,
    extensions: Extensions,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> GatewayResult<Response> {
    let Json(body) = payload.map_err(|e| {
        tracing::debug!(error = %e, "Rejected login body");
        GatewayError::BadRequest("Invalid request body".to_string())
    })?;
    let email = body.email.trim();
    if email.is_empty() || body.password.is_empty() {
        return Err(GatewayError::BadRequest(
            "Email and password are required".to_string(),
        ));
    }

    let ids = request_ids(&extensions, &headers);
    let user = match state.verifier.verify(email, &body.password, &ids).await {
        Ok(user) => user,
        Err(e) => {
            metrics::record_auth_failure(e.kind());
            tracing::warn!(request_id = %ids.request_id, error = %e, "Login failed");
            return Err(e);
        }
    };

    let remote = extensions.get::<ConnectInfo<SocketAddr>>().map(|c| c.0);
    let session = Session {
        user_id: user.id,
        name: user.name.clone(),
        email: user.email.clone(),
        role: Role::from(user.role.clone()),
        last_seen: Utc::now(),
        ip_address: client_address(&headers, remote, state.trust_forwarded),
        user_agent: headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string(),
    };

    let sessions = state.resolver.sessions();
    let session_id = sessions.create(&session).await?;
    tracing::info!(request_id = %ids.request_id, user_id = user.id, "Login successful");

    let data = LoginData {
        user,
        session_id: session_id.clone(),
        expires_in: sessions.ttl().as_secs(),
    };
    let response = ApiResponse::success("Login successful", data).into_response();
    Ok(with_cookie(response, state.cookie.issue(&session_id)))
}

async fn logout(State(state): State<AuthState>, headers: HeaderMap) -> GatewayResult<Response> {
    let credential = state
        .resolver
        .credential(&headers)
        .ok_or_else(|| GatewayError::BadRequest("No active session".to_string()))?;

    if let Err(e) = state.resolver.sessions().delete(&credential.token).await {
        tracing::warn!(error = %e, "Session delete failed during logout");
    }

    let response = ApiResponse::message("Logout successful").into_response();
    Ok(with_cookie(response, state.cookie.clear()))
}

async fn me(State(state): State<AuthState>, headers: HeaderMap) -> GatewayResult<Response> {
    let resolved = state.resolver.resolve(&headers).await.map_err(|e| {
        metrics::record_auth_failure(e.kind());
        e
    })?;
    Ok(ApiResponse::success("User info retrieved", resolved.session).into_response())
}

async fn refresh(State(state): State<AuthState>, headers: HeaderMap) -> GatewayResult<Response> {
    let credential = state
        .resolver
        .credential(&headers)
        .ok_or(GatewayError::NoCredential)?;

    let sessions = state.resolver.sessions();
    if !sessions.refresh(&credential.token).await? {
        metrics::record_auth_failure("invalid_session");
        return Err(GatewayError::InvalidSession);
    }

    Ok(ApiResponse::success(
        "Session refreshed",
        json!({ "expires_in": sessions.ttl().as_secs() }),
    )
    .into_response())
}

async fn logout_all(State(state): State<AuthState>, headers: HeaderMap) -> GatewayResult<Response> {
    let resolved = state.resolver.resolve(&headers).await.map_err(|e| {
        metrics::record_auth_failure(e.kind());
        e
    })?;

    let removed = state
        .resolver
        .sessions()
        .delete_user_sessions(resolved.session.user_id)
        .await?;

    let response =
        ApiResponse::success("All sessions logged out", json!({ "removed": removed })).into_response();
    Ok(with_cookie(response, state.cookie.clear()))
}
