//! Credential extraction and session resolution.
//!
//! # Responsibilities
//! - Pull a session token from the request (cookie, bearer, custom header)
//! - Turn the token into a live session via the [`SessionManager`]
//! - Check a session against a route's authorization level
//!
//! # Design Decisions
//! - Extraction order is fixed: cookie, then `Authorization: Bearer`, then header
//! - Empty values are treated as absent so the next source is tried
//! - Role checks are separate from resolution and never touch the store

use axum::http::{header, HeaderMap};

use crate::auth::session::{Session, SessionManager};
use crate::config::AuthRequirement;
use crate::error::GatewayError;

/// Where a session token was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Cookie,
    Bearer,
    Header,
}

impl CredentialSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            CredentialSource::Cookie => "cookie",
            CredentialSource::Bearer => "bearer",
            CredentialSource::Header => "header",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub token: String,
    pub source: CredentialSource,
}

/// Read a named cookie out of every `Cookie` header.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| key.trim() == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// First credential found, in precedence order.
pub fn extract_credential(
    headers: &HeaderMap,
    cookie_name: &str,
    header_name: &str,
) -> Option<Credential> {
    if let Some(token) = cookie_value(headers, cookie_name) {
        return Some(Credential { token, source: CredentialSource::Cookie });
    }
    if let Some(token) = bearer_token(headers) {
        return Some(Credential { token, source: CredentialSource::Bearer });
    }
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|token| Credential {
            token: token.to_string(),
            source: CredentialSource::Header,
        })
}

/// A session that passed resolution, along with the id it was found under.
#[derive(Debug, Clone)]
pub struct ResolvedSession {
    pub id: String,
    pub session: Session,
    pub source: CredentialSource,
}

/// Resolves request credentials into sessions.
#[derive(Debug, Clone)]
pub struct AuthResolver {
    sessions: SessionManager,
    cookie_name: String,
    header_name: String,
}

impl AuthResolver {
    pub fn new(
        sessions: SessionManager,
        cookie_name: impl Into<String>,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            cookie_name: cookie_name.into(),
            header_name: header_name.into(),
        }
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn credential(&self, headers: &HeaderMap) -> Option<Credential> {
        extract_credential(headers, &self.cookie_name, &self.header_name)
    }

    /// Resolve the request's credential. Touches the session on success.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<ResolvedSession, GatewayError> {
        let credential = self.credential(headers).ok_or(GatewayError::NoCredential)?;

        match self.sessions.get(&credential.token).await? {
            Some(session) => Ok(ResolvedSession {
                id: credential.token,
                session,
                source: credential.source,
            }),
            None => Err(GatewayError::InvalidSession),
        }
    }
}

/// Check a resolved session against a route's requirement.
pub fn authorize(requirement: AuthRequirement, session: &Session) -> Result<(), GatewayError> {
    match requirement {
        AuthRequirement::Admin if !session.role.is_admin() => Err(GatewayError::InsufficientRole {
            role: session.role.to_string(),
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::session::tests::sample_session;
    use crate::auth::store::MemoryStore;
    use axum::http::HeaderValue;
    use std::sync::Arc;
    use std::time::Duration;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.append(*k, HeaderValue::from_str(v).unwrap());
        }
        map
    }

    fn extract(map: &HeaderMap) -> Option<Credential> {
        extract_credential(map, "session_id", "x-session-id")
    }

    #[test]
    fn cookie_beats_bearer_beats_header() {
        let all = headers(&[
            ("cookie", "theme=dark; session_id=from-cookie"),
            ("authorization", "Bearer from-bearer"),
            ("x-session-id", "from-header"),
        ]);
        assert_eq!(extract(&all).unwrap().token, "from-cookie");

        let no_cookie = headers(&[
            ("authorization", "Bearer from-bearer"),
            ("x-session-id", "from-header"),
        ]);
        let cred = extract(&no_cookie).unwrap();
        assert_eq!(cred.token, "from-bearer");
        assert_eq!(cred.source, CredentialSource::Bearer);

        let header_only = headers(&[("x-session-id", "from-header")]);
        assert_eq!(extract(&header_only).unwrap().source, CredentialSource::Header);
    }

    #[test]
    fn ignores_empty_and_foreign_values() {
        let map = headers(&[
            ("cookie", "session_id=; other=1"),
            ("authorization", "Basic dXNlcjpwYXNz"),
        ]);
        assert!(extract(&map).is_none());

        let lookalike = headers(&[("cookie", "xsession_id=abc")]);
        assert!(extract(&lookalike).is_none());
    }

    #[tokio::test]
    async fn resolve_reports_missing_and_invalid() {
        let sessions =
            SessionManager::new(Arc::new(MemoryStore::new()), "session", Duration::from_secs(60));
        let resolver = AuthResolver::new(sessions.clone(), "session_id", "x-session-id");

        let err = resolver.resolve(&HeaderMap::new()).await.unwrap_err();
        assert!(matches!(err, GatewayError::NoCredential));

        let err = resolver
            .resolve(&headers(&[("x-session-id", "nope")]))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidSession));

        let id = sessions.create(&sample_session(4, "user")).await.unwrap();
        let bearer = format!("Bearer {}", id);
        let resolved = resolver
            .resolve(&headers(&[("authorization", bearer.as_str())]))
            .await
            .unwrap();
        assert_eq!(resolved.session.user_id, 4);
        assert_eq!(resolved.id, id);
    }

    #[test]
    fn admin_routes_need_admin_role() {
        let user = sample_session(1, "user");
        let admin = sample_session(2, "ADMIN");

        assert!(authorize(AuthRequirement::Authenticated, &user).is_ok());
        assert!(matches!(
            authorize(AuthRequirement::Admin, &user),
            Err(GatewayError::InsufficientRole { .. })
        ));
        assert!(authorize(AuthRequirement::Admin, &admin).is_ok());
    }
}
