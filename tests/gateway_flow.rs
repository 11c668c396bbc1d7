//! End-to-end tests: session lifecycle, route gating and header handling.

use serde_json::Value;

mod common;

use common::{config_for, MockUpstream, TestGateway, ADMIN_EMAIL, USER_EMAIL};

#[tokio::test]
async fn test_login_me_logout_cycle() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let login = gateway
        .client
        .post(gateway.url("/api/v1/auth/login"))
        .json(&serde_json::json!({ "email": USER_EMAIL, "password": common::PASSWORD }))
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), 200);
    let set_cookie = login.headers()["set-cookie"].to_str().unwrap().to_string();
    let cookie = set_cookie.split(';').next().unwrap().to_string();
    let body: Value = login.json().await.unwrap();
    let session_id = body["data"]["session_id"].as_str().unwrap().to_string();
    assert_eq!(session_id.len(), 64, "session ids are 32 random bytes, hex encoded");
    assert_eq!(cookie, format!("session_id={}", session_id));
    assert_eq!(body["data"]["id"], 2);

    let me = gateway
        .client
        .get(gateway.url("/api/v1/auth/me"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 200);
    let body: Value = me.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["user_id"], 2);
    assert_eq!(body["data"]["email"], USER_EMAIL);
    assert_eq!(body["data"]["role"], "user");

    let logout = gateway
        .client
        .post(gateway.url("/api/v1/auth/logout"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(logout.status(), 200);
    let cleared = logout.headers()["set-cookie"].to_str().unwrap();
    assert!(cleared.contains("Max-Age=0"));

    let me = gateway
        .client
        .get(gateway.url("/api/v1/auth/me"))
        .header("cookie", &cookie)
        .send()
        .await
        .unwrap();
    assert_eq!(me.status(), 401);
    let body: Value = me.json().await.unwrap();
    assert_eq!(body["error"], "UNAUTHORIZED");
    assert_eq!(body["message"], "Invalid session");

    // auth endpoints are answered locally
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let response = gateway
        .client
        .post(gateway.url("/api/v1/auth/login"))
        .json(&serde_json::json!({ "email": USER_EMAIL, "password": "nope" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    assert!(response.headers().get("set-cookie").is_none());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_public_route_forwards_without_credentials() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let response = gateway
        .client
        .get(gateway.url("/api/v1/products/42?expand=reviews"))
        .header("x-request-id", "req-public-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], "req-public-1");
    assert_eq!(response.headers()["x-service-name"], "product");
    assert_eq!(response.headers()["x-proxied-by"], "api-gateway");
    assert!(response.headers().get("connection").map_or(true, |v| v != "keep-alive"));

    let seen = upstream.last();
    assert_eq!(seen.path, "/products/42");
    assert_eq!(seen.query.as_deref(), Some("expand=reviews"));
    assert_eq!(seen.headers["x-request-id"], "req-public-1");
    assert_eq!(seen.headers["x-target-service"], "product");
    assert_eq!(seen.headers["x-forwarded-by"], "api-gateway");
    assert!(seen.headers.get("x-user-id").is_none());
}

#[tokio::test]
async fn test_protected_route_without_credential_never_reaches_upstream() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let response = gateway
        .client
        .get(gateway.url("/api/v1/orders"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Authentication required");
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_user_role_is_forbidden_on_admin_route() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;
    let session_id = gateway.login(USER_EMAIL).await;

    let response = gateway
        .client
        .post(gateway.url("/api/v1/products"))
        .bearer_auth(&session_id)
        .json(&serde_json::json!({ "name": "lamp" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 403);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], "FORBIDDEN");
    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_admin_route_strips_prefix_and_sets_user_id() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;
    let session_id = gateway.login(ADMIN_EMAIL).await;

    let response = gateway
        .client
        .get(gateway.url("/api/v1/admin/users/7"))
        .header("cookie", format!("theme=dark; session_id={}", session_id))
        .header("x-user-id", "999")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let seen = upstream.last();
    assert_eq!(seen.path, "/users/7");
    assert_eq!(seen.headers["x-user-id"], "1");
    assert!(seen.headers.get("cookie").is_none());
    assert!(seen.headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_credentials_are_not_forwarded() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;
    let session_id = gateway.login(USER_EMAIL).await;

    let response = gateway
        .client
        .get(gateway.url("/api/v1/orders/15"))
        .bearer_auth(&session_id)
        .header("cookie", format!("session_id={}", session_id))
        .header("x-correlation-id", "corr-77")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-correlation-id"], "corr-77");

    let seen = upstream.last();
    assert_eq!(seen.path, "/orders/15");
    assert!(seen.headers.get("authorization").is_none());
    assert!(seen.headers.get("cookie").is_none());
    assert_eq!(seen.headers["x-user-id"], "2");
    assert_eq!(seen.headers["x-correlation-id"], "corr-77");
}

#[tokio::test]
async fn test_unknown_path_and_wrong_method() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let missing = gateway.client.get(gateway.url("/nowhere")).send().await.unwrap();
    assert_eq!(missing.status(), 404);
    let body: Value = missing.json().await.unwrap();
    assert_eq!(body["data"]["path"], "/nowhere");

    let wrong = gateway
        .client
        .get(gateway.url("/api/v1/auth/login"))
        .send()
        .await
        .unwrap();
    assert_eq!(wrong.status(), 405);

    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let first = gateway.login(USER_EMAIL).await;
    let second = gateway.login(USER_EMAIL).await;
    let admin = gateway.login(ADMIN_EMAIL).await;
    assert_ne!(first, second);

    let response = gateway
        .client
        .post(gateway.url("/api/v1/auth/logout-all"))
        .bearer_auth(&first)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["removed"], 2);

    for (session, expected) in [(&first, 401), (&second, 401), (&admin, 200)] {
        let me = gateway
            .client
            .get(gateway.url("/api/v1/auth/me"))
            .bearer_auth(session)
            .send()
            .await
            .unwrap();
        assert_eq!(me.status(), expected);
    }
}

#[tokio::test]
async fn test_refresh_keeps_session_alive() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;
    let session_id = gateway.login(USER_EMAIL).await;

    let response = gateway
        .client
        .post(gateway.url("/api/v1/auth/refresh"))
        .header("x-session-id", &session_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["expires_in"], 86_400);

    let stale = gateway
        .client
        .post(gateway.url("/api/v1/auth/refresh"))
        .bearer_auth("0".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(stale.status(), 401);
}

#[tokio::test]
async fn test_dot_segments_cannot_reach_gated_routes() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;

    let (status, _) = gateway.raw_get("/api/v1/users/1").await;
    assert_eq!(status, 401);

    for target in [
        "/api/v1/webhooks/notification/../../users/1",
        "/api/v1/webhooks/notification/%2e%2e/%2e%2e/users/1",
        "/api/v1/products/../users/1",
    ] {
        let (status, body) = gateway.raw_get(target).await;
        assert_eq!(status, 400, "{}", target);
        assert!(body.contains("BAD_REQUEST"), "{}", body);
    }

    assert!(upstream.requests().is_empty());
}

#[tokio::test]
async fn test_long_request_ids_are_relayed_unchanged() {
    let upstream = MockUpstream::start().await;
    let gateway = TestGateway::spawn(config_for(&upstream.url())).await;
    let long_id = "a".repeat(200);

    let response = gateway
        .client
        .get(gateway.url("/api/v1/products"))
        .header("x-request-id", &long_id)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["x-request-id"], long_id.as_str());
    assert_eq!(upstream.last().headers["x-request-id"], long_id.as_str());
}
