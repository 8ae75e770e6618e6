mod common;

use common::{bearer, config, start_gateway, token, token_with_ttl, with_service};
use serde_json::Value;
use sovmestno_auth::{IdentityClaims, Role, TokenVerifier};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RS256_TOKEN: &str = "eyJhbGciOiJSUzI1NiIsInR5cCI6IkpXVCJ9.\
                           eyJ1c2VyX2lkIjoxLCJyb2xlIjoiYWRtaW4iLCJleHAiOjQxMDI0NDQ4MDB9.\
                           c2lnbmF0dXJl";

async fn assert_rejected(resp: reqwest::Response, expected_reason: &str) -> Value {
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let challenge = resp
        .headers()
        .get("www-authenticate")
        .expect("www-authenticate header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(challenge.starts_with("Bearer"));
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["reason"], expected_reason);
    body
}

#[tokio::test]
async fn protected_route_without_token_never_reaches_service() {
    let downstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let gw = start_gateway(with_service(config(), "event-service", &downstream.uri())).await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/event/7", gw.base))
        .send()
        .await
        .unwrap();
    let body = assert_rejected(resp, "missing_credential").await;
    assert_eq!(body["error"], "Unauthorized: missing token");

    let resp = client
        .get(format!("{}/api/event/7", gw.base))
        .header("authorization", "Basic dXNlcjpwYXNz")
        .send()
        .await
        .unwrap();
    assert_rejected(resp, "invalid_token").await;

    gw.shutdown().await;
}

#[tokio::test]
async fn rejects_expired_forged_and_asymmetric_tokens() {
    let downstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let gw = start_gateway(with_service(config(), "event-service", &downstream.uri())).await;
    let client = reqwest::Client::new();
    let url = format!("{}/api/event/7", gw.base);

    // Expired ten seconds ago
    let expired = token_with_ttl(42, Role::Creator, -10);
    let resp = client
        .get(&url)
        .header("authorization", bearer(&expired))
        .send()
        .await
        .unwrap();
    let body = assert_rejected(resp, "token_expired").await;
    assert_eq!(body["error"], "Invalid token: token has expired");

    // Signed with another secret
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    let forged = TokenVerifier::new("not-the-gateway-secret")
        .sign(&IdentityClaims::new(42, Role::Admin, now, 3600))
        .unwrap();
    let resp = client
        .get(&url)
        .header("authorization", bearer(&forged))
        .send()
        .await
        .unwrap();
    assert_rejected(resp, "invalid_token").await;

    // Non-HMAC algorithm in the header
    let resp = client
        .get(&url)
        .header("authorization", bearer(RS256_TOKEN))
        .send()
        .await
        .unwrap();
    let body = assert_rejected(resp, "unsupported_algorithm").await;
    assert!(
        body["error"]
            .as_str()
            .unwrap()
            .contains("unexpected signing method")
    );

    gw.shutdown().await;
}

#[tokio::test]
async fn public_routes_skip_admission() {
    let downstream = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&downstream)
        .await;

    let gw = start_gateway(with_service(config(), "user-service", &downstream.uri())).await;
    let client = reqwest::Client::new();

    // Gateway health is public even with no services configured
    let resp = client
        .get(format!("{}/health", gw.base))
        .send()
        .await
        .unwrap();
    assert_ne!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    // Prefix rule /api/user/auth/*
    let resp = client
        .post(format!("{}/api/user/auth/login", gw.base))
        .json(&serde_json::json!({"email": "a@b.ru"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    // An invalid credential on a public path is ignored, not rejected
    let resp = client
        .get(format!("{}/swagger/doc.json", gw.base))
        .header("authorization", "Bearer garbage")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);

    gw.shutdown().await;
}

#[tokio::test]
async fn unset_secret_rejects_every_protected_request() {
    let downstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let mut cfg = with_service(config(), "event-service", &downstream.uri());
    cfg.auth.jwt_secret = String::new();
    let gw = start_gateway(cfg).await;

    // A token signed with the usual test secret is still refused
    let resp = reqwest::Client::new()
        .get(format!("{}/api/event/1", gw.base))
        .header("authorization", bearer(&token(1, Role::Admin)))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);

    gw.shutdown().await;
}

/// Sends `request_line` verbatim, since HTTP clients normalise dot segments
/// before they reach the wire.
async fn raw_status_line(base: &str, request_line: &str) -> String {
    let addr = base.trim_start_matches("http://");
    let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
    let request = format!("{request_line}\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    let response = String::from_utf8_lossy(&response);
    response.lines().next().unwrap_or_default().to_string()
}

#[tokio::test]
async fn dot_segments_cannot_escape_public_prefixes() {
    let downstream = MockServer::start().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&downstream)
        .await;

    let gw = start_gateway(with_service(config(), "user-service", &downstream.uri())).await;

    for request_line in [
        "GET /api/user/auth/../profile HTTP/1.1",
        "GET /api/user/auth/%2e%2e/profile HTTP/1.1",
        "GET /api/user/auth/%2E%2E/profile?x=1 HTTP/1.1",
        "GET /swagger-user/../profile HTTP/1.1",
        "GET /api/user/auth/./../profile HTTP/1.1",
    ] {
        let status = raw_status_line(&gw.base, request_line).await;
        assert!(
            status.starts_with("HTTP/1.1 400"),
            "{request_line} answered {status}"
        );
    }

    gw.shutdown().await;
}
