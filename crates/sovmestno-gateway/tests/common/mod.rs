#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use sovmestno_auth::{IdentityClaims, Role, TokenVerifier};
use sovmestno_gateway::{AppConfig, ServiceConfig, build_app, serve_with_grace};
use tokio::task::JoinHandle;

pub const SECRET: &str = "integration-test-secret";

/// Gateway running on an ephemeral port.
pub struct TestGateway {
    pub base: String,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TestGateway {
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.handle.await;
    }
}

/// Default configuration with the test secret and every service unconfigured.
pub fn config() -> AppConfig {
    let mut cfg = AppConfig::default();
    cfg.auth.jwt_secret = SECRET.to_string();
    cfg
}

/// Points the named service at `base_url`.
pub fn with_service(mut cfg: AppConfig, name: &str, base_url: &str) -> AppConfig {
    match cfg.services.iter_mut().find(|s| s.name == name) {
        Some(svc) => svc.base_url = base_url.to_string(),
        None => cfg.services.push(
            ServiceConfig::new(name, format!("/api/{name}")).with_base_url(base_url),
        ),
    }
    cfg
}

pub async fn start_gateway(cfg: AppConfig) -> TestGateway {
    let app = build_app(&cfg).expect("build app");

    // Bind to an ephemeral port
    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr: SocketAddr = listener.local_addr().unwrap();
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(async move {
        let signal = async move {
            let _ = rx.await;
        };
        let _ = serve_with_grace(listener, app, signal, Duration::from_secs(1)).await;
    });

    TestGateway {
        base: format!("http://{addr}"),
        shutdown_tx: tx,
        handle,
    }
}

pub fn token(user_id: i64, role: Role) -> String {
    token_with_ttl(user_id, role, 3600)
}

pub fn token_with_ttl(user_id: i64, role: Role, ttl_secs: i64) -> String {
    let now = time::OffsetDateTime::now_utc().unix_timestamp();
    TokenVerifier::new(SECRET)
        .sign(&IdentityClaims::new(user_id, role, now, ttl_secs))
        .expect("sign token")
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}
