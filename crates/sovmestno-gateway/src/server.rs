use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use sovmestno_auth::TokenVerifier;
use tower_http::trace::TraceLayer;

use crate::{
    config::AppConfig,
    gateway::{GatewayError, GatewayRouter, HealthAggregator, PublicRoutes},
    handlers,
    middleware::{self as app_middleware, OriginAllowList},
};

/// Immutable state shared by every request.
#[derive(Clone)]
pub struct GatewayState {
    pub verifier: TokenVerifier,
    pub public_routes: Arc<PublicRoutes>,
    pub origins: OriginAllowList,
    pub gateway_router: GatewayRouter,
    pub health: HealthAggregator,
}

impl GatewayState {
    pub fn new(cfg: &AppConfig) -> Result<Self, GatewayError> {
        Ok(Self {
            verifier: TokenVerifier::new(&cfg.auth.jwt_secret),
            public_routes: Arc::new(PublicRoutes::from_patterns(&cfg.routes.public)),
            origins: OriginAllowList::new(&cfg.cors.allowed_origins),
            gateway_router: GatewayRouter::new(cfg)?,
            health: HealthAggregator::new(cfg)?,
        })
    }
}

pub fn build_app(cfg: &AppConfig) -> Result<Router, GatewayError> {
    let state = GatewayState::new(cfg)?;

    if !state.verifier.is_configured() {
        tracing::warn!("auth.jwt_secret is not set; every protected route will answer 401");
    }

    let app = Router::new()
        .route("/health", get(handlers::health))
        .route("/swagger/doc.json", get(handlers::gateway_docs))
        .merge(state.gateway_router.routes())
        .fallback(handlers::unknown_route)
        // Middleware stack (order: request id -> trace -> origin filter -> auth gate)
        .layer(from_fn_with_state(state.clone(), app_middleware::auth_gate))
        .layer(from_fn_with_state(state.clone(), app_middleware::origin_filter))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    let req_id = req
                        .extensions()
                        .get::<axum::http::HeaderValue>()
                        .and_then(|v| v.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %method,
                        http.target = %uri,
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(from_fn(app_middleware::request_id))
        .with_state(state);

    Ok(app)
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    pub fn build(self) -> Result<GatewayServer, GatewayError> {
        let app = build_app(&self.config)?;

        Ok(GatewayServer {
            addr: self.addr,
            shutdown_grace: self.config.shutdown_grace(),
            app,
        })
    }
}

pub struct GatewayServer {
    addr: SocketAddr,
    shutdown_grace: Duration,
    app: Router,
}

impl GatewayServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("failed to bind {}", self.addr))?;
        tracing::info!("listening on {}", self.addr);
        serve_with_grace(listener, self.app, shutdown_signal(), self.shutdown_grace).await
    }
}

/// Serves `app` until `signal` resolves, then gives in-flight requests
/// `grace` to finish before returning.
///
/// New connections stop being accepted as soon as `signal` resolves.
/// Connections still open after `grace` are dropped with the server future.
pub async fn serve_with_grace<F>(
    listener: tokio::net::TcpListener,
    app: Router,
    signal: F,
    grace: Duration,
) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let (signalled_tx, mut signalled_rx) = tokio::sync::watch::channel(false);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        signal.await;
        let _ = signalled_tx.send(true);
    })
    .into_future();
    tokio::pin!(server);

    let grace_elapsed = async move {
        if signalled_rx.wait_for(|signalled| *signalled).await.is_err() {
            std::future::pending::<()>().await;
        }
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        res = &mut server => res?,
        () = grace_elapsed => {
            tracing::warn!(
                grace_secs = grace.as_secs(),
                "shutdown grace period elapsed; closing remaining connections"
            );
        }
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
