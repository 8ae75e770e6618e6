//! Gateway router mounting one proxy per downstream service.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::State,
    http::Request,
    routing::{any, get},
};
use tracing::{debug, info};

use crate::config::{AppConfig, ServiceConfig};
use crate::server::GatewayState;

use super::error::GatewayError;
use super::{docs, proxy};

/// Routes requests to downstream services by mount prefix.
#[derive(Clone)]
pub struct GatewayRouter {
    /// Services in configuration order.
    services: Arc<[ServiceConfig]>,

    /// Pooled HTTP client for proxy requests.
    http_client: reqwest::Client,

    /// Upper bound on waiting for downstream response headers.
    response_header_timeout: Duration,

    /// Host written into rewritten API documents.
    api_host: Option<String>,
}

impl GatewayRouter {
    /// Creates a router for the configured services.
    pub fn new(cfg: &AppConfig) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .pool_idle_timeout(cfg.idle_timeout())
            .connect_timeout(cfg.connect_timeout())
            // Redirects are the client's business.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            services: cfg.services.clone().into(),
            http_client,
            response_header_timeout: cfg.response_header_timeout(),
            api_host: cfg.docs.api_host.clone(),
        })
    }

    /// Returns the HTTP client for making proxy requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    pub fn services(&self) -> &[ServiceConfig] {
        &self.services
    }

    pub fn response_header_timeout(&self) -> Duration {
        self.response_header_timeout
    }

    pub fn api_host(&self) -> Option<&str> {
        self.api_host.as_deref()
    }

    /// Builds the axum routes for every service mount and docs prefix.
    ///
    /// Each mount `M` is served at `M`, `M/` and `M/{*path}`; the handler
    /// recomputes the remainder from the raw path.
    pub fn routes(&self) -> Router<GatewayState> {
        let mut router = Router::new();

        for service in self.services.iter() {
            let service = Arc::new(service.clone());
            let mount = service.mount.clone();

            let proxy_handler = {
                let service = Arc::clone(&service);
                move |State(state): State<GatewayState>, request: Request<Body>| {
                    let service = Arc::clone(&service);
                    async move { proxy::handle_proxy(&state.gateway_router, &service, request).await }
                }
            };

            router = router
                .route(&mount, any(proxy_handler.clone()))
                .route(&format!("{mount}/"), any(proxy_handler.clone()))
                .route(&format!("{mount}/{{*path}}"), any(proxy_handler));

            if let Some(prefix) = service.docs_prefix.clone() {
                let docs_handler = {
                    let service = Arc::clone(&service);
                    move |State(state): State<GatewayState>, request: Request<Body>| {
                        let service = Arc::clone(&service);
                        async move { docs::handle_docs(&state.gateway_router, &service, request).await }
                    }
                };

                router = router
                    .route(&format!("{prefix}/"), get(docs_handler.clone()))
                    .route(&format!("{prefix}/{{*path}}"), get(docs_handler));
                debug!(service = %service.name, prefix = %prefix, "Docs route mounted");
            }

            info!(
                service = %service.name,
                mount = %mount,
                configured = service.is_configured(),
                "Service mounted"
            );
        }

        router
    }
}
