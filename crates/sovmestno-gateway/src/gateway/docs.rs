//! Documentation proxy for downstream services' generated API docs.
//!
//! `GET {docs_prefix}/doc.json` (or any path ending in `swagger.json`)
//! returns the service's OpenAPI document rewritten so that every path
//! points at the gateway mount. Other paths under the prefix (the UI
//! assets) are relayed byte-for-byte.

use axum::{
    Json,
    body::Body,
    http::{Request, header::HOST},
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value, json};
use tracing::{info, instrument, warn};

use super::error::GatewayError;
use super::proxy::relay_response;
use super::router::GatewayRouter;
use crate::config::ServiceConfig;

#[instrument(skip_all, fields(service = %service.name))]
pub async fn handle_docs(
    router: &GatewayRouter,
    service: &ServiceConfig,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    if !service.is_configured() {
        return Err(GatewayError::not_configured(&service.name));
    }

    let prefix = service.docs_prefix.as_deref().unwrap_or_default();
    let path = request.uri().path();
    let any = path.strip_prefix(prefix).unwrap_or(path);

    if any.ends_with("swagger.json") || any == "/doc.json" {
        let host = router
            .api_host()
            .map(str::to_string)
            .or_else(|| {
                request
                    .headers()
                    .get(HOST)
                    .and_then(|h| h.to_str().ok())
                    .map(str::to_string)
            })
            .unwrap_or_default();
        return serve_rewritten_spec(router, service, &host).await;
    }

    let mut target_url = format!("{}/swagger{}", service.base_url(), any);
    if let Some(query) = request.uri().query() {
        target_url.push('?');
        target_url.push_str(query);
    }

    let response = fetch(router, service, &target_url).await?;
    relay_response(response)
}

async fn serve_rewritten_spec(
    router: &GatewayRouter,
    service: &ServiceConfig,
    host: &str,
) -> Result<Response, GatewayError> {
    let target_url = format!("{}/swagger/doc.json", service.base_url());
    let response = fetch(router, service, &target_url).await?;

    if !response.status().is_success() {
        warn!(status = %response.status().as_u16(), "Documentation request failed");
        return Err(GatewayError::BadGateway(format!(
            "{} returned {} for its API documentation",
            service.name,
            response.status().as_u16()
        )));
    }

    let mut spec: Value = response.json().await.map_err(|e| {
        warn!(error = %e, "Failed to parse swagger spec");
        GatewayError::BadGateway("Failed to parse swagger spec".to_string())
    })?;

    rewrite_openapi(&mut spec, host, &service.mount);
    info!("Served rewritten API documentation");
    Ok(Json(spec).into_response())
}

async fn fetch(
    router: &GatewayRouter,
    service: &ServiceConfig,
    target_url: &str,
) -> Result<reqwest::Response, GatewayError> {
    // Bounds the wait for response headers only; asset bodies stream freely.
    let timeout = router.response_header_timeout();
    match tokio::time::timeout(timeout, router.http_client().get(target_url).send()).await {
        Ok(Ok(response)) => Ok(response),
        Ok(Err(e)) => {
            warn!(error = %e, target_url = %target_url, "Documentation fetch failed");
            Err(GatewayError::upstream(&service.name, e.to_string()))
        }
        Err(_) => {
            let detail = format!(
                "timeout awaiting response headers after {} ms",
                timeout.as_millis()
            );
            warn!(error = %detail, target_url = %target_url, "Documentation fetch timed out");
            Err(GatewayError::upstream(&service.name, detail))
        }
    }
}

/// Points an OpenAPI 2.0 document at the gateway: sets `host`, resets
/// `basePath` to `/` and prefixes every path with `mount`.
pub fn rewrite_openapi(spec: &mut Value, host: &str, mount: &str) {
    let Some(doc) = spec.as_object_mut() else {
        return;
    };

    doc.insert("host".into(), Value::String(host.to_string()));
    doc.insert("basePath".into(), Value::String("/".into()));

    if let Some(Value::Object(paths)) = doc.remove("paths") {
        let rewritten: Map<String, Value> = paths
            .into_iter()
            .map(|(path, item)| (format!("{mount}{path}"), item))
            .collect();
        doc.insert("paths".into(), Value::Object(rewritten));
    }
}

/// The gateway's own documentation index, served at `/swagger/doc.json`.
pub fn gateway_index(services: &[ServiceConfig]) -> Value {
    let services: Vec<Value> = services
        .iter()
        .map(|svc| {
            json!({
                "name": svc.name,
                "mount": svc.mount,
                "docs": svc.docs_prefix.as_ref().map(|p| format!("{p}/doc.json")),
                "configured": svc.is_configured(),
            })
        })
        .collect();

    json!({
        "title": "Sovmestno API Gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("GIT_COMMIT"),
        "health": "/health",
        "services": services,
    })
}
