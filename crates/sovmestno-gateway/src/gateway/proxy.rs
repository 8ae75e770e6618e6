//! Proxy handler forwarding admitted requests to downstream services.
//!
//! Identity reaches downstream services only through `X-User-ID` and
//! `X-User-Role`, and those are written exclusively from the
//! [`VerifiedIdentity`] the admission middleware stored in the request
//! extensions. Any client-supplied copies are dropped first.

use std::error::Error as _;
use std::net::SocketAddr;
use std::time::Instant;

use axum::{
    body::{Body, HttpBody},
    extract::ConnectInfo,
    http::{HeaderMap, HeaderName, HeaderValue, Request, Uri, request::Parts},
    response::Response,
};
use sovmestno_auth::VerifiedIdentity;
use tracing::{debug, info, instrument, warn};

use super::error::GatewayError;
use super::router::GatewayRouter;
use crate::config::ServiceConfig;

pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");
const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Forwards `request` to `service` and streams the response back.
///
/// This handler:
/// 1. Fails fast if the service has no base URL
/// 2. Rewrites the path to the remainder after the service mount
/// 3. Replaces identity headers with the verified identity, if any
/// 4. Bounds the wait for response headers, not the body transfer
/// 5. Maps transport failures to `503` without retrying
#[instrument(skip_all, fields(service = %service.name, method = %request.method()))]
pub async fn handle_proxy(
    router: &GatewayRouter,
    service: &ServiceConfig,
    request: Request<Body>,
) -> Result<Response, GatewayError> {
    if !service.is_configured() {
        warn!("Service not configured");
        return Err(GatewayError::not_configured(&service.name));
    }

    let (parts, body) = request.into_parts();
    let target_url = target_url(service.base_url(), &service.mount, &parts.uri);
    let headers = outbound_headers(&parts, service.forward_auth);

    debug!(target_url = %target_url, "Proxying request");

    let mut outbound = router
        .http_client()
        .request(parts.method.clone(), &target_url)
        .headers(headers);
    if body.size_hint().exact() != Some(0) {
        outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
    }

    let started = Instant::now();
    let timeout = router.response_header_timeout();
    let proxy_response = match tokio::time::timeout(timeout, outbound.send()).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            let detail = describe_transport_error(&e);
            warn!(error = %detail, "Proxy request failed");
            return Err(GatewayError::upstream(&service.name, detail));
        }
        Err(_) => {
            let detail = format!(
                "timeout awaiting response headers after {} ms",
                timeout.as_millis()
            );
            warn!(error = %detail, "Proxy request timed out");
            return Err(GatewayError::upstream(&service.name, detail));
        }
    };

    info!(
        status = %proxy_response.status().as_u16(),
        latency_ms = %started.elapsed().as_millis(),
        "Proxy request completed"
    );

    relay_response(proxy_response)
}

/// Streams a downstream response back unchanged, minus hop-by-hop headers.
pub(crate) fn relay_response(proxy_response: reqwest::Response) -> Result<Response, GatewayError> {
    let mut response_builder = Response::builder().status(proxy_response.status());

    for (name, value) in proxy_response.headers().iter() {
        if !is_hop_by_hop_header(name.as_str()) {
            response_builder = response_builder.header(name, value);
        }
    }

    response_builder
        .body(Body::from_stream(proxy_response.bytes_stream()))
        .map_err(|e| GatewayError::internal(format!("Failed to build response: {e}")))
}

/// Builds the downstream URL: base URL, the path remainder after `mount`,
/// and the original query string.
fn target_url(base_url: &str, mount: &str, uri: &Uri) -> String {
    let path = uri.path();
    let remainder = path.strip_prefix(mount).unwrap_or(path);
    let remainder = if remainder.starts_with('/') {
        remainder.to_string()
    } else {
        format!("/{remainder}")
    };

    match uri.query() {
        Some(query) => format!("{base_url}{remainder}?{query}"),
        None => format!("{base_url}{remainder}"),
    }
}

/// Builds the outbound header set.
///
/// Client-supplied identity headers are always dropped; the verified
/// identity (if any) is written in their place.
fn outbound_headers(parts: &Parts, forward_auth: bool) -> HeaderMap {
    let mut headers = HeaderMap::new();

    for (name, value) in parts.headers.iter() {
        // Skip hop-by-hop headers as defined in RFC 7230 Section 6.1
        if is_hop_by_hop_header(name.as_str()) {
            continue;
        }
        if is_identity_header(name) {
            debug!(header = %name, "Dropping client-supplied identity header");
            continue;
        }
        if !forward_auth && name == axum::http::header::AUTHORIZATION {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    if let Some(identity) = parts.extensions.get::<VerifiedIdentity>() {
        headers.insert(X_USER_ID, HeaderValue::from(identity.user_id()));
        headers.insert(X_USER_ROLE, HeaderValue::from_static(identity.role().as_str()));
    }

    if let Some(request_id) = parts.extensions.get::<HeaderValue>() {
        headers.insert(X_REQUEST_ID, request_id.clone());
    }

    if let Some(ConnectInfo(peer)) = parts.extensions.get::<ConnectInfo<SocketAddr>>() {
        append_forwarded_for(&mut headers, peer);
    }

    headers
}

fn append_forwarded_for(headers: &mut HeaderMap, peer: &SocketAddr) {
    let ip = peer.ip().to_string();
    let value = match headers.get(&X_FORWARDED_FOR).and_then(|v| v.to_str().ok()) {
        Some(prior) if !prior.is_empty() => format!("{prior}, {ip}"),
        _ => ip,
    };
    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}

/// Flattens a reqwest error and its sources into one line.
fn describe_transport_error(err: &reqwest::Error) -> String {
    let kind = if err.is_timeout() {
        "timeout"
    } else if err.is_connect() {
        "connect error"
    } else {
        "request error"
    };

    let mut detail = format!("{kind}: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        detail.push_str(": ");
        detail.push_str(&cause.to_string());
        source = cause.source();
    }
    detail
}

/// Checks if a header is a hop-by-hop header that should not be forwarded.
fn is_hop_by_hop_header(name: &str) -> bool {
    matches!(
        name.to_lowercase().as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "proxy-connection"
            | "te"
            | "trailer"
            | "trailers"
            | "transfer-encoding"
            | "upgrade"
            | "host" // Host should be set to target, not forwarded
    )
}

fn is_identity_header(name: &HeaderName) -> bool {
    name == X_USER_ID || name == X_USER_ROLE
}
