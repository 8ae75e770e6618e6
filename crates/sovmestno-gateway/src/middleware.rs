use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::{
    body::Body,
    http::{
        HeaderMap, HeaderName, HeaderValue, Method, Request, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_CREDENTIALS, ACCESS_CONTROL_ALLOW_HEADERS,
            ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN, ORIGIN, VARY,
        },
    },
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

use sovmestno_auth::{AuthError, TokenVerifier, VerifiedIdentity, bearer_token};

use crate::gateway::{GatewayError, has_dot_segment};
use crate::server::GatewayState;

// =============================================================================
// Authentication Middleware
// =============================================================================

/// Admission middleware that validates Bearer tokens and injects the
/// verified identity.
///
/// This middleware:
/// 1. Refuses paths with `.` or `..` segments (400)
/// 2. Admits public paths anonymously, without looking at `Authorization`
/// 3. Requires a Bearer token everywhere else
/// 4. Stores the `VerifiedIdentity` in request extensions for the proxy
///
/// On failure it answers 401 itself and the request goes no further.
pub async fn auth_gate(
    State(state): State<GatewayState>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    // Dot segments would be collapsed by the outbound URL parser, so the
    // path classified here would not be the path dispatched downstream.
    if has_dot_segment(req.uri().path()) {
        tracing::debug!(path = %req.uri().path(), "Rejecting path with dot segments");
        return GatewayError::BadRequest("path contains dot segments".to_string()).into_response();
    }

    // Classify on the path as received, before any proxy rewrite
    if state.public_routes.is_public(req.uri().path()) {
        return next.run(req).await;
    }

    match admit(&state.verifier, req.headers()) {
        Ok(identity) => {
            tracing::debug!(
                user_id = identity.user_id(),
                role = %identity.role(),
                "Token validated successfully"
            );
            req.extensions_mut().insert(identity);
            next.run(req).await
        }
        Err(e) => {
            tracing::debug!(
                path = %req.uri().path(),
                reason = e.reason(),
                error = %e,
                "Request rejected"
            );
            e.into_response()
        }
    }
}

/// Verifies the request's bearer credential.
pub fn admit(verifier: &TokenVerifier, headers: &HeaderMap) -> Result<VerifiedIdentity, AuthError> {
    let token = bearer_token(headers)?;
    verifier.verify(token)
}

// =============================================================================
// Origin Filter
// =============================================================================

const ALLOWED_METHODS: &str = "POST, OPTIONS, GET, PUT, DELETE, PATCH";
const ALLOWED_HEADERS: &str = "Content-Type, Content-Length, Accept-Encoding, X-CSRF-Token, \
                               Authorization, accept, origin, Cache-Control, X-Requested-With";

/// Exact-match allow-list of browser origins.
#[derive(Debug, Clone, Default)]
pub struct OriginAllowList {
    origins: Arc<[String]>,
}

impl OriginAllowList {
    pub fn new(origins: &[String]) -> Self {
        Self {
            origins: origins.iter().map(|o| o.trim().to_string()).collect(),
        }
    }

    pub fn allows(&self, origin: &HeaderValue) -> bool {
        self.origins
            .iter()
            .any(|allowed| allowed.as_bytes() == origin.as_bytes())
    }
}

/// CORS middleware.
///
/// Echoes an allowed `Origin` with credentials allowed, always advertises
/// the accepted methods and headers, and answers `OPTIONS` with 204 before
/// the admission middleware sees the request.
pub async fn origin_filter(
    State(state): State<GatewayState>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let allowed_origin = req
        .headers()
        .get(ORIGIN)
        .filter(|origin| state.origins.allows(origin))
        .cloned();

    let mut res = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };

    apply_cors_headers(res.headers_mut(), allowed_origin);
    res
}

fn apply_cors_headers(headers: &mut HeaderMap, allowed_origin: Option<HeaderValue>) {
    if let Some(origin) = allowed_origin {
        headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, origin);
        headers.insert(
            ACCESS_CONTROL_ALLOW_CREDENTIALS,
            HeaderValue::from_static("true"),
        );
    }
    headers.append(VARY, HeaderValue::from_static("Origin"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

// =============================================================================
// Other Middleware
// =============================================================================

// Middleware that ensures each request has an X-Request-Id and mirrors it on the response
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static("x-request-id");

    // If the incoming request already has a request-id, preserve it; otherwise generate one
    let req_id_value = match req.headers().get(&header_name) {
        Some(value) => value.clone(),
        None => HeaderValue::from_str(&Uuid::new_v4().to_string())
            .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
    };

    // Add to request extensions for downstream usage (logging, proxy)
    req.extensions_mut().insert(req_id_value.clone());

    let mut res = next.run(req).await;

    // Add/propagate the request id header to response
    res.headers_mut().insert(header_name, req_id_value);

    res
}
