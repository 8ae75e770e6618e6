//! Error response handling for the authentication gate.
//!
//! Every [`AuthError`] becomes `401 Unauthorized` with a JSON body and a
//! `WWW-Authenticate: Bearer` challenge. Bodies carry a human-readable
//! reason only; secrets and token contents are never echoed.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::error::AuthError;

const REALM: &str = "sovmestno";

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match &self {
            AuthError::MissingCredential => "Unauthorized: missing token".to_string(),
            other => format!("Invalid token: {other}"),
        };

        let body = json!({
            "error": message,
            "reason": self.reason(),
        });

        let mut response = (StatusCode::UNAUTHORIZED, Json(body)).into_response();
        if let Ok(value) = HeaderValue::from_str(&build_www_authenticate_header(&self)) {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, value);
        }
        response
    }
}

/// Builds the WWW-Authenticate header value for 401 responses.
///
/// A request without credentials gets a bare challenge (RFC 6750 §3.1);
/// rejected credentials add `error="invalid_token"` and a description.
fn build_www_authenticate_header(error: &AuthError) -> String {
    match error {
        AuthError::MissingCredential => format!("Bearer realm=\"{REALM}\""),
        other => {
            let escaped_desc = other.to_string().replace('\"', "\\\"");
            format!(
                "Bearer realm=\"{REALM}\", error=\"invalid_token\", error_description=\"{escaped_desc}\""
            )
        }
    }
}
