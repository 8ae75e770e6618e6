//! Gateway-specific error types.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Gateway-specific errors.
///
/// None of these are forwarded downstream or retried; each one ends the
/// request at the gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The route's service has no base URL configured (503).
    #[error("{service} not configured")]
    ServiceNotConfigured { service: String },

    /// Transport failure talking to a downstream service (503).
    #[error("{service} unavailable: {detail}")]
    Upstream { service: String, detail: String },

    /// The request path cannot be classified safely (400).
    #[error("{0}")]
    BadRequest(String),

    /// No service is mounted at the requested path (404).
    #[error("no service mounted at {path}")]
    UnknownService { path: String },

    /// The downstream answered with something the gateway could not use (502).
    #[error("{0}")]
    BadGateway(String),

    /// Generic internal error (500).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    #[must_use]
    pub fn not_configured(service: impl Into<String>) -> Self {
        Self::ServiceNotConfigured {
            service: service.into(),
        }
    }

    #[must_use]
    pub fn upstream(service: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::Upstream {
            service: service.into(),
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ServiceNotConfigured { .. } | Self::Upstream { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::UnknownService { .. } => StatusCode::NOT_FOUND,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match &self {
            Self::Upstream { detail, .. } => json!({
                "error": "Service temporarily unavailable",
                "details": detail,
            }),
            // Internal details stay in the logs.
            Self::Internal(_) => json!({ "error": "Internal server error" }),
            other => json!({ "error": other.to_string() }),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn render(err: GatewayError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_not_configured_response() {
        let (status, body) = render(GatewayError::not_configured("event-service")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "event-service not configured");
    }

    #[tokio::test]
    async fn test_upstream_response_carries_detail() {
        let (status, body) =
            render(GatewayError::upstream("user-service", "connection refused")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Service temporarily unavailable");
        assert_eq!(body["details"], "connection refused");
    }

    #[tokio::test]
    async fn test_bad_request_response() {
        let (status, body) =
            render(GatewayError::BadRequest("path contains dot segments".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "path contains dot segments");
    }

    #[tokio::test]
    async fn test_internal_response_hides_message() {
        let (status, body) = render(GatewayError::internal("builder exploded")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            GatewayError::UnknownService { path: "/x".into() }.status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            GatewayError::BadGateway("bad".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }
}
