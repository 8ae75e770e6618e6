use axum::{Json, extract::State, http::StatusCode, http::Uri};
use serde_json::Value;

use crate::gateway::{GatewayError, HealthResponse, gateway_index};
use crate::server::GatewayState;

/// `GET /health`: aggregated status of every configured service.
pub async fn health(State(state): State<GatewayState>) -> (StatusCode, Json<HealthResponse>) {
    let response = state.health.aggregate().await;
    (response.status_code(), Json(response))
}

/// `GET /swagger/doc.json`: index of mounted services and their docs.
pub async fn gateway_docs(State(state): State<GatewayState>) -> Json<Value> {
    Json(gateway_index(state.gateway_router.services()))
}

pub async fn unknown_route(uri: Uri) -> GatewayError {
    GatewayError::UnknownService {
        path: uri.path().to_string(),
    }
}
