//! Aggregated health of the gateway and its downstream services.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::error::GatewayError;
use crate::config::{AppConfig, ServiceConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
}

/// Result of probing one service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub name: String,
    pub status: ServiceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServiceHealth {
    fn healthy(name: &str) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Healthy,
            error: None,
        }
    }

    fn unhealthy(name: &str, error: impl Into<String>) -> Self {
        Self {
            name: name.to_string(),
            status: ServiceStatus::Unhealthy,
            error: Some(error.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == ServiceStatus::Healthy
    }
}

/// Body of `GET /health`, identical for 200 and 503.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: OverallStatus,
    pub gateway: String,
    pub services: Vec<ServiceHealth>,
}

impl HealthResponse {
    /// Healthy iff every probed service is healthy.
    pub fn from_services(services: Vec<ServiceHealth>) -> Self {
        let status = if services.iter().all(ServiceHealth::is_healthy) {
            OverallStatus::Healthy
        } else {
            OverallStatus::Degraded
        };
        Self {
            status,
            gateway: "healthy".to_string(),
            services,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.status {
            OverallStatus::Healthy => StatusCode::OK,
            OverallStatus::Degraded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

/// Probes every configured service concurrently.
#[derive(Clone)]
pub struct HealthAggregator {
    services: Arc<[ServiceConfig]>,
    client: reqwest::Client,
    probe_timeout: Duration,
}

impl HealthAggregator {
    pub fn new(cfg: &AppConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| GatewayError::internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            services: cfg.services.clone().into(),
            client,
            probe_timeout: cfg.probe_timeout(),
        })
    }

    /// Runs one probe per configured service and merges the results.
    ///
    /// Each probe carries its own timeout, so the pass takes roughly one
    /// probe timeout however many services hang. Services without a base
    /// URL are left out. Results follow configuration order.
    pub async fn aggregate(&self) -> HealthResponse {
        let started = Instant::now();
        let probed: Vec<&ServiceConfig> =
            self.services.iter().filter(|s| s.is_configured()).collect();

        let mut results: Vec<ServiceHealth> = probed
            .iter()
            .map(|s| ServiceHealth::unhealthy(&s.name, "probe task failed"))
            .collect();

        let mut join_set = JoinSet::new();
        for (index, service) in probed.iter().enumerate() {
            let client = self.client.clone();
            let name = service.name.clone();
            let url = format!("{}/health", service.base_url());
            let timeout = self.probe_timeout;
            join_set.spawn(async move { (index, probe(&client, &name, &url, timeout).await) });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, health)) => results[index] = health,
                Err(e) => warn!(error = %e, "Health probe task failed"),
            }
        }

        let response = HealthResponse::from_services(results);
        debug!(
            status = ?response.status,
            probed = response.services.len(),
            elapsed_ms = %started.elapsed().as_millis(),
            "Health aggregated"
        );
        response
    }
}

async fn probe(client: &reqwest::Client, name: &str, url: &str, timeout: Duration) -> ServiceHealth {
    match client.get(url).timeout(timeout).send().await {
        Ok(resp) if resp.status() == StatusCode::OK => ServiceHealth::healthy(name),
        Ok(resp) => {
            let status = resp.status().as_u16();
            warn!(service = %name, status, "Health probe returned non-200");
            ServiceHealth::unhealthy(name, format!("non-200 status code: {status}"))
        }
        Err(e) => {
            let error = if e.is_timeout() {
                format!("timeout after {} ms", timeout.as_millis())
            } else {
                e.to_string()
            };
            warn!(service = %name, error = %error, "Health probe failed");
            ServiceHealth::unhealthy(name, error)
        }
    }
}
