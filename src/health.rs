use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::client::FrontClient;

/// Health check status
#[non_exhaustive]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Health of a single component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Overall health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub checks: Vec<ComponentHealth>,
}

impl IntoResponse for HealthResponse {
    fn into_response(self) -> Response {
        let status_code = match self.status {
            HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
            HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
        };

        (status_code, Json(self)).into_response()
    }
}

/// Report on the outbound side of the bridge
///
/// Active rate-limit pacing marks the bridge as degraded; it still accepts
/// webhooks but outbound work is being slowed down.
pub fn report(client: &FrontClient) -> HealthResponse {
    let mut checks = Vec::with_capacity(2);

    let pacing = client.governor().pending_delay();
    checks.push(ComponentHealth {
        name: "rate_limit".to_string(),
        status: if pacing.is_some() {
            HealthStatus::Degraded
        } else {
            HealthStatus::Healthy
        },
        message: pacing.map(|d| format!("pacing outbound requests by {}ms", d.as_millis())),
    });

    checks.push(ComponentHealth {
        name: "cache".to_string(),
        status: HealthStatus::Healthy,
        message: Some(format!(
            "{} cached responses",
            client.cache().backend().entry_count()
        )),
    });

    let status = if checks.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else if checks.iter().any(|c| c.status == HealthStatus::Degraded) {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthResponse { status, checks }
}
