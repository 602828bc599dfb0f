//! Health check module
//! Provides health status for the application and its one dependency, the store.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::error;

use crate::api::AppState;

/// Health status response
#[derive(Debug, Serialize, Clone)]
pub struct HealthStatus {
    pub status: HealthState,
    pub checks: HashMap<String, ComponentHealth>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// Overall health state
#[derive(Debug, Serialize, Clone)]
pub enum HealthState {
    Healthy,
    Unhealthy,
}

/// Individual component health status
#[derive(Debug, Serialize, Clone)]
pub struct ComponentHealth {
    pub status: ComponentState,
    pub response_time_ms: Option<u128>,
    pub details: Option<String>,
}

/// Component state
#[derive(Debug, Serialize, Clone)]
pub enum ComponentState {
    Up,
    Down,
}

impl ComponentHealth {
    pub fn up(response_time_ms: Option<u128>) -> Self {
        Self {
            status: ComponentState::Up,
            response_time_ms,
            details: None,
        }
    }

    pub fn down(details: Option<String>) -> Self {
        Self {
            status: ComponentState::Down,
            response_time_ms: None,
            details,
        }
    }
}

async fn check_database(pool: &sqlx::PgPool) -> ComponentHealth {
    let start = Instant::now();
    match timeout(Duration::from_secs(5), sqlx::query("SELECT 1").fetch_one(pool)).await {
        Ok(Ok(_)) => ComponentHealth::up(Some(start.elapsed().as_millis())),
        Ok(Err(e)) => {
            error!("Database health check failed: {}", e);
            ComponentHealth::down(Some(e.to_string()))
        }
        Err(_) => {
            error!("Database health check timed out");
            ComponentHealth::down(Some("Timeout".to_string()))
        }
    }
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let database = check_database(&state.pool).await;
    let healthy = matches!(database.status, ComponentState::Up);

    let mut checks = HashMap::new();
    checks.insert("database".to_string(), database);

    let status = HealthStatus {
        status: if healthy {
            HealthState::Healthy
        } else {
            HealthState::Unhealthy
        },
        checks,
        timestamp: chrono::Utc::now(),
    };

    let code = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

/// GET /health/live
pub async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({"status": "alive"})))
}

/// GET /health/ready
pub async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    let ready = matches!(
        timeout(
            Duration::from_secs(5),
            crate::database::health_check(&state.pool)
        )
        .await,
        Ok(Ok(()))
    );

    if ready {
        (StatusCode::OK, Json(serde_json::json!({"status": "ready"}))).into_response()
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"status": "not_ready"})),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn component_health_states() {
        let up = ComponentHealth::up(Some(100));
        assert!(matches!(up.status, ComponentState::Up));
        assert_eq!(up.response_time_ms, Some(100));

        let down = ComponentHealth::down(Some("Test error".to_string()));
        assert!(matches!(down.status, ComponentState::Down));
        assert_eq!(down.details, Some("Test error".to_string()));
    }
}
