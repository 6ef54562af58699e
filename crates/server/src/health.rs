use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use taskrelay_core::coordinator::Coordinator;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    coordinator: Arc<Coordinator>,
    polling: Arc<AtomicBool>,
}

impl HealthState {
    pub fn new(coordinator: Arc<Coordinator>, polling: Arc<AtomicBool>) -> Self {
        Self { coordinator, polling }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub telegram: HealthCheck,
    pub active_sessions: usize,
    pub checked_at: String,
}

pub fn router(state: HealthState) -> Router {
    Router::new().route("/health", get(health)).with_state(state)
}

pub async fn spawn(bind_address: &str, port: u16, state: HealthState) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        correlation_id = "bootstrap",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(state)).await {
            error!(
                event_name = "system.health.error",
                correlation_id = "bootstrap",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let polling = state.polling.load(Ordering::Relaxed);
    let telegram = if polling {
        HealthCheck { status: "ready", detail: "update polling is running".to_string() }
    } else {
        HealthCheck {
            status: "degraded",
            detail: "update polling is failing or stopped".to_string(),
        }
    };

    let payload = HealthResponse {
        status: if polling { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "taskrelay runtime initialized".to_string(),
        },
        telegram,
        active_sessions: state.coordinator.active_sessions(),
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if polling { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}
