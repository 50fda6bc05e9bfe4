use crate::{db, AppState};
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use std::sync::OnceLock;
use std::time::Instant;
use utoipa::ToSchema;

static START_TIME: OnceLock<Instant> = OnceLock::new();

/// Pins the uptime origin; call once at startup.
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub uptime_secs: u64,
    pub database: ComponentStatus,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service and database are up", body = HealthResponse),
        (status = 503, description = "Database unreachable", body = HealthResponse),
    ),
    tag = "Health"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = match db::check_connection(&state.db).await {
        Ok(()) => ComponentStatus::Up,
        Err(_) => ComponentStatus::Down,
    };
    let code = match database {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = HealthResponse {
        status: database.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0),
        database,
    };
    (code, Json(body))
}
