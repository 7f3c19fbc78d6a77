use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::success;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "ticketing-api",
    };

    success(payload, "Health check successful")
}

/// Liveness plus a round trip to the database.
pub async fn readiness_check(State(state): State<AppState>) -> Result<Response, AppError> {
    sqlx::query("SELECT 1").execute(&state.pool).await?;

    let payload = HealthPayload {
        status: "ready",
        service: "ticketing-api",
    };
    Ok(success(payload, "Database reachable"))
}
