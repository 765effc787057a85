use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bootstrap::GuardStatus;
use crate::server::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub initialized: bool,
    pub state: GuardStatus,
}

/// GET /health; reports the client state without starting it
pub async fn handler(State(state): State<AppState>) -> impl IntoResponse {
    let client_state = state.guard.status();
    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        initialized: client_state == GuardStatus::Ready,
        state: client_state,
    })
}
