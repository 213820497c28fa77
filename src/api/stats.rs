//! Health and status endpoints

use axum::{Json, extract::State as AxumState};
use serde::Serialize;

use crate::SharedState;

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub uptime_seconds: u64,
    pub started_at: String,
    pub topic: String,
}

/// GET / - plain liveness probe
pub async fn root() -> &'static str {
    "git-push-webhook gateway"
}

/// GET /status - uptime and wiring summary
pub async fn status(AxumState(state): AxumState<SharedState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        status: "ok",
        uptime_seconds: state.start_time.elapsed().as_secs(),
        started_at: state.started_at.to_rfc3339(),
        topic: state.producer.topic().to_string(),
    })
}
