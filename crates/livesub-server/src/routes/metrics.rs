//! Broker introspection.

use axum::{extract::State, routing::get, Json, Router};

use livesub_core::{MetricsSnapshot, SessionSummary};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/metrics", get(metrics))
        .route("/sessions", get(list_sessions))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.broker.metrics().snapshot())
}

async fn list_sessions(State(state): State<AppState>) -> Json<Vec<SessionSummary>> {
    Json(state.broker.sessions().list_sessions())
}
