use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let registry = state.broker.registry();

    Json(json!({
        "status": "healthy",
        "service": "livesub-server",
        "version": env!("CARGO_PKG_VERSION"),
        "protocol_version": livesub_core::proto::PROTOCOL_VERSION,
        "models": registry.model_labels().count(),
        "sessions": {
            "active": state.broker.sessions().session_count(),
            "max": state.config.broker.max_sessions,
        }
    }))
}
