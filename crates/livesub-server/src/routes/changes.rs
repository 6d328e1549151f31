//! Lifecycle notifications from the persistence layer.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tracing::debug;

use livesub_core::{DispatchReport, LifecycleNotification};

use crate::error::{Error, Result};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/changes", post(apply_change))
        .route("/changes/enqueue", post(enqueue_change))
}

fn validate(notification: &LifecycleNotification) -> Result<()> {
    if notification.entity_type.is_empty() {
        return Err(Error::InvalidRequest("entity_type must not be empty".to_string()));
    }
    if notification.before.is_none() && notification.after.is_none() {
        return Err(Error::InvalidRequest(
            "notification carries neither a before nor an after image".to_string(),
        ));
    }
    Ok(())
}

/// Translate and publish synchronously.
async fn apply_change(
    State(state): State<AppState>,
    Json(notification): Json<LifecycleNotification>,
) -> Result<Json<DispatchReport>> {
    validate(&notification)?;
    let report = state.broker.translator().apply(&notification);
    debug!(
        model = %notification.entity_type,
        groups = report.groups,
        recipients = report.recipients,
        "applied change"
    );
    Ok(Json(report))
}

/// Hand the notification to the CDC queue.
async fn enqueue_change(
    State(state): State<AppState>,
    Json(notification): Json<LifecycleNotification>,
) -> Result<(StatusCode, Json<Value>)> {
    validate(&notification)?;
    state.cdc.try_send(notification)?;
    Ok((StatusCode::ACCEPTED, Json(json!({ "queued": true }))))
}
