//! livesub server - WebSocket and HTTP front end for the subscription broker.
//!
//! Clients connect to `GET /ws` and send subscribe/unsubscribe frames; the
//! persistence layer reports committed changes to `POST /changes` (or the
//! queued `POST /changes/enqueue`) and matching sessions are notified.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod schema;
pub mod state;
pub mod ws;

use axum::{routing::get, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::routes())
        .merge(routes::metrics::routes())
        .merge(routes::changes::routes())
        .route("/ws", get(ws::ws_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
