use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Broker(#[from] livesub_core::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        use livesub_core::Error as Broker;

        match self {
            Error::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Error::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            Error::Schema(_) => (StatusCode::INTERNAL_SERVER_ERROR, "SCHEMA_ERROR"),
            Error::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Error::Broker(Broker::TooManySessions(_)) => {
                (StatusCode::SERVICE_UNAVAILABLE, "TOO_MANY_SESSIONS")
            }
            Error::Broker(Broker::QueueFull) => (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_FULL"),
            Error::Broker(Broker::QueueClosed) => {
                (StatusCode::SERVICE_UNAVAILABLE, "QUEUE_CLOSED")
            }
            Error::Broker(Broker::InvalidRecord(_)) => (StatusCode::BAD_REQUEST, "INVALID_RECORD"),
            Error::Broker(Broker::Protocol(_)) => (StatusCode::BAD_REQUEST, "PROTOCOL_ERROR"),
            Error::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
