//! Translates any crate-local `Classify` error into an HTTP response (spec
//! §7 "Propagation" — the REST adapter maps `ErrorKind` onto status codes).

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use teleclaude_core::{Classify, ErrorKind};

pub struct ApiError {
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }
}

impl<E> From<E> for ApiError
where
    E: Classify + std::fmt::Display,
{
    fn from(err: E) -> Self {
        let kind = err.classify();
        let message = err.to_string();
        Self { kind, message }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.kind.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(json!({
            "error": self.kind.as_str(),
            "message": self.message,
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
