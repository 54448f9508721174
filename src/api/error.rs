use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::application::AppError;

pub fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({ "error": message.into() }))).into_response()
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) | AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        AppError::AccountNotFound(_) => StatusCode::NOT_FOUND,
        AppError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        match &self {
            AppError::Persistence(inner) => error!(error = %format!("{inner:#}"), "request failed"),
            AppError::InsufficientBalance {
                account_number,
                available,
                required,
            } => warn!(%account_number, available, required, "insufficient balance"),
            _ => {}
        }
        json_error(status, self.to_string())
    }
}

/// Malformed or mistyped JSON bodies are client errors.
pub fn rejection_response(rejection: JsonRejection) -> Response {
    json_error(
        StatusCode::BAD_REQUEST,
        format!("invalid request body: {}", rejection.body_text()),
    )
}
