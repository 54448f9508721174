use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::application::{AppError, ScheduleRequest, TransferRequest};

use super::AppState;
use super::error::rejection_response;

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Response, AppError> {
    let account = state.service.get_balance(&account_number).await?;
    Ok(Json(account).into_response())
}

pub async fn get_transactions(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Response, AppError> {
    let entries = state.service.list_transactions(&account_number).await?;
    Ok(Json(entries).into_response())
}

pub async fn get_all_transactions(State(state): State<AppState>) -> Result<Response, AppError> {
    let entries = state.service.list_all_transactions().await?;
    Ok(Json(entries).into_response())
}

pub async fn get_schedules(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
) -> Result<Response, AppError> {
    let schedules = state.service.list_schedules(&account_number).await?;
    Ok(Json(schedules).into_response())
}

pub async fn create_transfer(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection_response(rejection)),
    };
    ensure_path_matches(&account_number, &request.from_account)?;

    let result = state.service.transfer(&request).await?;
    Ok(Json(result).into_response())
}

pub async fn create_schedule(
    State(state): State<AppState>,
    Path(account_number): Path<String>,
    body: Result<Json<ScheduleRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => return Ok(rejection_response(rejection)),
    };
    ensure_path_matches(&account_number, &request.from_account)?;

    let result = state.service.create_schedule(&request).await?;
    Ok(Json(result).into_response())
}

pub async fn get_features(State(state): State<AppState>) -> Response {
    Json(state.features.snapshot().config.clone()).into_response()
}

fn ensure_path_matches(path_account: &str, body_account: &str) -> Result<(), AppError> {
    if path_account != body_account {
        return Err(AppError::validation(
            "fromAccount does not match the account in the path",
        ));
    }
    Ok(())
}
