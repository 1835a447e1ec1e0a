use super::{body_or_default, with_db, ApiError, AppState};
use crate::db::models::Thread;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct CreateThreadRequest {
    #[serde(default)]
    pub thread_id: String,
}

#[derive(Debug, Serialize)]
pub struct CreateThreadResponse {
    pub thread_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AddMessageRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub role: String,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub message: String,
}

pub async fn create_thread(
    State(state): State<AppState>,
    payload: Result<Json<CreateThreadRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateThreadResponse>), ApiError> {
    let req: CreateThreadRequest = body_or_default(payload)?;
    let thread = with_db(&state, move |db| db.create_thread(&req.thread_id)).await?;
    tracing::info!(thread_id = %thread.thread_id, "thread created");
    Ok((
        StatusCode::CREATED,
        Json(CreateThreadResponse {
            thread_id: thread.thread_id,
        }),
    ))
}

pub async fn add_message(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
    payload: Result<Json<AddMessageRequest>, JsonRejection>,
) -> Result<Json<Thread>, ApiError> {
    let req: AddMessageRequest = body_or_default(payload)?;
    let id = thread_id.clone();
    with_db(&state, move |db| db.add_message(&id, &req.content, &req.role))
        .await?
        .map(Json)
        .ok_or(ApiError::ThreadNotFound(thread_id))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<Thread>, ApiError> {
    let id = thread_id.clone();
    with_db(&state, move |db| db.get_thread(&id))
        .await?
        .map(Json)
        .ok_or(ApiError::ThreadNotFound(thread_id))
}

pub async fn reset_thread(
    State(state): State<AppState>,
    Path(thread_id): Path<String>,
) -> Result<Json<ResetResponse>, ApiError> {
    let id = thread_id.clone();
    if !with_db(&state, move |db| db.reset_thread(&id)).await? {
        return Err(ApiError::ThreadNotFound(thread_id));
    }
    tracing::info!(thread_id = %thread_id, "thread reset");
    Ok(Json(ResetResponse {
        message: "Thread reset successfully".to_string(),
    }))
}
