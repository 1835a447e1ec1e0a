pub mod chat;
pub mod threads;

use crate::db::Database;
use crate::llm::assistant::{ChatBridge, ChatError};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Body returned for every timeout and generic failure.
pub const FAILURE_MESSAGE: &str = "Oh no, an error occurred. Please try again later.";

/// Dependencies shared by all handlers, built once at start-up.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub chat: ChatBridge,
    pub request_timeout: Duration,
}

pub fn router(state: AppState) -> Router {
    let timeout = state.request_timeout;
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/api/init-chat/", post(chat::init_chat))
        .route("/api/init-chat", post(chat::init_chat))
        .route("/api/create-thread", post(threads::create_thread))
        .route("/api/threads/{thread_id}", get(threads::get_thread))
        .route("/api/threads/{thread_id}/add-message", post(threads::add_message))
        .route("/api/threads/{thread_id}/reset", post(threads::reset_thread))
        .layer(middleware::from_fn_with_state(timeout, enforce_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "server is running"
}

/// Drops the in-flight handler once the budget is spent. Remote work is not cancelled.
async fn enforce_timeout(State(budget): State<Duration>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(budget, next.run(req)).await {
        Ok(resp) => resp,
        Err(_) => ApiError::Timeout.into_response(),
    }
}

/// Unwraps a JSON body. A request without a JSON content type reads as an empty object.
fn body_or_default<T: Default>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::MissingJsonContentType(_)) => Ok(T::default()),
        Err(rejection) => Err(rejection.into()),
    }
}

/// Runs a store operation on the blocking pool so the connection lock never stalls a worker.
async fn with_db<T, F>(state: &AppState, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(&state.db);
    Ok(tokio::task::spawn_blocking(move || op(&db)).await??)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("thread not found: {0}")]
    ThreadNotFound(String),
    #[error("request timed out")]
    Timeout,
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("chat error: {0}")]
    Chat(ChatError),
    #[error("invalid request body: {0}")]
    Body(#[from] JsonRejection),
    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::PollExhausted { .. } => {
                tracing::warn!("{err}");
                ApiError::Timeout
            }
            other => ApiError::Chat(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::ThreadNotFound(id) => {
                tracing::debug!(thread_id = %id, "thread not found");
                (StatusCode::NOT_FOUND, "Thread not found").into_response()
            }
            ApiError::Timeout => {
                tracing::error!("request timed out");
                failure(StatusCode::GATEWAY_TIMEOUT)
            }
            _ => {
                tracing::error!(error = %self, "request failed");
                failure(StatusCode::INTERNAL_SERVER_ERROR)
            }
        }
    }
}

fn failure(status: StatusCode) -> Response {
    (status, Json(json!({ "message": FAILURE_MESSAGE }))).into_response()
}
