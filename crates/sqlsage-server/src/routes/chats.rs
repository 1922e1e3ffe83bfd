//! Chat routes — generation, feedback, and chat settings.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Deserializer};

use super::error_response;
use crate::state::AppState;
use sqlsage_core::Error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/chats/{chat_id}",
            get(get_chat).patch(patch_chat).delete(delete_chat),
        )
        .route("/chats/{chat_id}/generate", post(generate_sql))
        .route("/chats/{chat_id}/feedback", post(provide_feedback))
}

pub async fn get_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.get_chat(chat_id) {
        Ok(Some(chat)) => (StatusCode::OK, Json(serde_json::json!(chat))),
        Ok(None) => error_response(Error::NotFound(format!("chat {}", chat_id))),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub text: String,
}

pub async fn generate_sql(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(req): Json<QueryRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.orchestrator.generate(chat_id, &req.text).await {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    pub is_correct: bool,
    #[serde(default)]
    pub add_to_samples: bool,
}

pub async fn provide_feedback(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(req): Json<FeedbackRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state
        .orchestrator
        .provide_feedback(chat_id, req.is_correct, req.add_to_samples)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(serde_json::json!(outcome))),
        Err(e) => error_response(e),
    }
}

/// Distinguishes an absent field from an explicit null so the tri-state
/// flag can be cleared as well as set.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<bool>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<bool>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatPatchRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub feedback_enabled: Option<Option<bool>>,
}

pub async fn patch_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
    Json(req): Json<ChatPatchRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    // Settings changes go through the orchestrator so they hold the
    // same per-chat guard as generate and feedback.
    let result = match req.feedback_enabled {
        Some(value) => state.orchestrator.set_feedback_enabled(chat_id, value).await,
        None => match state.relational.get_chat(chat_id) {
            Ok(Some(chat)) => Ok(chat),
            Ok(None) => Err(Error::NotFound(format!("chat {}", chat_id))),
            Err(e) => Err(e),
        },
    };

    match result {
        Ok(chat) => (StatusCode::OK, Json(serde_json::json!(chat))),
        Err(e) => error_response(e),
    }
}

pub async fn delete_chat(
    State(state): State<Arc<AppState>>,
    Path(chat_id): Path<i64>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.delete_chat(chat_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "deleted" })),
        ),
        Ok(false) => error_response(Error::NotFound(format!("chat {}", chat_id))),
        Err(e) => error_response(e),
    }
}
