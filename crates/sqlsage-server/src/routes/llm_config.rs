//! LLM configuration routes. API keys never appear in responses.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use super::error_response;
use crate::state::AppState;
use sqlsage_core::Error;
use sqlsage_generate::types::LlmConfigUpdate;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/llm/config", get(get_config).put(update_config))
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let response = state.llm_config.read().to_response();
    Json(serde_json::json!(response))
}

pub async fn update_config(
    State(state): State<Arc<AppState>>,
    Json(update): Json<LlmConfigUpdate>,
) -> (StatusCode, Json<serde_json::Value>) {
    let response = {
        let mut config = state.llm_config.write();
        config.apply_update(&update);
        if let Err(e) = config.save() {
            warn!("Failed to persist LLM config: {}", e);
            return error_response(Error::Storage(format!(
                "could not persist LLM config: {}",
                e
            )));
        }
        config.to_response()
    };
    (StatusCode::OK, Json(serde_json::json!(response)))
}
