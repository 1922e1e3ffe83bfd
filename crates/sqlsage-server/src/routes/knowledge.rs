//! Knowledge item deletion by record id.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::delete;
use axum::{Json, Router};

use super::error_response;
use crate::state::AppState;
use sqlsage_core::Error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/knowledge/{record_id}", delete(delete_record))
}

pub async fn delete_record(
    State(state): State<Arc<AppState>>,
    Path(record_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.knowledge.remove_item(&record_id) {
        Ok(true) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "deleted", "id": record_id })),
        ),
        Ok(false) => error_response(Error::NotFound(format!("record {}", record_id))),
        Err(e) => error_response(e),
    }
}
