//! HTTP route handlers.
//!
//! Handlers return `(StatusCode, Json<Value>)` tuples; every core error
//! maps onto its HTTP status through [`error_response`], exposing only
//! the category label and a human-readable reason.

pub mod chats;
pub mod health;
pub mod knowledge;
pub mod llm_config;
pub mod projects;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::{Json, Router};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::state::AppState;
use sqlsage_core::Error;

/// Build the main Axum router with all routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(health::routes())
        .merge(projects::routes())
        .merge(chats::routes())
        .merge(knowledge::routes())
        .merge(llm_config::routes())
}

/// Map a core error to its HTTP status and structured body.
pub fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    let status = match &err {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::Validation(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(serde_json::json!({
            "error": { "kind": err.kind(), "message": err.to_string() }
        })),
    )
}

/// Skip/limit pagination query parameters.
#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    100
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: default_limit(),
        }
    }
}
