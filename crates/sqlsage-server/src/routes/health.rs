//! Health route — store counts and active engine configuration.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use sqlsage_embed::EmbeddingBackend;
use sqlsage_store::{RecordCategory, VectorStore};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let llm_available = state.llm_config.read().resolve_provider().is_some();

    Json(serde_json::json!({
        "status": "healthy",
        "service": "sqlsage",
        "projects": state.relational.count_projects().unwrap_or(0),
        "records": {
            "sql": state.vectors.count(RecordCategory::Sql).unwrap_or(0),
            "ddl": state.vectors.count(RecordCategory::Ddl).unwrap_or(0),
            "documentation": state.vectors.count(RecordCategory::Documentation).unwrap_or(0),
        },
        "embedding": {
            "provider": state.embedder.name(),
            "dimension": state.embedder.dimension(),
        },
        "llm_available": llm_available,
    }))
}
