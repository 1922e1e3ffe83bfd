//! Project routes — CRUD, knowledge ingestion, and chat listing.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::info;

use super::{error_response, Pagination};
use crate::state::AppState;
use sqlsage_core::Error;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/projects", post(create_project).get(list_projects))
        .route(
            "/projects/{project_id}",
            get(get_project).delete(delete_project),
        )
        .route("/projects/{project_id}/schema", post(add_schema))
        .route(
            "/projects/{project_id}/documentation",
            post(add_documentation),
        )
        .route(
            "/projects/{project_id}/sample-queries",
            post(add_sample_queries),
        )
        .route("/projects/{project_id}/knowledge", get(list_knowledge))
        .route(
            "/projects/{project_id}/chats",
            get(list_chats).post(create_chat),
        )
}

// ---------------------------------------------------------------
// Project CRUD
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    #[serde(default)]
    pub schema_text: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
    #[serde(default)]
    pub sample_queries: Option<BTreeMap<String, String>>,
}

pub async fn create_project(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateProjectRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.create_project(
        &req.name,
        req.schema_text.as_deref(),
        req.documentation.as_deref(),
        req.sample_queries.as_ref(),
    ) {
        Ok(project) => {
            info!("Created project {} ({})", project.id, project.name);
            (StatusCode::CREATED, Json(serde_json::json!(project)))
        }
        Err(e) => error_response(e),
    }
}

pub async fn list_projects(
    State(state): State<Arc<AppState>>,
    Query(page): Query<Pagination>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.list_projects(page.skip, page.limit) {
        Ok(projects) => (StatusCode::OK, Json(serde_json::json!(projects))),
        Err(e) => error_response(e),
    }
}

pub async fn get_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.get_project(&project_id) {
        Ok(Some(project)) => (StatusCode::OK, Json(serde_json::json!(project))),
        Ok(None) => error_response(Error::NotFound(format!("project {}", project_id))),
        Err(e) => error_response(e),
    }
}

/// Delete a project and everything it owns. Vector records and chats go
/// first so no record can outlive its project, whatever the vector
/// backend.
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let result = state.knowledge.purge_project(&project_id).and_then(|purged| {
        let chats = state.relational.delete_chats_for_project(&project_id)?;
        let existed = state.relational.delete_project(&project_id)?;
        Ok((purged, chats, existed))
    });

    match result {
        Ok((_, _, false)) => error_response(Error::NotFound(format!("project {}", project_id))),
        Ok((records, chats, true)) => {
            info!(
                "Deleted project {} ({} records, {} chats)",
                project_id, records, chats
            );
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "status": "deleted",
                    "records_deleted": records,
                    "chats_deleted": chats,
                })),
            )
        }
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------
// Knowledge ingestion
// ---------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SchemaRequest {
    pub schema: String,
}

/// Add DDL to the project: the text lands in the vector store for
/// retrieval and replaces the project row's schema snapshot.
pub async fn add_schema(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<SchemaRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let result = state
        .knowledge
        .add_ddl(&project_id, &req.schema)
        .and_then(|id| {
            state.relational.set_schema_text(&project_id, &req.schema)?;
            Ok(id)
        });

    match result {
        Ok(id) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success", "vector_store_id": id })),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct DocumentationRequest {
    pub documentation: String,
}

pub async fn add_documentation(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<DocumentationRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    let result = state
        .knowledge
        .add_documentation(&project_id, &req.documentation)
        .and_then(|id| {
            state
                .relational
                .set_documentation(&project_id, &req.documentation)?;
            Ok(id)
        });

    match result {
        Ok(id) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success", "vector_store_id": id })),
        ),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
pub struct SampleQueriesRequest {
    pub sample_queries: BTreeMap<String, String>,
}

/// Batch-add curated question/SQL pairs: merged into the project row and
/// stored as retrievable exemplars.
pub async fn add_sample_queries(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<SampleQueriesRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    if req.sample_queries.is_empty() {
        return error_response(Error::Validation("sample_queries cannot be empty".into()));
    }

    let result = state
        .relational
        .merge_sample_queries(&project_id, &req.sample_queries)
        .and_then(|_| {
            let mut ids = Vec::with_capacity(req.sample_queries.len());
            for (question, sql) in &req.sample_queries {
                ids.push(state.knowledge.add_question_sql(&project_id, question, sql)?);
            }
            Ok(ids)
        });

    match result {
        Ok(ids) => (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "success", "vector_store_ids": ids })),
        ),
        Err(e) => error_response(e),
    }
}

pub async fn list_knowledge(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    let result = state.knowledge.list_ddl(&project_id).and_then(|ddl| {
        let documentation = state.knowledge.list_documentation(&project_id)?;
        let sql = state.knowledge.list_question_sql(&project_id)?;
        Ok((ddl, documentation, sql))
    });

    match result {
        Ok((ddl, documentation, sql)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "ddl": ddl,
                "documentation": documentation,
                "sql": sql,
            })),
        ),
        Err(e) => error_response(e),
    }
}

// ---------------------------------------------------------------
// Chats under a project
// ---------------------------------------------------------------

pub async fn list_chats(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(page): Query<Pagination>,
) -> (StatusCode, Json<serde_json::Value>) {
    if let Err(e) = ensure_project(&state, &project_id) {
        return error_response(e);
    }
    match state
        .relational
        .list_chats_for_project(&project_id, page.skip, page.limit)
    {
        Ok(chats) => (StatusCode::OK, Json(serde_json::json!(chats))),
        Err(e) => error_response(e),
    }
}

pub async fn create_chat(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> (StatusCode, Json<serde_json::Value>) {
    match state.relational.create_chat(&project_id) {
        Ok(chat) => (StatusCode::CREATED, Json(serde_json::json!(chat))),
        Err(e) => error_response(e),
    }
}

fn ensure_project(state: &AppState, project_id: &str) -> sqlsage_core::Result<()> {
    match state.relational.get_project(project_id)? {
        Some(_) => Ok(()),
        None => Err(Error::NotFound(format!("project {}", project_id))),
    }
}
