//! API tests — exercise the route handlers directly against an isolated
//! state (temp-dir SQLite store, hashing embedder, canned LLM), then
//! assert on the response statuses and JSON shapes the frontend relies
//! on.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use parking_lot::RwLock;
use tempfile::TempDir;

use sqlsage_core::SqlSageConfig;
use sqlsage_embed::{EmbeddingBackend, HashEmbedder};
use sqlsage_generate::{LlmClient, LlmConfig};
use sqlsage_server::routes::{chats, health, knowledge, llm_config, projects, Pagination};
use sqlsage_server::state::AppState;
use sqlsage_store::{SqliteStore, VectorStore};

struct StaticLlm(&'static str);

#[async_trait::async_trait]
impl LlmClient for StaticLlm {
    async fn generate(&self, _: &str, _: &str, _: f64) -> sqlsage_core::Result<String> {
        Ok(self.0.to_string())
    }
}

fn test_state(sql: &'static str) -> (Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = SqlSageConfig::from_env(dir.path()).unwrap();

    let relational = Arc::new(
        SqliteStore::open(&config.data_paths.database, config.embedding_dim).unwrap(),
    );
    let vectors: Arc<dyn VectorStore> = relational.clone();
    let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(config.embedding_dim));
    let llm_config = Arc::new(RwLock::new(LlmConfig {
        config_path: dir.path().join("llm-config.json"),
        ..Default::default()
    }));
    let llm: Arc<dyn LlmClient> = Arc::new(StaticLlm(sql));

    let state = Arc::new(AppState::new(
        config, relational, vectors, embedder, llm_config, llm,
    ));
    (state, dir)
}

fn req<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}

async fn make_project(state: &Arc<AppState>, name: &str) -> String {
    let (status, Json(body)) = projects::create_project(
        State(state.clone()),
        Json(req(serde_json::json!({ "name": name }))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

async fn make_chat(state: &Arc<AppState>, project_id: &str) -> i64 {
    let (status, Json(body)) =
        projects::create_chat(State(state.clone()), Path(project_id.to_string())).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_project_lifecycle() {
    let (state, _dir) = test_state("SELECT 1;");

    let project_id = make_project(&state, "Sales Analytics").await;

    let (status, Json(body)) =
        projects::get_project(State(state.clone()), Path(project_id.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Sales Analytics");

    let (status, Json(body)) =
        projects::list_projects(State(state.clone()), Query(Pagination::default())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 1);

    let (status, _) = projects::delete_project(State(state.clone()), Path(project_id.clone())).await;
    assert_eq!(status, StatusCode::OK);

    let (status, Json(body)) = projects::get_project(State(state.clone()), Path(project_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
    assert!(body["error"]["message"].is_string());
}

#[tokio::test]
async fn test_knowledge_flow() {
    let (state, _dir) = test_state("SELECT 1;");
    let project_id = make_project(&state, "P").await;

    let (status, Json(body)) = projects::add_schema(
        State(state.clone()),
        Path(project_id.clone()),
        Json(req(serde_json::json!({
            "schema": "CREATE TABLE sales(id INT, amount DECIMAL);"
        }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ddl_id = body["vector_store_id"].as_str().unwrap().to_string();
    assert!(ddl_id.ends_with("-ddl"));

    let (status, _) = projects::add_documentation(
        State(state.clone()),
        Path(project_id.clone()),
        Json(req(serde_json::json!({
            "documentation": "amounts are stored in cents"
        }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, Json(body)) = projects::add_sample_queries(
        State(state.clone()),
        Path(project_id.clone()),
        Json(req(serde_json::json!({
            "sample_queries": { "total sales?": "SELECT SUM(amount) FROM sales;" }
        }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["vector_store_ids"].as_array().unwrap().len(), 1);

    let (status, Json(body)) =
        projects::list_knowledge(State(state.clone()), Path(project_id.clone())).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ddl"].as_array().unwrap().len(), 1);
    assert_eq!(body["documentation"].as_array().unwrap().len(), 1);
    assert_eq!(body["sql"].as_array().unwrap().len(), 1);
    // Embeddings stay internal; payloads are exposed.
    assert!(body["ddl"][0]["embedding"].is_null());
    assert_eq!(
        body["ddl"][0]["ddl"],
        "CREATE TABLE sales(id INT, amount DECIMAL);"
    );

    let (status, _) = knowledge::delete_record(State(state.clone()), Path(ddl_id.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = knowledge::delete_record(State(state.clone()), Path(ddl_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_generate_and_feedback_roundtrip() {
    let (state, _dir) = test_state("SELECT SUM(amount) FROM sales;");
    let project_id = make_project(&state, "P").await;

    projects::add_schema(
        State(state.clone()),
        Path(project_id.clone()),
        Json(req(serde_json::json!({
            "schema": "CREATE TABLE sales(id INT, amount DECIMAL);"
        }))),
    )
    .await;

    let chat_id = make_chat(&state, &project_id).await;

    let (status, Json(body)) = chats::generate_sql(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "text": "what is the total sales amount?" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], "SELECT SUM(amount) FROM sales;");
    assert_eq!(body["chat_id"], chat_id);
    assert_eq!(body["feedback_enabled"], true);

    let (status, Json(body)) = chats::provide_feedback(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "is_correct": true, "add_to_samples": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_enabled"], false);
    assert!(body["sql"].is_null());

    let (status, Json(body)) = chats::get_chat(State(state.clone()), Path(chat_id)).await;
    assert_eq!(status, StatusCode::OK);
    let history = body["query_history"].as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["is_correct"], true);

    // The confirmed pair is retrievable knowledge now.
    let (_, Json(body)) =
        projects::list_knowledge(State(state.clone()), Path(project_id.clone())).await;
    assert_eq!(body["sql"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_negative_feedback_regenerates() {
    let (state, _dir) = test_state("SELECT SUM(amount) FROM sales;");
    let project_id = make_project(&state, "P").await;
    let chat_id = make_chat(&state, &project_id).await;

    chats::generate_sql(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "text": "total sales?" }))),
    )
    .await;

    let (status, Json(body)) = chats::provide_feedback(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "is_correct": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sql"], "SELECT SUM(amount) FROM sales;");
    assert_eq!(body["feedback_enabled"], true);

    let (_, Json(body)) = chats::get_chat(State(state.clone()), Path(chat_id)).await;
    let history = body["query_history"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["is_correct"], false);
    assert!(history[1]["is_correct"].is_null());
}

#[tokio::test]
async fn test_validation_errors_are_bad_request() {
    let (state, _dir) = test_state("SELECT 1;");
    let project_id = make_project(&state, "P").await;
    let chat_id = make_chat(&state, &project_id).await;

    let (status, Json(body)) = chats::generate_sql(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "text": "   " }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    // Feedback on an empty history is a validation failure too.
    let (status, Json(body)) = chats::provide_feedback(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "is_correct": true }))),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "validation");

    let (status, Json(body)) = projects::add_schema(
        State(state.clone()),
        Path("missing-project".to_string()),
        Json(req(serde_json::json!({ "schema": "CREATE TABLE t(a INT);" }))),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn test_patch_chat_feedback_flag() {
    let (state, _dir) = test_state("SELECT 1;");
    let project_id = make_project(&state, "P").await;
    let chat_id = make_chat(&state, &project_id).await;

    let (status, Json(body)) = chats::patch_chat(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({ "feedback_enabled": false }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_enabled"], false);

    // An empty patch changes nothing.
    let (status, Json(body)) = chats::patch_chat(
        State(state.clone()),
        Path(chat_id),
        Json(req(serde_json::json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["feedback_enabled"], false);
}

#[tokio::test]
async fn test_delete_project_cascades_to_chats_and_records() {
    let (state, _dir) = test_state("SELECT 1;");
    let project_id = make_project(&state, "P").await;
    let chat_id = make_chat(&state, &project_id).await;

    projects::add_schema(
        State(state.clone()),
        Path(project_id.clone()),
        Json(req(serde_json::json!({ "schema": "CREATE TABLE t(a INT);" }))),
    )
    .await;

    let (status, Json(body)) =
        projects::delete_project(State(state.clone()), Path(project_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["records_deleted"], 1);
    assert_eq!(body["chats_deleted"], 1);

    let (status, _) = chats::get_chat(State(state.clone()), Path(chat_id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_shape() {
    let (state, _dir) = test_state("SELECT 1;");
    let Json(body) = health::get_health(State(state.clone())).await;

    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "sqlsage");
    assert!(body["projects"].is_number());
    assert!(body["records"]["sql"].is_number());
    assert!(body["embedding"]["dimension"].is_number());
    assert_eq!(body["embedding"]["provider"], "hashing-v1");
    assert!(body["llm_available"].is_boolean());
}

#[tokio::test]
async fn test_llm_config_masks_keys() {
    let (state, _dir) = test_state("SELECT 1;");

    let (status, Json(body)) = llm_config::update_config(
        State(state.clone()),
        Json(req(serde_json::json!({
            "preferred_provider": "groq",
            "groq_api_key": "super-secret-key"
        }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["groq_configured"], true);
    assert_eq!(body["active_provider"], "groq");
    assert!(!body.to_string().contains("super-secret-key"));

    let Json(body) = llm_config::get_config(State(state.clone())).await;
    assert!(!body.to_string().contains("super-secret-key"));
}
