//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use sqlsage_core::SqlSageConfig;
use sqlsage_embed::EmbeddingBackend;
use sqlsage_generate::{GenerationOrchestrator, LlmClient, LlmConfig};
use sqlsage_retrieve::{ContextRetriever, RetrievalLimits};
use sqlsage_store::{KnowledgeService, SqliteStore, VectorStore};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    pub config: SqlSageConfig,
    pub relational: Arc<SqliteStore>,
    pub vectors: Arc<dyn VectorStore>,
    pub embedder: Arc<dyn EmbeddingBackend>,
    pub knowledge: Arc<KnowledgeService>,
    pub orchestrator: GenerationOrchestrator,
    pub llm_config: Arc<RwLock<LlmConfig>>,
}

impl AppState {
    /// Wire the engine together. The store, embedder, and LLM client are
    /// constructed by the caller and passed down, so tests can substitute
    /// any of them.
    pub fn new(
        config: SqlSageConfig,
        relational: Arc<SqliteStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        llm_config: Arc<RwLock<LlmConfig>>,
        llm: Arc<dyn LlmClient>,
    ) -> Self {
        let limits = RetrievalLimits {
            k_sql: config.n_results_sql,
            k_ddl: config.n_results_ddl,
            k_doc: config.n_results_documentation,
        };
        let retriever = Arc::new(ContextRetriever::new(
            vectors.clone(),
            embedder.clone(),
            limits,
        ));
        let knowledge = Arc::new(KnowledgeService::new(
            relational.clone(),
            vectors.clone(),
            embedder.clone(),
        ));
        let orchestrator = GenerationOrchestrator::new(
            relational.clone(),
            retriever,
            knowledge.clone(),
            llm,
            Duration::from_secs(config.llm_timeout_secs),
        );

        Self {
            config,
            relational,
            vectors,
            embedder,
            knowledge,
            orchestrator,
            llm_config,
        }
    }
}
