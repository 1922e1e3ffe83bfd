//! Context retriever — wraps the vector store with per-category limits.
//!
//! Every lookup embeds the question and runs one project-scoped
//! similarity search. Project isolation is structural: the store filter
//! is applied before ranking, so a query against project A can never
//! surface project B's records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use sqlsage_core::{Error, Result};
use sqlsage_embed::EmbeddingBackend;
use sqlsage_store::{RecordCategory, RecordPayload, VectorStore};

/// Per-category result-count limits.
#[derive(Debug, Clone, Copy)]
pub struct RetrievalLimits {
    pub k_sql: usize,
    pub k_ddl: usize,
    pub k_doc: usize,
}

impl Default for RetrievalLimits {
    fn default() -> Self {
        Self {
            k_sql: 10,
            k_ddl: 10,
            k_doc: 10,
        }
    }
}

/// A retrieved question/SQL exemplar.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuestionSqlPair {
    pub question: String,
    pub sql: String,
}

/// Context gathered for one question, most relevant first per category.
#[derive(Debug, Clone, Default)]
pub struct RetrievedContext {
    pub ddl: Vec<String>,
    pub documentation: Vec<String>,
    pub sample_pairs: Vec<QuestionSqlPair>,
}

pub struct ContextRetriever {
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
    limits: RetrievalLimits,
}

impl ContextRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingBackend>,
        limits: RetrievalLimits,
    ) -> Self {
        Self {
            store,
            embedder,
            limits,
        }
    }

    fn embed_question(&self, question: &str) -> Result<Vec<f32>> {
        if question.trim().is_empty() {
            return Err(Error::Validation("question text cannot be empty".into()));
        }
        self.embedder.embed(question)
    }

    /// Related documentation texts, most relevant first.
    pub fn related_documentation(&self, question: &str, project_id: &str) -> Result<Vec<String>> {
        let embedding = self.embed_question(question)?;
        self.documentation_for(&embedding, project_id)
    }

    /// Related DDL statements, most relevant first.
    pub fn related_ddl(&self, question: &str, project_id: &str) -> Result<Vec<String>> {
        let embedding = self.embed_question(question)?;
        self.ddl_for(&embedding, project_id)
    }

    /// Similar question/SQL pairs, most relevant first.
    pub fn similar_question_sql(
        &self,
        question: &str,
        project_id: &str,
    ) -> Result<Vec<QuestionSqlPair>> {
        let embedding = self.embed_question(question)?;
        self.pairs_for(&embedding, project_id)
    }

    /// All three category lookups for one question, sharing a single
    /// embedding call.
    pub fn retrieve(&self, question: &str, project_id: &str) -> Result<RetrievedContext> {
        let embedding = self.embed_question(question)?;
        let context = RetrievedContext {
            ddl: self.ddl_for(&embedding, project_id)?,
            documentation: self.documentation_for(&embedding, project_id)?,
            sample_pairs: self.pairs_for(&embedding, project_id)?,
        };
        debug!(
            "Retrieved context for project {}: {} ddl, {} docs, {} pairs",
            project_id,
            context.ddl.len(),
            context.documentation.len(),
            context.sample_pairs.len()
        );
        Ok(context)
    }

    fn ddl_for(&self, embedding: &[f32], project_id: &str) -> Result<Vec<String>> {
        let hits = self.store.similarity_search(
            RecordCategory::Ddl,
            project_id,
            embedding,
            self.limits.k_ddl,
        )?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match hit.record.payload {
                RecordPayload::Ddl { ddl } => Some(ddl),
                _ => None,
            })
            .collect())
    }

    fn documentation_for(&self, embedding: &[f32], project_id: &str) -> Result<Vec<String>> {
        let hits = self.store.similarity_search(
            RecordCategory::Documentation,
            project_id,
            embedding,
            self.limits.k_doc,
        )?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match hit.record.payload {
                RecordPayload::Documentation { documentation } => Some(documentation),
                _ => None,
            })
            .collect())
    }

    fn pairs_for(&self, embedding: &[f32], project_id: &str) -> Result<Vec<QuestionSqlPair>> {
        let hits = self.store.similarity_search(
            RecordCategory::Sql,
            project_id,
            embedding,
            self.limits.k_sql,
        )?;
        Ok(hits
            .into_iter()
            .filter_map(|hit| match hit.record.payload {
                RecordPayload::Sql { question, sql } => Some(QuestionSqlPair { question, sql }),
                _ => None,
            })
            .collect())
    }
}
