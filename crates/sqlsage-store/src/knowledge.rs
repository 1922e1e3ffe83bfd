//! Knowledge service — application-layer write path for vector records.
//!
//! Fronts the vector store with the checks every write must pass:
//! the owning project exists (foreign-key discipline even for backends
//! without real foreign keys), the text is non-empty, and the embedding
//! call succeeded. An embedding failure aborts the write; nothing is
//! ever stored with a placeholder vector.

use std::sync::Arc;

use tracing::debug;

use crate::sqlite::SqliteStore;
use crate::types::{Project, RecordCategory, RecordPayload, VectorRecord};
use crate::vector::VectorStore;
use sqlsage_core::{Error, Result};
use sqlsage_embed::EmbeddingBackend;

pub struct KnowledgeService {
    relational: Arc<SqliteStore>,
    vectors: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingBackend>,
}

impl KnowledgeService {
    pub fn new(
        relational: Arc<SqliteStore>,
        vectors: Arc<dyn VectorStore>,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Self {
        Self {
            relational,
            vectors,
            embedder,
        }
    }

    pub fn vectors(&self) -> &Arc<dyn VectorStore> {
        &self.vectors
    }

    fn ensure_project(&self, project_id: &str) -> Result<Project> {
        self.relational
            .get_project(project_id)?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))
    }

    fn add_payload(&self, project_id: &str, payload: RecordPayload) -> Result<String> {
        self.ensure_project(project_id)?;
        let embedding = self.embedder.embed(&payload.embedding_text())?;
        let id = self.vectors.add(payload, project_id, embedding)?;
        if self.vectors.provider_name()?.is_none() {
            self.vectors.set_provider_name(self.embedder.name())?;
        }
        debug!("Stored {} for project {}", id, project_id);
        Ok(id)
    }

    /// Add a DDL statement to the project's knowledge.
    pub fn add_ddl(&self, project_id: &str, ddl: &str) -> Result<String> {
        if ddl.trim().is_empty() {
            return Err(Error::Validation("DDL text cannot be empty".into()));
        }
        self.add_payload(project_id, RecordPayload::Ddl { ddl: ddl.to_string() })
    }

    /// Add documentation text to the project's knowledge.
    pub fn add_documentation(&self, project_id: &str, documentation: &str) -> Result<String> {
        if documentation.trim().is_empty() {
            return Err(Error::Validation("documentation text cannot be empty".into()));
        }
        self.add_payload(
            project_id,
            RecordPayload::Documentation {
                documentation: documentation.to_string(),
            },
        )
    }

    /// Add a question/SQL pair to the project's knowledge.
    pub fn add_question_sql(&self, project_id: &str, question: &str, sql: &str) -> Result<String> {
        if question.trim().is_empty() || sql.trim().is_empty() {
            return Err(Error::Validation("question and SQL cannot be empty".into()));
        }
        self.add_payload(
            project_id,
            RecordPayload::Sql {
                question: question.to_string(),
                sql: sql.to_string(),
            },
        )
    }

    /// Delete a knowledge item by id. Returns whether anything was
    /// deleted.
    pub fn remove_item(&self, record_id: &str) -> Result<bool> {
        self.vectors.remove(record_id)
    }

    pub fn list_ddl(&self, project_id: &str) -> Result<Vec<VectorRecord>> {
        self.ensure_project(project_id)?;
        self.vectors.list_by_project(RecordCategory::Ddl, project_id)
    }

    pub fn list_documentation(&self, project_id: &str) -> Result<Vec<VectorRecord>> {
        self.ensure_project(project_id)?;
        self.vectors
            .list_by_project(RecordCategory::Documentation, project_id)
    }

    pub fn list_question_sql(&self, project_id: &str) -> Result<Vec<VectorRecord>> {
        self.ensure_project(project_id)?;
        self.vectors.list_by_project(RecordCategory::Sql, project_id)
    }

    /// Remove every vector record owned by a project. Called before the
    /// relational project row goes away so records never outlive their
    /// project, whatever the backend.
    pub fn purge_project(&self, project_id: &str) -> Result<usize> {
        self.vectors.delete_all_for_project(project_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use sqlsage_embed::HashEmbedder;
    use tempfile::TempDir;

    fn service() -> (KnowledgeService, Arc<SqliteStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let relational = Arc::new(SqliteStore::open(dir.path(), 64).unwrap());
        let vectors: Arc<dyn VectorStore> = Arc::new(MemoryStore::new(64));
        let embedder: Arc<dyn EmbeddingBackend> = Arc::new(HashEmbedder::new(64));
        (
            KnowledgeService::new(relational.clone(), vectors, embedder),
            relational,
            dir,
        )
    }

    #[test]
    fn test_add_requires_project() {
        let (service, _store, _dir) = service();
        assert!(matches!(
            service.add_ddl("missing", "CREATE TABLE t(a INT);"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_add_rejects_empty_text() {
        let (service, store, _dir) = service();
        let project = store.create_project("P", None, None, None).unwrap();

        assert!(matches!(
            service.add_ddl(&project.id, "   "),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            service.add_question_sql(&project.id, "q", ""),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_add_and_list_roundtrip() {
        let (service, store, _dir) = service();
        let project = store.create_project("P", None, None, None).unwrap();

        let ddl_id = service
            .add_ddl(&project.id, "CREATE TABLE sales(id INT, amount DECIMAL);")
            .unwrap();
        let pair_id = service
            .add_question_sql(&project.id, "total sales?", "SELECT SUM(amount) FROM sales;")
            .unwrap();

        assert_eq!(service.list_ddl(&project.id).unwrap().len(), 1);
        assert_eq!(service.list_question_sql(&project.id).unwrap().len(), 1);

        // Duplicate submission is idempotent
        let ddl_id2 = service
            .add_ddl(&project.id, "CREATE TABLE sales(id INT, amount DECIMAL);")
            .unwrap();
        assert_eq!(ddl_id, ddl_id2);
        assert_eq!(service.list_ddl(&project.id).unwrap().len(), 1);

        assert!(service.remove_item(&pair_id).unwrap());
        assert!(service.list_question_sql(&project.id).unwrap().is_empty());
    }

    #[test]
    fn test_purge_project() {
        let (service, store, _dir) = service();
        let project = store.create_project("P", None, None, None).unwrap();
        service.add_ddl(&project.id, "CREATE TABLE a(x INT);").unwrap();
        service.add_documentation(&project.id, "the a table holds x").unwrap();

        assert_eq!(service.purge_project(&project.id).unwrap(), 2);
        assert!(service.list_ddl(&project.id).unwrap().is_empty());
    }

    #[test]
    fn test_provider_name_recorded_on_first_write() {
        let (service, store, _dir) = service();
        let project = store.create_project("P", None, None, None).unwrap();
        service.add_ddl(&project.id, "CREATE TABLE a(x INT);").unwrap();
        assert_eq!(
            service.vectors().provider_name().unwrap().as_deref(),
            Some("hashing-v1")
        );
    }
}
