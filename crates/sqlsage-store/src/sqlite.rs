//! SQLite-backed relational + vector store.
//!
//! One database file holds the projects/chats tables and the three
//! vector record tables, so referential integrity between records and
//! their project is enforced by real foreign keys (ON DELETE CASCADE).
//! Similarity search is a brute-force cosine scan over a project's
//! records, which is the intended design at this scale.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};

use crate::schema::{META_SCHEMA_SQL, SCHEMA_SQL, VECTOR_SCHEMA_SQL};
use crate::types::*;
use crate::vector::{deterministic_record_id, rank_by_similarity, VectorStore};
use sqlsage_core::{Error, Result};

/// SQLite store for projects, chats, and vector records.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
    embedding_dim: Mutex<usize>,
}

impl SqliteStore {
    /// Open or create the store.
    ///
    /// `db_dir` is the directory (e.g., `data/db/`). The file will be
    /// `db_dir/sqlsage.db`. The embedding dimension recorded in the
    /// database wins over `embedding_dim` if they disagree; a mismatch
    /// means the deployment changed embedders without migrating.
    pub fn open(db_dir: impl AsRef<Path>, embedding_dim: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref();
        std::fs::create_dir_all(db_dir).map_err(|e| Error::Storage(e.to_string()))?;
        let db_path = db_dir.join("sqlsage.db");

        let conn = Self::create_connection(&db_path)?;
        Self::init_schema(&conn)?;

        let stored_dim = Self::read_meta(&conn, "embedding_dim")?
            .and_then(|v| v.parse::<usize>().ok());
        let dim = match stored_dim {
            Some(d) => {
                if d != embedding_dim {
                    warn!(
                        "Store holds {}-dim embeddings but {} was requested; run `sqlsage migrate`",
                        d, embedding_dim
                    );
                }
                d
            }
            None => {
                Self::write_meta(&conn, "embedding_dim", &embedding_dim.to_string())?;
                embedding_dim
            }
        };

        let store = Self {
            conn: Mutex::new(conn),
            db_path,
            embedding_dim: Mutex::new(dim),
        };

        let projects = store.count_projects()?;
        info!(
            "SqliteStore initialized: {} projects, dim={}, path={}",
            projects,
            dim,
            store.db_path.display()
        );

        Ok(store)
    }

    fn create_connection(db_path: &Path) -> Result<Connection> {
        let conn = Connection::open(db_path).map_err(|e| Error::Database(e.to_string()))?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA synchronous = NORMAL;",
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(conn)
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        let full_schema = format!("{}\n{}\n{}", SCHEMA_SQL, VECTOR_SCHEMA_SQL, META_SCHEMA_SQL);
        conn.execute_batch(&full_schema)
            .map_err(|e| Error::Database(format!("Schema init failed: {}", e)))?;
        Ok(())
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    // ---------------------------------------------------------------
    // Store metadata
    // ---------------------------------------------------------------

    fn read_meta(conn: &Connection, key: &str) -> Result<Option<String>> {
        conn.prepare_cached("SELECT value FROM store_meta WHERE key = ?1")
            .map_err(|e| Error::Database(e.to_string()))?
            .query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    fn write_meta(conn: &Connection, key: &str, value: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO store_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Project CRUD
    // ---------------------------------------------------------------

    /// Create a project. The id is a fresh UUID.
    pub fn create_project(
        &self,
        name: &str,
        schema_text: Option<&str>,
        documentation: Option<&str>,
        sample_queries: Option<&BTreeMap<String, String>>,
    ) -> Result<Project> {
        if name.trim().is_empty() {
            return Err(Error::Validation("project name cannot be empty".into()));
        }
        let id = uuid::Uuid::new_v4().to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let samples_json = sample_queries
            .map(serde_json::to_string)
            .transpose()?;

        let conn = self.conn.lock();
        conn.prepare_cached(
            "INSERT INTO projects (id, name, schema_text, documentation, sample_queries_json, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .map_err(|e| Error::Database(e.to_string()))?
        .execute(params![id, name, schema_text, documentation, samples_json, created_at])
        .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Project {
            id,
            name: name.to_string(),
            schema_text: schema_text.map(str::to_string),
            documentation: documentation.map(str::to_string),
            sample_queries: sample_queries.cloned(),
            created_at,
            chats_count: 0,
        })
    }

    /// Get a project by id.
    pub fn get_project(&self, project_id: &str) -> Result<Option<Project>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM projects WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        stmt.query_row(params![project_id], |row| Ok(Self::row_to_project(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// List projects with chat counts, newest first.
    pub fn list_projects(&self, skip: usize, limit: usize) -> Result<Vec<Project>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT p.*, (SELECT COUNT(*) FROM chats c WHERE c.project_id = p.id) AS chats_count \
                 FROM projects p ORDER BY p.created_at DESC LIMIT ?1 OFFSET ?2",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![limit as i64, skip as i64], |row| {
                let mut project = Self::row_to_project(row);
                project.chats_count = row.get("chats_count").unwrap_or(0);
                Ok(project)
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    pub fn count_projects(&self) -> Result<i64> {
        let conn = self.conn.lock();
        conn.query_row("SELECT COUNT(*) FROM projects", [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Replace the project's documentation text.
    pub fn set_documentation(&self, project_id: &str, documentation: &str) -> Result<()> {
        self.update_project_column(project_id, "documentation", documentation)
    }

    /// Replace the project's schema DDL text.
    pub fn set_schema_text(&self, project_id: &str, schema_text: &str) -> Result<()> {
        self.update_project_column(project_id, "schema_text", schema_text)
    }

    fn update_project_column(&self, project_id: &str, column: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let sql = format!("UPDATE projects SET {} = ?1 WHERE id = ?2", column);
        let count = conn
            .execute(&sql, params![value, project_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        if count == 0 {
            return Err(Error::NotFound(format!("project {}", project_id)));
        }
        Ok(())
    }

    /// Merge sample question/SQL pairs into the project's curated set.
    pub fn merge_sample_queries(
        &self,
        project_id: &str,
        pairs: &BTreeMap<String, String>,
    ) -> Result<Project> {
        let mut project = self
            .get_project(project_id)?
            .ok_or_else(|| Error::NotFound(format!("project {}", project_id)))?;

        let mut samples = project.sample_queries.take().unwrap_or_default();
        for (question, sql) in pairs {
            samples.insert(question.clone(), sql.clone());
        }
        let samples_json = serde_json::to_string(&samples)?;

        let conn = self.conn.lock();
        conn.execute(
            "UPDATE projects SET sample_queries_json = ?1 WHERE id = ?2",
            params![samples_json, project_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;

        project.sample_queries = Some(samples);
        Ok(project)
    }

    /// Delete a project. Chats and vector records cascade via foreign
    /// keys. Returns whether the project existed.
    pub fn delete_project(&self, project_id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM projects WHERE id = ?1", params![project_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    // ---------------------------------------------------------------
    // Chat CRUD
    // ---------------------------------------------------------------

    /// Create a chat under a project.
    pub fn create_chat(&self, project_id: &str) -> Result<Chat> {
        if self.get_project(project_id)?.is_none() {
            return Err(Error::NotFound(format!("project {}", project_id)));
        }
        let created_at = chrono::Utc::now().to_rfc3339();

        let conn = self.conn.lock();
        let id = conn
            .prepare_cached(
                "INSERT INTO chats (project_id, query_history_json, feedback_enabled, created_at) \
                 VALUES (?1, ?2, NULL, ?3)",
            )
            .map_err(|e| Error::Database(e.to_string()))?
            .insert(params![project_id, "[]", created_at])
            .map_err(|e| Error::Database(e.to_string()))?;

        Ok(Chat {
            id,
            project_id: project_id.to_string(),
            query_history: Vec::new(),
            feedback_enabled: None,
            created_at,
        })
    }

    /// Get a chat by id.
    pub fn get_chat(&self, chat_id: i64) -> Result<Option<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached("SELECT * FROM chats WHERE id = ?1")
            .map_err(|e| Error::Database(e.to_string()))?;
        stmt.query_row(params![chat_id], |row| Ok(Self::row_to_chat(row)))
            .optional()
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// List chats for a project, newest first.
    pub fn list_chats_for_project(
        &self,
        project_id: &str,
        skip: usize,
        limit: usize,
    ) -> Result<Vec<Chat>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare_cached(
                "SELECT * FROM chats WHERE project_id = ?1 ORDER BY id DESC LIMIT ?2 OFFSET ?3",
            )
            .map_err(|e| Error::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![project_id, limit as i64, skip as i64], |row| {
                Ok(Self::row_to_chat(row))
            })
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(rows.filter_map(|r| r.ok()).collect())
    }

    /// Apply a validated mutation command to a chat and persist it.
    ///
    /// Maintains the history invariant: only the last entry may be
    /// unjudged. Appending over an unjudged entry marks it accepted,
    /// since the user moved on without disputing it. Each command
    /// writes only the column it modified: a flag change never rewrites
    /// `query_history_json` from its read snapshot, and vice versa.
    pub fn apply_chat_update(&self, chat_id: i64, update: ChatUpdate) -> Result<Chat> {
        let mut chat = self
            .get_chat(chat_id)?
            .ok_or_else(|| Error::NotFound(format!("chat {}", chat_id)))?;

        match update {
            ChatUpdate::SetFeedbackEnabled(value) => {
                chat.feedback_enabled = value;
                let feedback: Option<i64> = value.map(i64::from);
                let conn = self.conn.lock();
                conn.execute(
                    "UPDATE chats SET feedback_enabled = ?1 WHERE id = ?2",
                    params![feedback, chat_id],
                )
                .map_err(|e| Error::Database(e.to_string()))?;
            }
            ChatUpdate::AppendAttempt(attempt) => {
                if let Some(last) = chat.query_history.last_mut() {
                    if last.is_correct.is_none() {
                        last.is_correct = Some(true);
                    }
                }
                chat.query_history.push(attempt);
                self.write_history(chat_id, &chat.query_history)?;
            }
            ChatUpdate::MarkLastJudgement(is_correct) => {
                let last = chat
                    .query_history
                    .last_mut()
                    .ok_or_else(|| Error::Validation("no queries in chat history".into()))?;
                last.is_correct = Some(is_correct);
                self.write_history(chat_id, &chat.query_history)?;
            }
        }

        Ok(chat)
    }

    fn write_history(&self, chat_id: i64, history: &[QueryAttempt]) -> Result<()> {
        let history_json = serde_json::to_string(history)?;
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE chats SET query_history_json = ?1 WHERE id = ?2",
            params![history_json, chat_id],
        )
        .map_err(|e| Error::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a chat. Returns whether it existed.
    pub fn delete_chat(&self, chat_id: i64) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn
            .execute("DELETE FROM chats WHERE id = ?1", params![chat_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    /// Delete all chats belonging to a project.
    pub fn delete_chats_for_project(&self, project_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM chats WHERE project_id = ?1", params![project_id])
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ---------------------------------------------------------------
    // Row mapping
    // ---------------------------------------------------------------

    fn row_to_project(row: &rusqlite::Row<'_>) -> Project {
        Project {
            id: row.get("id").unwrap_or_default(),
            name: row.get("name").unwrap_or_default(),
            schema_text: row.get("schema_text").ok().flatten(),
            documentation: row.get("documentation").ok().flatten(),
            sample_queries: row
                .get::<_, Option<String>>("sample_queries_json")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row.get("created_at").unwrap_or_default(),
            chats_count: 0,
        }
    }

    fn row_to_chat(row: &rusqlite::Row<'_>) -> Chat {
        Chat {
            id: row.get("id").unwrap_or(0),
            project_id: row.get("project_id").unwrap_or_default(),
            query_history: row
                .get::<_, Option<String>>("query_history_json")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok())
                .unwrap_or_default(),
            feedback_enabled: row
                .get::<_, Option<i64>>("feedback_enabled")
                .ok()
                .flatten()
                .map(|v| v != 0),
            created_at: row.get("created_at").unwrap_or_default(),
        }
    }

    fn record_table(category: RecordCategory) -> &'static str {
        match category {
            RecordCategory::Sql => "sql_records",
            RecordCategory::Ddl => "ddl_records",
            RecordCategory::Documentation => "documentation_records",
        }
    }

    fn row_to_record(category: RecordCategory, row: &rusqlite::Row<'_>) -> VectorRecord {
        let payload = match category {
            RecordCategory::Sql => RecordPayload::Sql {
                question: row.get("question").unwrap_or_default(),
                sql: row.get("sql").unwrap_or_default(),
            },
            RecordCategory::Ddl => RecordPayload::Ddl {
                ddl: row.get("ddl").unwrap_or_default(),
            },
            RecordCategory::Documentation => RecordPayload::Documentation {
                documentation: row.get("documentation").unwrap_or_default(),
            },
        };
        VectorRecord {
            id: row.get("id").unwrap_or_default(),
            project_id: row.get("project_id").unwrap_or_default(),
            payload,
            embedding: row
                .get::<_, Vec<u8>>("embedding")
                .map(|blob| blob_to_embedding(&blob))
                .unwrap_or_default(),
            metadata: row
                .get::<_, Option<String>>("metadata_json")
                .ok()
                .flatten()
                .and_then(|s| serde_json::from_str(&s).ok()),
            created_at: row.get("created_at").unwrap_or(0),
        }
    }

    fn records_where(
        &self,
        category: RecordCategory,
        project_id: Option<&str>,
    ) -> Result<Vec<VectorRecord>> {
        let conn = self.conn.lock();
        let table = Self::record_table(category);
        let rows = match project_id {
            Some(pid) => {
                let sql = format!("SELECT * FROM {} WHERE project_id = ?1 ORDER BY rowid", table);
                let mut stmt =
                    conn.prepare_cached(&sql).map_err(|e| Error::Database(e.to_string()))?;
                let mapped = stmt
                    .query_map(params![pid], |row| Ok(Self::row_to_record(category, row)))
                    .map_err(|e| Error::Database(e.to_string()))?;
                mapped.filter_map(|r| r.ok()).collect()
            }
            None => {
                let sql = format!("SELECT * FROM {} ORDER BY rowid", table);
                let mut stmt =
                    conn.prepare_cached(&sql).map_err(|e| Error::Database(e.to_string()))?;
                let mapped = stmt
                    .query_map([], |row| Ok(Self::row_to_record(category, row)))
                    .map_err(|e| Error::Database(e.to_string()))?;
                mapped.filter_map(|r| r.ok()).collect()
            }
        };
        Ok(rows)
    }
}

impl VectorStore for SqliteStore {
    fn dimension(&self) -> usize {
        *self.embedding_dim.lock()
    }

    fn add(
        &self,
        payload: RecordPayload,
        project_id: &str,
        embedding: Vec<f32>,
    ) -> Result<String> {
        let dim = self.dimension();
        if embedding.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: embedding.len(),
            });
        }

        let id = deterministic_record_id(project_id, &payload);
        let blob = embedding_to_blob(&embedding);
        let metadata = serde_json::json!({ "project_id": project_id }).to_string();
        let created_at = chrono::Utc::now().timestamp();

        let conn = self.conn.lock();
        // ON CONFLICT DO NOTHING keeps the first row (and its insertion
        // order) when identical content is re-added.
        let result = match &payload {
            RecordPayload::Sql { question, sql } => conn
                .prepare_cached(
                    "INSERT INTO sql_records (id, project_id, question, sql, embedding, metadata_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) ON CONFLICT(id) DO NOTHING",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![id, project_id, question, sql, blob, metadata, created_at]),
            RecordPayload::Ddl { ddl } => conn
                .prepare_cached(
                    "INSERT INTO ddl_records (id, project_id, ddl, embedding, metadata_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(id) DO NOTHING",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![id, project_id, ddl, blob, metadata, created_at]),
            RecordPayload::Documentation { documentation } => conn
                .prepare_cached(
                    "INSERT INTO documentation_records (id, project_id, documentation, embedding, metadata_json, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6) ON CONFLICT(id) DO NOTHING",
                )
                .map_err(|e| Error::Database(e.to_string()))?
                .execute(params![id, project_id, documentation, blob, metadata, created_at]),
        };
        result.map_err(|e| Error::Database(e.to_string()))?;
        Ok(id)
    }

    fn remove(&self, record_id: &str) -> Result<bool> {
        let category = match RecordCategory::from_record_id(record_id) {
            Some(c) => c,
            None => return Ok(false),
        };
        let conn = self.conn.lock();
        let sql = format!("DELETE FROM {} WHERE id = ?1", Self::record_table(category));
        let count = conn
            .execute(&sql, params![record_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn list_by_project(
        &self,
        category: RecordCategory,
        project_id: &str,
    ) -> Result<Vec<VectorRecord>> {
        self.records_where(category, Some(project_id))
    }

    fn similarity_search(
        &self,
        category: RecordCategory,
        project_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let candidates = self.records_where(category, Some(project_id))?;
        Ok(rank_by_similarity(candidates, query_embedding, k))
    }

    fn delete_all_for_project(&self, project_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        let mut removed = 0;
        for category in RecordCategory::ALL {
            let sql = format!(
                "DELETE FROM {} WHERE project_id = ?1",
                Self::record_table(category)
            );
            removed += conn
                .execute(&sql, params![project_id])
                .map_err(|e| Error::Database(e.to_string()))?;
        }
        Ok(removed)
    }

    fn all_records(&self, category: RecordCategory) -> Result<Vec<VectorRecord>> {
        self.records_where(category, None)
    }

    fn update_embedding(&self, record_id: &str, embedding: &[f32]) -> Result<bool> {
        let category = match RecordCategory::from_record_id(record_id) {
            Some(c) => c,
            None => return Ok(false),
        };
        let dim = self.dimension();
        if embedding.len() != dim {
            return Err(Error::DimensionMismatch {
                expected: dim,
                actual: embedding.len(),
            });
        }
        let blob = embedding_to_blob(embedding);
        let conn = self.conn.lock();
        let sql = format!(
            "UPDATE {} SET embedding = ?1 WHERE id = ?2",
            Self::record_table(category)
        );
        let count = conn
            .execute(&sql, params![blob, record_id])
            .map_err(|e| Error::Database(e.to_string()))?;
        Ok(count > 0)
    }

    fn set_dimension(&self, dimension: usize) -> Result<()> {
        {
            let conn = self.conn.lock();
            Self::write_meta(&conn, "embedding_dim", &dimension.to_string())?;
        }
        *self.embedding_dim.lock() = dimension;
        Ok(())
    }

    fn provider_name(&self) -> Result<Option<String>> {
        let conn = self.conn.lock();
        Self::read_meta(&conn, "embedding_provider")
    }

    fn set_provider_name(&self, name: &str) -> Result<()> {
        let conn = self.conn.lock();
        Self::write_meta(&conn, "embedding_provider", name)
    }

    fn count(&self, category: RecordCategory) -> Result<i64> {
        let conn = self.conn.lock();
        let sql = format!("SELECT COUNT(*) FROM {}", Self::record_table(category));
        conn.query_row(&sql, [], |row| row.get(0))
            .map_err(|e| Error::Database(e.to_string()))
    }
}

/// Encode an embedding as a little-endian float32 blob.
fn embedding_to_blob(embedding: &[f32]) -> Vec<u8> {
    let mut blob = Vec::with_capacity(embedding.len() * 4);
    for value in embedding {
        blob.extend_from_slice(&value.to_le_bytes());
    }
    blob
}

/// Decode a little-endian float32 blob back into an embedding.
fn blob_to_embedding(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(chunk.try_into().unwrap()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (SqliteStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open(dir.path(), 3).unwrap();
        (store, dir)
    }

    fn ddl(text: &str) -> RecordPayload {
        RecordPayload::Ddl { ddl: text.into() }
    }

    #[test]
    fn test_blob_roundtrip() {
        let embedding = vec![0.1, -0.5, 3.25, 0.0];
        let blob = embedding_to_blob(&embedding);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_embedding(&blob), embedding);
    }

    #[test]
    fn test_project_crud() {
        let (store, _dir) = test_store();

        let project = store
            .create_project("Sales Analytics", Some("CREATE TABLE sales(id INT);"), None, None)
            .unwrap();
        assert!(!project.id.is_empty());

        let fetched = store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Sales Analytics");
        assert_eq!(fetched.schema_text.as_deref(), Some("CREATE TABLE sales(id INT);"));

        assert!(store.delete_project(&project.id).unwrap());
        assert!(store.get_project(&project.id).unwrap().is_none());
        assert!(!store.delete_project(&project.id).unwrap());
    }

    #[test]
    fn test_empty_project_name_rejected() {
        let (store, _dir) = test_store();
        assert!(matches!(
            store.create_project("  ", None, None, None),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_list_projects_with_chat_counts() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        store.create_chat(&project.id).unwrap();
        store.create_chat(&project.id).unwrap();

        let projects = store.list_projects(0, 10).unwrap();
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].chats_count, 2);
    }

    #[test]
    fn test_chat_requires_project() {
        let (store, _dir) = test_store();
        assert!(matches!(
            store.create_chat("missing"),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_project_delete_cascades() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        let chat = store.create_chat(&project.id).unwrap();
        store
            .add(ddl("CREATE TABLE t(a INT);"), &project.id, vec![1.0, 0.0, 0.0])
            .unwrap();

        store.delete_project(&project.id).unwrap();

        assert!(store.get_chat(chat.id).unwrap().is_none());
        assert_eq!(store.count(RecordCategory::Ddl).unwrap(), 0);
    }

    #[test]
    fn test_merge_sample_queries() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();

        let mut first = BTreeMap::new();
        first.insert("total sales?".to_string(), "SELECT SUM(amount) FROM sales;".to_string());
        store.merge_sample_queries(&project.id, &first).unwrap();

        let mut second = BTreeMap::new();
        second.insert("count rows?".to_string(), "SELECT COUNT(*) FROM sales;".to_string());
        let updated = store.merge_sample_queries(&project.id, &second).unwrap();

        let samples = updated.sample_queries.unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples["total sales?"], "SELECT SUM(amount) FROM sales;");
    }

    #[test]
    fn test_chat_update_commands() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        let chat = store.create_chat(&project.id).unwrap();
        assert_eq!(chat.feedback_enabled, None);

        // Judging an empty history is a validation error
        assert!(matches!(
            store.apply_chat_update(chat.id, ChatUpdate::MarkLastJudgement(true)),
            Err(Error::Validation(_))
        ));

        let chat = store
            .apply_chat_update(
                chat.id,
                ChatUpdate::AppendAttempt(QueryAttempt::pending("q1", "SELECT 1;")),
            )
            .unwrap();
        assert_eq!(chat.query_history.len(), 1);
        assert_eq!(chat.query_history[0].is_correct, None);

        let chat = store
            .apply_chat_update(chat.id, ChatUpdate::MarkLastJudgement(false))
            .unwrap();
        assert_eq!(chat.query_history[0].is_correct, Some(false));

        let chat = store
            .apply_chat_update(chat.id, ChatUpdate::SetFeedbackEnabled(Some(false)))
            .unwrap();
        assert_eq!(chat.feedback_enabled, Some(false));

        // Persisted round trip
        let reloaded = store.get_chat(chat.id).unwrap().unwrap();
        assert_eq!(reloaded.query_history.len(), 1);
        assert_eq!(reloaded.feedback_enabled, Some(false));
    }

    #[test]
    fn test_set_feedback_enabled_leaves_history_untouched() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        let chat = store.create_chat(&project.id).unwrap();

        store
            .apply_chat_update(
                chat.id,
                ChatUpdate::AppendAttempt(QueryAttempt::pending("q1", "SELECT 1;")),
            )
            .unwrap();
        store
            .apply_chat_update(chat.id, ChatUpdate::MarkLastJudgement(false))
            .unwrap();
        store
            .apply_chat_update(
                chat.id,
                ChatUpdate::AppendAttempt(QueryAttempt::pending("q1", "SELECT 2;")),
            )
            .unwrap();

        store
            .apply_chat_update(chat.id, ChatUpdate::SetFeedbackEnabled(Some(false)))
            .unwrap();

        let reloaded = store.get_chat(chat.id).unwrap().unwrap();
        assert_eq!(reloaded.feedback_enabled, Some(false));
        assert_eq!(reloaded.query_history.len(), 2);
        assert_eq!(reloaded.query_history[0].is_correct, Some(false));
        assert_eq!(reloaded.query_history[1].is_correct, None);
    }

    #[test]
    fn test_append_marks_superseded_unjudged_entry_accepted() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        let chat = store.create_chat(&project.id).unwrap();

        store
            .apply_chat_update(
                chat.id,
                ChatUpdate::AppendAttempt(QueryAttempt::pending("q1", "SELECT 1;")),
            )
            .unwrap();
        let chat = store
            .apply_chat_update(
                chat.id,
                ChatUpdate::AppendAttempt(QueryAttempt::pending("q2", "SELECT 2;")),
            )
            .unwrap();

        assert_eq!(chat.query_history[0].is_correct, Some(true));
        assert_eq!(chat.query_history[1].is_correct, None);
    }

    #[test]
    fn test_vector_idempotent_add_and_list() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();

        let a = store
            .add(ddl("CREATE TABLE sales(id INT);"), &project.id, vec![1.0, 0.0, 0.0])
            .unwrap();
        let b = store
            .add(ddl("CREATE TABLE sales(id INT);"), &project.id, vec![1.0, 0.0, 0.0])
            .unwrap();
        assert_eq!(a, b);

        let listed = store.list_by_project(RecordCategory::Ddl, &project.id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, a);
        assert_eq!(listed[0].embedding, vec![1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_vector_dimension_mismatch_rejected() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();
        assert!(matches!(
            store.add(ddl("x"), &project.id, vec![1.0]),
            Err(Error::DimensionMismatch { expected: 3, actual: 1 })
        ));
    }

    #[test]
    fn test_vector_search_isolation_and_order() {
        let (store, _dir) = test_store();
        let p1 = store.create_project("A", None, None, None).unwrap();
        let p2 = store.create_project("B", None, None, None).unwrap();

        store.add(ddl("near"), &p1.id, vec![1.0, 0.0, 0.0]).unwrap();
        store.add(ddl("far"), &p1.id, vec![0.0, 1.0, 0.0]).unwrap();
        store.add(ddl("other project"), &p2.id, vec![1.0, 0.0, 0.0]).unwrap();

        let hits = store
            .similarity_search(RecordCategory::Ddl, &p1.id, &[1.0, 0.0, 0.0], 10)
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|h| h.record.project_id == p1.id));
        assert!(matches!(&hits[0].record.payload, RecordPayload::Ddl { ddl } if ddl == "near"));

        // Empty category is an empty result, not an error
        let none = store
            .similarity_search(RecordCategory::Documentation, &p1.id, &[1.0, 0.0, 0.0], 10)
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_remove_and_delete_all() {
        let (store, _dir) = test_store();
        let project = store.create_project("P", None, None, None).unwrap();

        let id = store
            .add(
                RecordPayload::Sql {
                    question: "total sales?".into(),
                    sql: "SELECT SUM(amount) FROM sales;".into(),
                },
                &project.id,
                vec![1.0, 0.0, 0.0],
            )
            .unwrap();
        store.add(ddl("CREATE TABLE sales(id INT);"), &project.id, vec![0.0, 1.0, 0.0]).unwrap();

        assert!(store.remove(&id).unwrap());
        assert!(!store.remove(&id).unwrap());
        assert!(!store.remove("unsuffixed-id").unwrap());

        assert_eq!(store.delete_all_for_project(&project.id).unwrap(), 1);
        assert_eq!(store.count(RecordCategory::Ddl).unwrap(), 0);
    }

    #[test]
    fn test_dimension_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let store = SqliteStore::open(dir.path(), 3).unwrap();
            store.set_dimension(5).unwrap();
            store.set_provider_name("hashing-v1").unwrap();
        }
        let store = SqliteStore::open(dir.path(), 3).unwrap();
        assert_eq!(store.dimension(), 5);
        assert_eq!(store.provider_name().unwrap().as_deref(), Some("hashing-v1"));
    }
}
