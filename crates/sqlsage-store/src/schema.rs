//! Database schema SQL for the combined relational + vector store.

/// Relational tables: projects and chats.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS projects (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    schema_text TEXT,
    documentation TEXT,
    sample_queries_json TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chats (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    query_history_json TEXT,
    feedback_enabled INTEGER,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_chats_project ON chats(project_id);
"#;

/// Vector record tables, one per category. Embeddings are stored as
/// little-endian float32 blobs; rowid preserves insertion order for
/// stable tie-breaking.
pub const VECTOR_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS sql_records (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    question TEXT NOT NULL,
    sql TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata_json TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ddl_records (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    ddl TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata_json TEXT,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS documentation_records (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
    documentation TEXT NOT NULL,
    embedding BLOB NOT NULL,
    metadata_json TEXT,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sql_records_project ON sql_records(project_id);
CREATE INDEX IF NOT EXISTS idx_ddl_records_project ON ddl_records(project_id);
CREATE INDEX IF NOT EXISTS idx_documentation_records_project ON documentation_records(project_id);
"#;

/// Store metadata: active embedding provider name and dimension, used to
/// detect embedding-function changes that require migration.
pub const META_SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS store_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;
