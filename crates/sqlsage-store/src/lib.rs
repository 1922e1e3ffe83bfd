//! SQLSage Store — SQLite relational store, vector record backends, migration.

pub mod knowledge;
pub mod memory;
pub mod migrate;
pub mod schema;
pub mod sqlite;
pub mod types;
pub mod vector;

pub use knowledge::KnowledgeService;
pub use memory::MemoryStore;
pub use migrate::{EmbeddingMigrator, MigrationReport};
pub use sqlite::SqliteStore;
pub use types::*;
pub use vector::{cosine_similarity, deterministic_record_id, VectorStore};
