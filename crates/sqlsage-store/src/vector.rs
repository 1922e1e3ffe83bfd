//! Vector record store contract and similarity math.

use sha2::{Digest, Sha256};
use sqlsage_core::Result;

use crate::types::{RecordCategory, RecordPayload, ScoredRecord, VectorRecord};

/// Brute-force vector record store, scoped by project.
///
/// Handles are constructed explicitly and passed down (`Arc<dyn
/// VectorStore>`); there is no process-wide store. Implementations must
/// be safe for concurrent use across projects. Project-existence checks
/// live in [`crate::knowledge::KnowledgeService`], which fronts every
/// write, so both backends stay contract-compatible.
pub trait VectorStore: Send + Sync {
    /// The fixed embedding dimension all stored records share.
    fn dimension(&self) -> usize;

    /// Insert a record. The id is derived deterministically from the
    /// project and payload content, so re-adding identical content is a
    /// no-op returning the same id.
    ///
    /// Fails with `Error::DimensionMismatch` if the embedding does not
    /// match the store dimension.
    fn add(&self, payload: RecordPayload, project_id: &str, embedding: Vec<f32>)
        -> Result<String>;

    /// Delete a record by id. The category is resolved from the id
    /// suffix; an unknown suffix returns Ok(false).
    fn remove(&self, record_id: &str) -> Result<bool>;

    /// All records of a category for a project, in insertion order.
    fn list_by_project(
        &self,
        category: RecordCategory,
        project_id: &str,
    ) -> Result<Vec<VectorRecord>>;

    /// Top-k records by descending cosine similarity to the query
    /// embedding, scoped to one project. Ties keep insertion order. A
    /// project with no records yields an empty Ok, never an error.
    fn similarity_search(
        &self,
        category: RecordCategory,
        project_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>>;

    /// Remove every record (all categories) belonging to a project.
    /// Returns the number of records removed.
    fn delete_all_for_project(&self, project_id: &str) -> Result<usize>;

    /// All records of a category across projects, in insertion order.
    /// Used by the embedding migrator.
    fn all_records(&self, category: RecordCategory) -> Result<Vec<VectorRecord>>;

    /// Replace a record's embedding in place (migration only).
    fn update_embedding(&self, record_id: &str, embedding: &[f32]) -> Result<bool>;

    /// Change the declared embedding dimension (migration only).
    fn set_dimension(&self, dimension: usize) -> Result<()>;

    /// Name of the embedding provider the stored vectors came from, if
    /// recorded. A mismatch against the active provider means the store
    /// needs migration before it can serve searches.
    fn provider_name(&self) -> Result<Option<String>>;

    /// Record the embedding provider name (set on first write and by
    /// migration).
    fn set_provider_name(&self, name: &str) -> Result<()>;

    /// Number of records in a category.
    fn count(&self, category: RecordCategory) -> Result<i64>;
}

/// Derive the deterministic record id for a payload within a project.
///
/// First 32 hex chars of SHA-256 over project id + content, plus the
/// category suffix. Including the project id keeps identical content in
/// different projects from colliding.
pub fn deterministic_record_id(project_id: &str, payload: &RecordPayload) -> String {
    let mut hasher = Sha256::new();
    hasher.update(project_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(payload.content_key().as_bytes());
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", &digest[..32], payload.category().id_suffix())
}

/// Cosine similarity: dot(a,b) / (|a| * |b|).
///
/// Defined as 0.0 when either vector has (near-)zero norm, keeping the
/// ranking total instead of producing NaN.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-9 {
        return 0.0;
    }
    dot / denom
}

/// Rank records against a query embedding: descending similarity, ties
/// broken by the incoming (insertion) order via stable sort.
pub fn rank_by_similarity(
    records: Vec<VectorRecord>,
    query_embedding: &[f32],
    k: usize,
) -> Vec<ScoredRecord> {
    let mut scored: Vec<ScoredRecord> = records
        .into_iter()
        .map(|record| {
            let score = cosine_similarity(query_embedding, &record.embedding);
            ScoredRecord { record, score }
        })
        .collect();
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(k);
    scored
}
