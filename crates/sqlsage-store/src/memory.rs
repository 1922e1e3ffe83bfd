//! In-memory vector store backend.
//!
//! Per-category record vectors behind a `parking_lot::RwLock`. Used for
//! embedded deployments and tests; behavior matches the SQLite backend.

use std::collections::HashMap;

use parking_lot::RwLock;
use sqlsage_core::{Error, Result};

use crate::types::{RecordCategory, RecordPayload, ScoredRecord, VectorRecord};
use crate::vector::{deterministic_record_id, rank_by_similarity, VectorStore};

pub struct MemoryStore {
    inner: RwLock<Inner>,
}

struct Inner {
    dimension: usize,
    provider_name: Option<String>,
    records: HashMap<RecordCategory, Vec<VectorRecord>>,
}

impl MemoryStore {
    pub fn new(dimension: usize) -> Self {
        let mut records = HashMap::new();
        for category in RecordCategory::ALL {
            records.insert(category, Vec::new());
        }
        Self {
            inner: RwLock::new(Inner {
                dimension,
                provider_name: None,
                records,
            }),
        }
    }
}

impl VectorStore for MemoryStore {
    fn dimension(&self) -> usize {
        self.inner.read().dimension
    }

    fn add(
        &self,
        payload: RecordPayload,
        project_id: &str,
        embedding: Vec<f32>,
    ) -> Result<String> {
        let mut inner = self.inner.write();
        if embedding.len() != inner.dimension {
            return Err(Error::DimensionMismatch {
                expected: inner.dimension,
                actual: embedding.len(),
            });
        }

        let id = deterministic_record_id(project_id, &payload);
        let category = payload.category();
        let bucket = inner.records.get_mut(&category).unwrap();

        // Idempotent: identical content already stored keeps its slot.
        if bucket.iter().any(|r| r.id == id) {
            return Ok(id);
        }

        bucket.push(VectorRecord {
            id: id.clone(),
            project_id: project_id.to_string(),
            payload,
            embedding,
            metadata: Some(serde_json::json!({ "project_id": project_id })),
            created_at: chrono::Utc::now().timestamp(),
        });
        Ok(id)
    }

    fn remove(&self, record_id: &str) -> Result<bool> {
        let category = match RecordCategory::from_record_id(record_id) {
            Some(c) => c,
            None => return Ok(false),
        };
        let mut inner = self.inner.write();
        let bucket = inner.records.get_mut(&category).unwrap();
        let before = bucket.len();
        bucket.retain(|r| r.id != record_id);
        Ok(bucket.len() < before)
    }

    fn list_by_project(
        &self,
        category: RecordCategory,
        project_id: &str,
    ) -> Result<Vec<VectorRecord>> {
        let inner = self.inner.read();
        Ok(inner.records[&category]
            .iter()
            .filter(|r| r.project_id == project_id)
            .cloned()
            .collect())
    }

    fn similarity_search(
        &self,
        category: RecordCategory,
        project_id: &str,
        query_embedding: &[f32],
        k: usize,
    ) -> Result<Vec<ScoredRecord>> {
        let candidates = self.list_by_project(category, project_id)?;
        Ok(rank_by_similarity(candidates, query_embedding, k))
    }

    fn delete_all_for_project(&self, project_id: &str) -> Result<usize> {
        let mut inner = self.inner.write();
        let mut removed = 0;
        for bucket in inner.records.values_mut() {
            let before = bucket.len();
            bucket.retain(|r| r.project_id != project_id);
            removed += before - bucket.len();
        }
        Ok(removed)
    }

    fn all_records(&self, category: RecordCategory) -> Result<Vec<VectorRecord>> {
        Ok(self.inner.read().records[&category].clone())
    }

    fn update_embedding(&self, record_id: &str, embedding: &[f32]) -> Result<bool> {
        let category = match RecordCategory::from_record_id(record_id) {
            Some(c) => c,
            None => return Ok(false),
        };
        let mut inner = self.inner.write();
        if embedding.len() != inner.dimension {
            return Err(Error::DimensionMismatch {
                expected: inner.dimension,
                actual: embedding.len(),
            });
        }
        let bucket = inner.records.get_mut(&category).unwrap();
        match bucket.iter_mut().find(|r| r.id == record_id) {
            Some(record) => {
                record.embedding = embedding.to_vec();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn set_dimension(&self, dimension: usize) -> Result<()> {
        self.inner.write().dimension = dimension;
        Ok(())
    }

    fn provider_name(&self) -> Result<Option<String>> {
        Ok(self.inner.read().provider_name.clone())
    }

    fn set_provider_name(&self, name: &str) -> Result<()> {
        self.inner.write().provider_name = Some(name.to_string());
        Ok(())
    }

    fn count(&self, category: RecordCategory) -> Result<i64> {
        Ok(self.inner.read().records[&category].len() as i64)
    }
}
