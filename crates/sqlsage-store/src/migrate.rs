//! Embedding migration — re-embeds every stored record with a new
//! provider, preserving ids, payloads, and metadata.
//!
//! Runs when the active embedding function changes (detected by a
//! provider-name or dimension mismatch against what the store recorded).
//! The old silent drop-and-recreate behavior is a data-loss bug class;
//! this flow backs the records up in memory, regenerates everything
//! first, and only then writes replacements.
//!
//! Must run exclusively: no concurrent adds or searches against the same
//! store while a migration is in flight. The CLI entry point satisfies
//! this by migrating before the server starts.

use tracing::{info, warn};

use crate::types::RecordCategory;
use crate::vector::VectorStore;
use sqlsage_core::Result;
use sqlsage_embed::EmbeddingBackend;

/// Per-category migration counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct CategoryOutcome {
    pub total: usize,
    pub migrated: usize,
    /// Records whose regeneration failed but which kept their old
    /// embedding (same-dimension migration only).
    pub failed: usize,
    /// Records dropped because regeneration failed during a
    /// cross-dimension migration; keeping the old vector would leave the
    /// store with mixed dimensions.
    pub removed: usize,
}

/// Result of a migration run.
#[derive(Debug)]
pub struct MigrationReport {
    pub provider: String,
    pub old_dimension: usize,
    pub new_dimension: usize,
    pub sql: CategoryOutcome,
    pub ddl: CategoryOutcome,
    pub documentation: CategoryOutcome,
    pub warnings: Vec<String>,
    pub duration_ms: u64,
}

impl MigrationReport {
    pub fn migrated(&self) -> usize {
        self.sql.migrated + self.ddl.migrated + self.documentation.migrated
    }

    pub fn failed(&self) -> usize {
        self.sql.failed + self.ddl.failed + self.documentation.failed
    }

    pub fn removed(&self) -> usize {
        self.sql.removed + self.ddl.removed + self.documentation.removed
    }

    fn outcome_mut(&mut self, category: RecordCategory) -> &mut CategoryOutcome {
        match category {
            RecordCategory::Sql => &mut self.sql,
            RecordCategory::Ddl => &mut self.ddl,
            RecordCategory::Documentation => &mut self.documentation,
        }
    }
}

/// Print a migration report to stdout (CLI use).
pub fn print_report(report: &MigrationReport) {
    println!("Embedding migration → {}", report.provider);
    println!(
        "  dimension: {} → {}",
        report.old_dimension, report.new_dimension
    );
    for (name, outcome) in [
        ("sql", &report.sql),
        ("ddl", &report.ddl),
        ("documentation", &report.documentation),
    ] {
        println!(
            "  {:14} total={} migrated={} failed={} removed={}",
            name, outcome.total, outcome.migrated, outcome.failed, outcome.removed
        );
    }
    for warning in &report.warnings {
        println!("  warning: {}", warning);
    }
    println!("  done in {}ms", report.duration_ms);
}

/// Re-embeds all stored records with a new embedding provider.
pub struct EmbeddingMigrator<'a> {
    store: &'a dyn VectorStore,
}

struct PendingRecord {
    id: String,
    new_embedding: Option<Vec<f32>>,
}

impl<'a> EmbeddingMigrator<'a> {
    pub fn new(store: &'a dyn VectorStore) -> Self {
        Self { store }
    }

    /// Whether the store needs migrating to match the given provider.
    pub fn needs_migration(&self, provider: &dyn EmbeddingBackend) -> Result<bool> {
        if self.store.dimension() != provider.dimension() {
            return Ok(true);
        }
        match self.store.provider_name()? {
            Some(name) => Ok(name != provider.name()),
            None => Ok(false),
        }
    }

    /// Regenerate every record's embedding with `new_provider`.
    ///
    /// Per-record failures are logged, counted, and skipped; the run
    /// itself only fails on store errors. Ids and payloads are never
    /// altered.
    pub fn migrate(&self, new_provider: &dyn EmbeddingBackend) -> Result<MigrationReport> {
        let start = std::time::Instant::now();
        let old_dimension = self.store.dimension();
        let new_dimension = new_provider.dimension();

        let mut report = MigrationReport {
            provider: new_provider.name().to_string(),
            old_dimension,
            new_dimension,
            sql: CategoryOutcome::default(),
            ddl: CategoryOutcome::default(),
            documentation: CategoryOutcome::default(),
            warnings: Vec::new(),
            duration_ms: 0,
        };

        info!(
            "Starting embedding migration to {} ({} → {} dims)",
            new_provider.name(),
            old_dimension,
            new_dimension
        );

        // Phase 1: back up and regenerate everything in memory. No store
        // write happens until every record has been attempted, so an
        // interrupted provider can't leave a half-written store.
        let mut pending: Vec<(RecordCategory, Vec<PendingRecord>)> = Vec::new();
        for category in RecordCategory::ALL {
            let records = self.store.all_records(category)?;
            report.outcome_mut(category).total = records.len();

            let mut regenerated = Vec::with_capacity(records.len());
            for record in records {
                let new_embedding = match new_provider.embed(&record.payload.embedding_text()) {
                    Ok(embedding) => Some(embedding),
                    Err(e) => {
                        warn!("Re-embedding {} failed: {}", record.id, e);
                        report
                            .warnings
                            .push(format!("{}: {}", record.id, e));
                        None
                    }
                };
                regenerated.push(PendingRecord {
                    id: record.id,
                    new_embedding,
                });
            }
            pending.push((category, regenerated));
        }

        // Phase 2: apply. The declared dimension switches first so the
        // replacement embeddings pass the store's dimension check.
        self.store.set_dimension(new_dimension)?;

        for (category, records) in pending {
            let outcome = report.outcome_mut(category);
            for record in records {
                match record.new_embedding {
                    Some(embedding) => {
                        if self.store.update_embedding(&record.id, &embedding)? {
                            outcome.migrated += 1;
                        }
                    }
                    None if old_dimension != new_dimension => {
                        // The old vector no longer fits the declared
                        // dimension; dropping the record is reported, a
                        // mixed-dimension store is not an option.
                        self.store.remove(&record.id)?;
                        outcome.removed += 1;
                    }
                    None => {
                        outcome.failed += 1;
                    }
                }
            }
        }

        self.store.set_provider_name(new_provider.name())?;
        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Migration complete: migrated={}, failed={}, removed={}, duration={}ms",
            report.migrated(),
            report.failed(),
            report.removed(),
            report.duration_ms
        );

        Ok(report)
    }
}
