//! Data types for projects, chats, and vector records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A project row: the isolation boundary for all knowledge and chats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Latest schema DDL text supplied for the project.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Curated question → SQL pairs, merged into prompts alongside
    /// retrieved pairs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_queries: Option<BTreeMap<String, String>>,
    pub created_at: String,
    /// Filled on list endpoints; zero otherwise.
    #[serde(default)]
    pub chats_count: i64,
}

/// One question/SQL attempt in a chat's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAttempt {
    pub text: String,
    pub sql: String,
    /// None until the user judges the attempt. Only the last history
    /// entry may be unjudged.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_correct: Option<bool>,
    pub timestamp: String,
}

impl QueryAttempt {
    pub fn pending(text: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sql: sql.into(),
            is_correct: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// A chat row: append-only conversation state scoped to one project.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub project_id: String,
    pub query_history: Vec<QueryAttempt>,
    /// Tri-state: None = never judged, Some(true) = solicit feedback,
    /// Some(false) = latest answer confirmed, stop soliciting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feedback_enabled: Option<bool>,
    pub created_at: String,
}

/// Enumerated chat mutation commands.
///
/// Every chat update goes through one of these variants so the store can
/// validate the history invariant instead of accepting arbitrary
/// key/value patches.
#[derive(Debug, Clone)]
pub enum ChatUpdate {
    SetFeedbackEnabled(Option<bool>),
    AppendAttempt(QueryAttempt),
    MarkLastJudgement(bool),
}

/// Vector record category. The category is encoded as an id suffix so
/// deletion by id resolves the backing collection in O(1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordCategory {
    Sql,
    Ddl,
    Documentation,
}

impl RecordCategory {
    pub const ALL: [RecordCategory; 3] =
        [RecordCategory::Sql, RecordCategory::Ddl, RecordCategory::Documentation];

    pub fn id_suffix(self) -> &'static str {
        match self {
            RecordCategory::Sql => "-sql",
            RecordCategory::Ddl => "-ddl",
            RecordCategory::Documentation => "-doc",
        }
    }

    /// Resolve the category from a record id's suffix.
    pub fn from_record_id(id: &str) -> Option<Self> {
        if id.ends_with("-sql") {
            Some(RecordCategory::Sql)
        } else if id.ends_with("-ddl") {
            Some(RecordCategory::Ddl)
        } else if id.ends_with("-doc") {
            Some(RecordCategory::Documentation)
        } else {
            None
        }
    }
}

impl std::fmt::Display for RecordCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordCategory::Sql => write!(f, "sql"),
            RecordCategory::Ddl => write!(f, "ddl"),
            RecordCategory::Documentation => write!(f, "documentation"),
        }
    }
}

/// Category-specific record content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordPayload {
    Sql { question: String, sql: String },
    Ddl { ddl: String },
    Documentation { documentation: String },
}

impl RecordPayload {
    pub fn category(&self) -> RecordCategory {
        match self {
            RecordPayload::Sql { .. } => RecordCategory::Sql,
            RecordPayload::Ddl { .. } => RecordCategory::Ddl,
            RecordPayload::Documentation { .. } => RecordCategory::Documentation,
        }
    }

    /// The content the deterministic record id is derived from.
    pub fn content_key(&self) -> String {
        match self {
            RecordPayload::Sql { question, sql } => format!("{}\n{}", question, sql),
            RecordPayload::Ddl { ddl } => ddl.clone(),
            RecordPayload::Documentation { documentation } => documentation.clone(),
        }
    }

    /// The text handed to the embedding backend.
    pub fn embedding_text(&self) -> String {
        match self {
            RecordPayload::Sql { question, sql } => format!("{} {}", question, sql),
            RecordPayload::Ddl { ddl } => ddl.clone(),
            RecordPayload::Documentation { documentation } => documentation.clone(),
        }
    }
}

/// A stored vector record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub project_id: String,
    #[serde(flatten)]
    pub payload: RecordPayload,
    #[serde(skip_serializing)]
    pub embedding: Vec<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Unix timestamp, seconds.
    pub created_at: i64,
}

/// A record paired with its cosine similarity to a query embedding.
#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: VectorRecord,
    pub score: f32,
}
