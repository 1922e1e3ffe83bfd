//! SQLSage Retrieve — top-k context lookups over the vector store.

pub mod retriever;

pub use retriever::{ContextRetriever, QuestionSqlPair, RetrievalLimits, RetrievedContext};
