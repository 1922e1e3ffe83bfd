//! SQLSage Generate — prompt assembly, LLM providers, generation orchestration.

pub mod config;
pub mod orchestrator;
pub mod prompt;
pub mod providers;
pub mod types;

pub use config::LlmConfig;
pub use orchestrator::GenerationOrchestrator;
pub use providers::{HttpLlmClient, LlmClient};
pub use types::*;
