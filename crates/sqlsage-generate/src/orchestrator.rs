//! Generation orchestrator — retrieval, prompting, and the feedback
//! state machine.
//!
//! Each query attempt moves through three states: pending judgement
//! (just generated, correctness unset), confirmed correct, or superseded
//! (judged incorrect, a fresh pending attempt appended behind it). After
//! a confirmed-correct judgement the chat's feedback flag flips off
//! until the next question re-enables it; superseded attempts stay in
//! history as negative exemplars for later regenerations of the same
//! question.
//!
//! Every chat mutation — generation, feedback, and settings changes —
//! is linearized through a per-chat async mutex, so concurrent calls on
//! the same chat cannot interleave their read-append-write cycles.
//! Calls on different chats do not contend.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::prompt::{
    build_generation_prompt, build_regeneration_prompt, merge_samples,
    GENERATION_SYSTEM_PROMPT, REGENERATION_SYSTEM_PROMPT,
};
use crate::providers::LlmClient;
use crate::types::{FeedbackOutcome, GenerationOutcome};
use sqlsage_core::{Error, Result};
use sqlsage_retrieve::ContextRetriever;
use sqlsage_store::{Chat, ChatUpdate, KnowledgeService, Project, QueryAttempt, SqliteStore};

const GENERATION_TEMPERATURE: f64 = 0.3;

pub struct GenerationOrchestrator {
    relational: Arc<SqliteStore>,
    retriever: Arc<ContextRetriever>,
    knowledge: Arc<KnowledgeService>,
    llm: Arc<dyn LlmClient>,
    llm_timeout: Duration,
    chat_guards: DashMap<i64, Arc<Mutex<()>>>,
}

impl GenerationOrchestrator {
    pub fn new(
        relational: Arc<SqliteStore>,
        retriever: Arc<ContextRetriever>,
        knowledge: Arc<KnowledgeService>,
        llm: Arc<dyn LlmClient>,
        llm_timeout: Duration,
    ) -> Self {
        Self {
            relational,
            retriever,
            knowledge,
            llm,
            llm_timeout,
            chat_guards: DashMap::new(),
        }
    }

    fn chat_guard(&self, chat_id: i64) -> Arc<Mutex<()>> {
        self.chat_guards
            .entry(chat_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn call_llm(&self, system_prompt: &str, user_prompt: &str) -> Result<String> {
        match tokio::time::timeout(
            self.llm_timeout,
            self.llm
                .generate(system_prompt, user_prompt, GENERATION_TEMPERATURE),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout),
        }
    }

    /// Retrieve context for a question and merge the project's curated
    /// sample pairs with the retrieved ones. The first related DDL and
    /// documentation hits become the prompt's schema and documentation
    /// sections.
    fn assemble_context(
        &self,
        project: &Project,
        question: &str,
    ) -> Result<(String, String, Vec<(String, String)>)> {
        let context = self.retriever.retrieve(question, &project.id)?;
        let samples = merge_samples(project.sample_queries.as_ref(), &context.sample_pairs);
        let schema = context.ddl.into_iter().next().unwrap_or_default();
        let documentation = context.documentation.into_iter().next().unwrap_or_default();
        Ok((schema, documentation, samples))
    }

    /// Generate SQL for a question in a chat.
    ///
    /// The history append happens only after a successful model
    /// response; provider failures and timeouts leave the chat exactly
    /// as it was.
    pub async fn generate(&self, chat_id: i64, question: &str) -> Result<GenerationOutcome> {
        if question.trim().is_empty() {
            return Err(Error::Validation("question text cannot be empty".into()));
        }

        let guard = self.chat_guard(chat_id);
        let _lock = guard.lock().await;

        let chat = self
            .relational
            .get_chat(chat_id)?
            .ok_or_else(|| Error::NotFound(format!("chat {}", chat_id)))?;
        let project = self
            .relational
            .get_project(&chat.project_id)?
            .ok_or_else(|| Error::NotFound(format!("project {}", chat.project_id)))?;

        let (schema, documentation, samples) = self.assemble_context(&project, question)?;
        let prompt = build_generation_prompt(
            question,
            &schema,
            &documentation,
            &samples,
            &chat.query_history,
        );

        let sql = self.call_llm(GENERATION_SYSTEM_PROMPT, &prompt).await?;

        self.relational.apply_chat_update(
            chat_id,
            ChatUpdate::AppendAttempt(QueryAttempt::pending(question, &sql)),
        )?;
        // A fresh question re-opens the feedback loop.
        let chat = self
            .relational
            .apply_chat_update(chat_id, ChatUpdate::SetFeedbackEnabled(Some(true)))?;

        info!("Generated SQL for chat {} ({} chars)", chat_id, sql.len());

        Ok(GenerationOutcome {
            sql,
            chat_id,
            feedback_enabled: chat.feedback_enabled,
        })
    }

    /// Update the chat's feedback-solicitation flag.
    ///
    /// Every chat mutation goes through the per-chat guard, settings
    /// included, so a flag change cannot interleave with an in-flight
    /// generate or feedback call on the same chat.
    pub async fn set_feedback_enabled(
        &self,
        chat_id: i64,
        value: Option<bool>,
    ) -> Result<Chat> {
        let guard = self.chat_guard(chat_id);
        let _lock = guard.lock().await;

        self.relational
            .apply_chat_update(chat_id, ChatUpdate::SetFeedbackEnabled(value))
    }

    /// Record a judgement on the chat's latest attempt.
    ///
    /// Correct: the attempt is confirmed and feedback solicitation turns
    /// off; optionally the pair is persisted as a curated sample and a
    /// retrievable exemplar (idempotent, duplicate submissions keep one
    /// record). Incorrect: the judgement sticks, context is retrieved
    /// again for the same question, and the model is asked for a
    /// corrected query with every prior incorrect attempt spelled out.
    pub async fn provide_feedback(
        &self,
        chat_id: i64,
        is_correct: bool,
        add_to_samples: bool,
    ) -> Result<FeedbackOutcome> {
        let guard = self.chat_guard(chat_id);
        let _lock = guard.lock().await;

        let chat = self
            .relational
            .get_chat(chat_id)?
            .ok_or_else(|| Error::NotFound(format!("chat {}", chat_id)))?;
        let last = chat
            .query_history
            .last()
            .cloned()
            .ok_or_else(|| Error::Validation("no queries in chat history".into()))?;

        let chat = self
            .relational
            .apply_chat_update(chat_id, ChatUpdate::MarkLastJudgement(is_correct))?;

        if is_correct {
            let chat = self
                .relational
                .apply_chat_update(chat_id, ChatUpdate::SetFeedbackEnabled(Some(false)))?;

            if add_to_samples {
                let mut pair = BTreeMap::new();
                pair.insert(last.text.clone(), last.sql.clone());
                self.relational.merge_sample_queries(&chat.project_id, &pair)?;
                let id = self
                    .knowledge
                    .add_question_sql(&chat.project_id, &last.text, &last.sql)?;
                info!("Confirmed pair stored as sample {} for chat {}", id, chat_id);
            }

            return Ok(FeedbackOutcome {
                chat_id,
                sql: None,
                feedback_enabled: chat.feedback_enabled,
            });
        }

        let project = self
            .relational
            .get_project(&chat.project_id)?
            .ok_or_else(|| Error::NotFound(format!("project {}", chat.project_id)))?;

        info!(
            "Regenerating SQL for chat {} after negative feedback on {:?}",
            chat_id, last.text
        );

        let (schema, documentation, samples) = self.assemble_context(&project, &last.text)?;
        let prompt = build_regeneration_prompt(
            &last.text,
            &schema,
            &documentation,
            &samples,
            &chat.query_history,
        );

        // An LLM failure here leaves the negative judgement recorded but
        // appends nothing; the caller can retry the feedback call.
        let sql = self.call_llm(REGENERATION_SYSTEM_PROMPT, &prompt).await?;

        self.relational.apply_chat_update(
            chat_id,
            ChatUpdate::AppendAttempt(QueryAttempt::pending(&last.text, &sql)),
        )?;
        let chat = self
            .relational
            .apply_chat_update(chat_id, ChatUpdate::SetFeedbackEnabled(Some(true)))?;

        Ok(FeedbackOutcome {
            chat_id,
            sql: Some(sql),
            feedback_enabled: chat.feedback_enabled,
        })
    }
}
