//! Prompt assembly for SQL generation and feedback-driven regeneration.

use std::collections::BTreeMap;

use sqlsage_retrieve::QuestionSqlPair;
use sqlsage_store::QueryAttempt;

pub const GENERATION_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate accurate SQL queries \
     based on natural language inputs and the provided database schema and context. Return only \
     the SQL query without any explanations or markdown formatting.";

pub const REGENERATION_SYSTEM_PROMPT: &str = "You are a SQL expert. Generate a corrected SQL \
     query, avoiding the mistakes in previous attempts. Return only the SQL query without any \
     explanations or markdown formatting.";

/// Merge curated project sample pairs with retrieved similar pairs.
///
/// Curated pairs come first; a retrieved pair whose question matches a
/// curated one replaces it in place. Beyond that the two sets carry no
/// precedence, they are all presented to the model as sample queries.
pub fn merge_samples(
    curated: Option<&BTreeMap<String, String>>,
    retrieved: &[QuestionSqlPair],
) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = curated
        .map(|map| map.iter().map(|(q, s)| (q.clone(), s.clone())).collect())
        .unwrap_or_default();

    for pair in retrieved {
        match merged.iter_mut().find(|(q, _)| q == &pair.question) {
            Some(entry) => entry.1 = pair.sql.clone(),
            None => merged.push((pair.question.clone(), pair.sql.clone())),
        }
    }
    merged
}

fn context_header(
    schema: &str,
    documentation: &str,
    samples: &[(String, String)],
) -> String {
    let mut context = String::new();

    if !schema.trim().is_empty() {
        context.push_str(&format!("Database Schema:\n{}\n\n", schema));
    }

    if !documentation.trim().is_empty() {
        context.push_str(&format!("Documentation:\n{}\n\n", documentation));
    }

    if !samples.is_empty() {
        context.push_str("Sample Queries:\n");
        for (text, sql) in samples {
            context.push_str(&format!("Text: {}\nSQL: {}\n\n", text, sql));
        }
    }

    context
}

/// Build the prompt for a fresh generation request.
///
/// Sections: schema, documentation, sample queries, conversation history
/// (oldest first), then the question itself.
pub fn build_generation_prompt(
    question: &str,
    schema: &str,
    documentation: &str,
    samples: &[(String, String)],
    history: &[QueryAttempt],
) -> String {
    let mut context = context_header(schema, documentation, samples);

    if !history.is_empty() {
        context.push_str("Previous queries in this conversation:\n");
        for attempt in history {
            context.push_str(&format!(
                "Text: {}\nSQL: {}\nCorrect: {}\n\n",
                attempt.text,
                attempt.sql,
                attempt.is_correct.unwrap_or(true)
            ));
        }
    }

    format!("{}\nGenerate SQL for: {}\nSQL:", context, question)
}

/// Build the prompt for regenerating after negative feedback.
///
/// Prior incorrect attempts for the same question are listed so the
/// model does not repeat them; attempts stay in history as negative
/// exemplars for every future regeneration of that question.
pub fn build_regeneration_prompt(
    question: &str,
    schema: &str,
    documentation: &str,
    samples: &[(String, String)],
    history: &[QueryAttempt],
) -> String {
    let mut context = context_header(schema, documentation, samples);

    let incorrect: Vec<&QueryAttempt> = history
        .iter()
        .filter(|a| a.text == question && a.is_correct == Some(false))
        .collect();

    if !incorrect.is_empty() {
        context.push_str("Previous incorrect attempts:\n");
        for attempt in &incorrect {
            context.push_str(&format!("Incorrect SQL: {}\n", attempt.sql));
        }
    }

    format!("{}\nGenerate a corrected SQL query for: {}\nSQL:", context, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(text: &str, sql: &str, is_correct: Option<bool>) -> QueryAttempt {
        QueryAttempt {
            text: text.into(),
            sql: sql.into(),
            is_correct,
            timestamp: "2024-01-01T00:00:00Z".into(),
        }
    }

    #[test]
    fn test_generation_prompt_sections() {
        let samples = vec![(
            "total sales?".to_string(),
            "SELECT SUM(amount) FROM sales;".to_string(),
        )];
        let history = vec![attempt("row count?", "SELECT COUNT(*) FROM sales;", Some(true))];

        let prompt = build_generation_prompt(
            "what is the total sales amount?",
            "CREATE TABLE sales(id INT, amount DECIMAL);",
            "amounts are stored in cents",
            &samples,
            &history,
        );

        assert!(prompt.contains("Database Schema:\nCREATE TABLE sales(id INT, amount DECIMAL);"));
        assert!(prompt.contains("Documentation:\namounts are stored in cents"));
        assert!(prompt.contains("Text: total sales?\nSQL: SELECT SUM(amount) FROM sales;"));
        assert!(prompt.contains("Previous queries in this conversation:"));
        assert!(prompt.contains("Correct: true"));
        assert!(prompt.ends_with("Generate SQL for: what is the total sales amount?\nSQL:"));
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let prompt = build_generation_prompt("q", "", "  ", &[], &[]);
        assert!(!prompt.contains("Database Schema:"));
        assert!(!prompt.contains("Documentation:"));
        assert!(!prompt.contains("Sample Queries:"));
        assert!(!prompt.contains("Previous queries"));
    }

    #[test]
    fn test_regeneration_lists_only_matching_incorrect_attempts() {
        let history = vec![
            attempt("total sales?", "SELECT amount FROM sales;", Some(false)),
            attempt("row count?", "SELECT COUNT(*) FROM sales;", Some(false)),
            attempt("total sales?", "SELECT SUM(id) FROM sales;", Some(false)),
        ];

        let prompt = build_regeneration_prompt("total sales?", "", "", &[], &history);
        assert!(prompt.contains("Previous incorrect attempts:"));
        assert!(prompt.contains("Incorrect SQL: SELECT amount FROM sales;"));
        assert!(prompt.contains("Incorrect SQL: SELECT SUM(id) FROM sales;"));
        assert!(!prompt.contains("SELECT COUNT(*)"));
        assert!(prompt.ends_with("Generate a corrected SQL query for: total sales?\nSQL:"));
    }

    #[test]
    fn test_merge_samples_overlay() {
        let mut curated = BTreeMap::new();
        curated.insert("a?".to_string(), "SELECT 1;".to_string());
        curated.insert("b?".to_string(), "SELECT 2;".to_string());

        let retrieved = vec![
            QuestionSqlPair {
                question: "b?".into(),
                sql: "SELECT 20;".into(),
            },
            QuestionSqlPair {
                question: "c?".into(),
                sql: "SELECT 3;".into(),
            },
        ];

        let merged = merge_samples(Some(&curated), &retrieved);
        assert_eq!(merged.len(), 3);
        assert!(merged.contains(&("a?".to_string(), "SELECT 1;".to_string())));
        assert!(merged.contains(&("b?".to_string(), "SELECT 20;".to_string())));
        assert!(merged.contains(&("c?".to_string(), "SELECT 3;".to_string())));
    }
}
