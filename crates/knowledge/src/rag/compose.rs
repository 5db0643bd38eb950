//! Answer composition: grouped results in, generator prompt out, and the
//! generator's reply back to an answer string.

use crate::rag::analyzer::title_case;
use crate::types::GroupedResult;
use insight_core::AppResult;
use insight_llm::LlmResponse;
use insight_prompt::{
    build_prompt, resolve_prompt, BuiltPrompt, PromptDefinition, ANSWER_PROMPT_ID,
};
use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;

/// Answer used when the generator replied without usable content.
pub const UNEXPECTED_REPLY: &str =
    "I apologize, but I received an unexpected response format from the language model.";

/// Answer used when the generator could not be reached at all.
pub const TECHNICAL_DIFFICULTIES: &str = "I apologize, but I was unable to process your request due to technical difficulties. Please try again later.";

/// Answer used when the generator rejected the request with a status code.
pub fn status_apology(status: u16) -> String {
    format!(
        "I apologize, but I encountered an error while processing your request (Status: {}).",
        status
    )
}

/// Render grouped results as the context block of the prompt.
pub fn render_context(groups: &[GroupedResult]) -> String {
    groups
        .iter()
        .enumerate()
        .map(|(i, group)| render_group(i + 1, group))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_group(position: usize, group: &GroupedResult) -> String {
    let author = group
        .field("logged_by_user_name")
        .unwrap_or(&group.feedback_id);
    let mut block = format!("\n--- Feedback Entry {} (By: {}) ---\n", position, author);

    if !group.metadata.is_empty() {
        block.push_str("Context Information:\n");

        if let Some(project) = group.field("project_name") {
            let _ = writeln!(block, "• Project: {}", project);
        }
        if let Some(course) = group.field("course_name") {
            let _ = writeln!(block, "• Course: {}", course);
        }
        if let Some(centre) = group.field("centre_name") {
            let _ = write!(block, "• Centre: {}", centre);
            for key in ["district", "state"] {
                if let Some(value) = group.field(key) {
                    let _ = write!(block, ", {}", value);
                }
            }
            block.push('\n');
        }
        if let Some(batch) = group.field("batch_id") {
            let _ = write!(block, "• Batch: {}", batch);
            if let Some(batch_type) = group.field("batch_type") {
                let _ = write!(block, " ({})", batch_type);
            }
            block.push('\n');
        }
        for (key, label) in [
            ("feedback_date", "Date"),
            ("user_name", "Trainer"),
            ("logged_by_user_name", "Logged by"),
            ("total_hours_spent", "Hours Spent"),
        ] {
            if let Some(value) = group.field(key) {
                let _ = writeln!(block, "• {}: {}", label, value);
            }
        }
    }

    for bucket in &group.content_types {
        if bucket.items.is_empty() {
            continue;
        }
        let _ = writeln!(block, "\n{}:", title_case(&bucket.content_type.replace('_', " ")));
        for item in &bucket.items {
            let _ = writeln!(block, "• {}", item.text);
        }
    }

    block
}

/// Builds generator prompts from the `feedback.answer` prompt definition.
#[derive(Debug, Clone)]
pub struct AnswerComposer {
    definition: PromptDefinition,
    overridden: bool,
}

impl AnswerComposer {
    /// Use the workspace override in `prompts_dir` when present, the
    /// built-in definition otherwise.
    pub fn new(prompts_dir: Option<&Path>) -> AppResult<Self> {
        let resolved = resolve_prompt(prompts_dir, ANSWER_PROMPT_ID)?;
        if resolved.overridden {
            tracing::info!("Using workspace override for prompt '{}'", ANSWER_PROMPT_ID);
        }
        Ok(Self {
            definition: resolved.definition,
            overridden: resolved.overridden,
        })
    }

    pub fn overridden(&self) -> bool {
        self.overridden
    }

    pub fn compose(&self, query: &str, groups: &[GroupedResult]) -> AppResult<BuiltPrompt> {
        let mut variables = HashMap::new();
        variables.insert("query".to_string(), query.to_string());
        variables.insert("context".to_string(), render_context(groups));
        build_prompt(&self.definition, &variables, self.overridden)
    }
}

/// Turn the generator outcome into the answer shown to the caller.
pub fn parse_reply(reply: AppResult<LlmResponse>) -> String {
    match reply {
        Ok(response) if response.has_content() => response.content,
        Ok(response) => {
            tracing::error!(model = %response.model, "Generator reply has no content");
            UNEXPECTED_REPLY.to_string()
        }
        Err(e) => {
            tracing::error!("Generator call failed: {}", e);
            match e.status_code() {
                Some(status) => status_apology(status),
                None => TECHNICAL_DIFFICULTIES.to_string(),
            }
        }
    }
}
