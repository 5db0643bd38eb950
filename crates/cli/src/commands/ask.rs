//! Ask command handler.
//!
//! Answers a question from the feedback index.

use clap::Args;
use insight_core::{config::AppConfig, AppError, AppResult};
use insight_knowledge::{FeedbackRag, RagResponse};

/// Ask a question about trainer feedback
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question
    pub query: String,

    /// Number of chunks to retrieve
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Minimum similarity for a chunk to count as relevant
    #[arg(long)]
    pub threshold: Option<f32>,

    /// Fail instead of building the index when it is missing
    #[arg(long)]
    pub no_auto_index: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");

        let query = self.query.trim();
        if query.is_empty() {
            return Err(AppError::Other("Query cannot be empty".to_string()));
        }

        let mut config = config.clone();
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if let Some(threshold) = self.threshold {
            config.retrieval.similarity_threshold = threshold;
        }
        if self.no_auto_index {
            config.retrieval.auto_initialize = false;
        }
        config.validate()?;

        let rag = FeedbackRag::from_config(&config).await?;
        let response = rag.process_query(query).await;

        tracing::debug!(
            total_found = response.metadata.total_found,
            relevant = response.metadata.relevant_count,
            sources = response.sources.len(),
            "Query answered"
        );

        if self.json {
            println!("{}", serde_json::to_string_pretty(&response)?);
        } else {
            print_response(&response);
        }

        Ok(())
    }
}

fn print_response(response: &RagResponse) {
    println!("Answer:");
    println!("{}", response.answer);
    println!();

    if let Some(error) = &response.metadata.error {
        eprintln!("Query failed: {}", error);
        return;
    }

    if !response.metadata.filters_applied.is_empty() {
        let filters: Vec<String> = response
            .metadata
            .filters_applied
            .iter()
            .map(|(field, value)| format!("{}={}", field, value))
            .collect();
        println!("Filters: {}", filters.join(", "));
    }

    if response.sources.is_empty() {
        println!("Sources: (no sources available)");
        return;
    }

    println!("Sources:");
    for source in &response.sources {
        let context: Vec<&str> = [
            source.project.as_str(),
            source.centre.as_str(),
            source.batch.as_str(),
            source.date.as_str(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect();

        println!(
            "- Feedback {} ({}) [{}] relevance {:.2}",
            source.feedback_id,
            context.join(", "),
            source.content_types.join(", "),
            source.relevance_score
        );
        if !source.trainer.is_empty() {
            println!("  Trainer: {}", source.trainer);
        }
    }
}
