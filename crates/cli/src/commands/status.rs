//! Status command handler.

use clap::Args;
use insight_core::{config::AppConfig, AppResult};
use insight_knowledge::FeedbackRag;

/// Show index and service status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let rag = FeedbackRag::from_config(config).await?;
        let status = rag.status().await;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&status)?);
            return Ok(());
        }

        println!(
            "Initialized: {}",
            if status.initialized { "yes" } else { "no" }
        );
        println!("Index: {}", status.index.collection_name);
        println!("  Backend: {}", status.index.backend);
        println!("  Location: {}", status.index.location);
        println!("  Chunks: {}", status.index.total_chunks);
        if let Some(built_with) = &status.index.built_with {
            println!("  Built with: {}", built_with);
        }
        if let Some(indexed_at) = status.index.indexed_at {
            println!("  Indexed at: {}", indexed_at);
        }

        println!("Services:");
        println!("  Record store: {}", status.services.record_store.as_str());
        println!("  Embedding: {}", status.services.embedding.as_str());
        println!("  Generator: {}", status.services.generator.as_str());
        println!("  Index: {}", status.services.index.as_str());

        for problem in &status.problems {
            println!("Problem: {}", problem);
        }

        Ok(())
    }
}
