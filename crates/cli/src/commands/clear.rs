//! Clear command handler.

use clap::Args;
use insight_core::{config::AppConfig, AppError, AppResult};
use insight_knowledge::FeedbackRag;

/// Empty the feedback index
#[derive(Args, Debug)]
pub struct ClearCommand {
    /// Delete the index directory instead of emptying the collection.
    /// Needed when the index was built with a different vector dimension.
    #[arg(long)]
    pub purge: bool,
}

impl ClearCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing clear command");

        let index_path = config.index_path();

        if self.purge {
            if index_path.exists() {
                std::fs::remove_dir_all(&index_path).map_err(|e| {
                    AppError::Index(format!("Failed to remove {:?}: {}", index_path, e))
                })?;
            }
            println!("Removed index at {}", index_path.display());
            return Ok(());
        }

        let rag = FeedbackRag::from_config(config).await?;
        rag.clear().await?;

        println!("Feedback index cleared");
        Ok(())
    }
}
