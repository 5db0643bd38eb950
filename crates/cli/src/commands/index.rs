//! Index command handler.
//!
//! Rebuilds the feedback index from the record export.

use clap::Args;
use insight_core::{config::AppConfig, AppError, AppResult};
use insight_knowledge::{FeedbackRag, ProgressEvent, ProgressReporter};
use std::sync::Arc;

/// Build the feedback index from the record export
#[derive(Args, Debug)]
pub struct IndexCommand {
    /// Print progress to stderr
    #[arg(long)]
    pub progress: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IndexCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing index command");

        let records = config.records_path();
        if !records.exists() {
            return Err(AppError::Records(format!(
                "Record export not found at {:?}. Pass --records or set records.path",
                records
            )));
        }

        let rag = FeedbackRag::from_config(config).await?;

        let progress = if self.progress {
            ProgressReporter::new(Arc::new(|event: ProgressEvent| {
                eprintln!("{}", event.format_simple())
            }))
        } else {
            ProgressReporter::noop()
        };

        let report = rag.initialize(&progress).await?;

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            println!(
                "Indexed {} feedback entries into {} chunks ({} entries skipped, {} fields skipped)",
                report.total_feedback_entries,
                report.total_chunks,
                report.skipped_records,
                report.skipped_fields
            );
            if report.degraded_embeddings > 0 {
                println!(
                    "Warning: {} chunks could not be embedded and were stored as zero vectors",
                    report.degraded_embeddings
                );
            }
            println!("Index now holds {} entries", report.index_count);
        }

        Ok(())
    }
}
