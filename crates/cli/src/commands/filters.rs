//! Filters command handler.
//!
//! Shows how the query analyzer reads a question, without touching the
//! index or any remote service.

use clap::Args;
use insight_core::AppResult;
use insight_knowledge::QueryAnalyzer;

/// Show the filters extracted from a query
#[derive(Args, Debug)]
pub struct FiltersCommand {
    /// The question to analyze
    pub query: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl FiltersCommand {
    pub fn execute(&self) -> AppResult<()> {
        let analyzer = QueryAnalyzer::new()?;
        let outcomes = analyzer.explain(&self.query);

        if self.json {
            let output = serde_json::json!({
                "query": self.query,
                "filters": analyzer.extract_filters(&self.query),
                "rules": outcomes,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            return Ok(());
        }

        for outcome in &outcomes {
            let verdict = match (&outcome.matched, &outcome.value) {
                (None, _) => "no match".to_string(),
                (Some(matched), None) => format!("matched '{}', no filter", matched),
                (Some(_), Some(value)) => format!("{} = {}", outcome.field, value),
            };
            println!("{:<14} {}", format!("{:?}", outcome.category), verdict);
        }

        Ok(())
    }
}
