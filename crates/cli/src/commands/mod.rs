//! Command handlers for the Trainer Insight CLI.

pub mod ask;
pub mod clear;
pub mod filters;
pub mod index;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use clear::ClearCommand;
pub use filters::FiltersCommand;
pub use index::IndexCommand;
pub use status::StatusCommand;
