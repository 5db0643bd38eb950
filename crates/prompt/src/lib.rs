//! Prompt system for Trainer Insight.
//!
//! - YAML prompt definitions, built in or overridden per workspace
//! - Handlebars rendering of system and user messages

pub mod builder;
pub mod loader;
pub mod types;

// Re-export main types
pub use builder::build_prompt;
pub use loader::{builtin_prompt, load_prompt, resolve_prompt, ResolvedPrompt, ANSWER_PROMPT_ID};
pub use types::{BuiltPrompt, BuiltPromptMetadata, PromptBehavior, PromptDefinition, PromptOutputSpec};
