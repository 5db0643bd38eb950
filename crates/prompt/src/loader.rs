//! Prompt loader.
//!
//! Prompts ship built into the binary and can be replaced per workspace by
//! dropping `<id>.yml` into the prompts directory (`.insight/prompts/`).

use crate::types::PromptDefinition;
use insight_core::{AppError, AppResult};
use std::path::Path;

/// Prompt used to answer questions over retrieved feedback.
pub const ANSWER_PROMPT_ID: &str = "feedback.answer";

const BUILTIN_PROMPTS: &[(&str, &str)] = &[(
    ANSWER_PROMPT_ID,
    include_str!("../prompts/feedback.answer.yml"),
)];

/// A prompt definition and where it came from.
#[derive(Debug, Clone)]
pub struct ResolvedPrompt {
    pub definition: PromptDefinition,
    pub overridden: bool,
}

/// Load a prompt definition by ID from a prompts directory.
///
/// Looks for `<id>.yml`, then `<id>.yaml`.
///
/// # Example
/// ```no_run
/// use insight_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new(".insight/prompts"), "feedback.answer")?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(prompts_dir: &Path, prompt_id: &str) -> AppResult<PromptDefinition> {
    let prompt_file = ["yml", "yaml"]
        .iter()
        .map(|ext| prompts_dir.join(format!("{}.{}", prompt_id, ext)))
        .find(|path| path.exists())
        .ok_or_else(|| {
            AppError::Prompt(format!(
                "Prompt file not found: {:?}",
                prompts_dir.join(format!("{}.yml", prompt_id))
            ))
        })?;

    tracing::debug!("Loading prompt from: {:?}", prompt_file);

    let contents = std::fs::read_to_string(&prompt_file).map_err(|e| {
        AppError::Prompt(format!(
            "Failed to read prompt file {:?}: {}",
            prompt_file, e
        ))
    })?;

    let definition = parse_prompt(&contents)
        .map_err(|e| AppError::Prompt(format!("{:?}: {}", prompt_file, e)))?;

    if definition.id != prompt_id {
        return Err(AppError::Prompt(format!(
            "Prompt file {:?} declares id '{}', expected '{}'",
            prompt_file, definition.id, prompt_id
        )));
    }

    tracing::info!("Loaded prompt override: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// The built-in definition for `prompt_id`, if there is one.
pub fn builtin_prompt(prompt_id: &str) -> AppResult<Option<PromptDefinition>> {
    BUILTIN_PROMPTS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, source)| parse_prompt(source))
        .transpose()
}

/// Workspace override when present, else the built-in definition.
pub fn resolve_prompt(prompts_dir: Option<&Path>, prompt_id: &str) -> AppResult<ResolvedPrompt> {
    if let Some(dir) = prompts_dir {
        let has_override = ["yml", "yaml"]
            .iter()
            .any(|ext| dir.join(format!("{}.{}", prompt_id, ext)).exists());
        if has_override {
            return Ok(ResolvedPrompt {
                definition: load_prompt(dir, prompt_id)?,
                overridden: true,
            });
        }
    }

    match builtin_prompt(prompt_id)? {
        Some(definition) => Ok(ResolvedPrompt {
            definition,
            overridden: false,
        }),
        None => Err(AppError::Prompt(format!("Unknown prompt: {}", prompt_id))),
    }
}

fn parse_prompt(contents: &str) -> AppResult<PromptDefinition> {
    let definition: PromptDefinition = serde_yaml::from_str(contents)
        .map_err(|e| AppError::Prompt(format!("Failed to parse prompt YAML: {}", e)))?;
    validate_prompt(&definition)?;
    Ok(definition)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Prompt("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Prompt("Prompt title cannot be empty".to_string()));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Prompt(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    if !def.api_version.contains('.') {
        return Err(AppError::Prompt(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}
