//! Prompt builder: renders the system and user templates.

use crate::types::{BuiltPrompt, BuiltPromptMetadata, PromptDefinition};
use insight_core::{AppError, AppResult};
use handlebars::Handlebars;
use std::collections::HashMap;

/// Render a prompt definition with the given variables.
///
/// Variables missing from the map render as empty strings.
///
/// # Example
/// ```no_run
/// use insight_prompt::{build_prompt, builtin_prompt, ANSWER_PROMPT_ID};
/// use std::collections::HashMap;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let def = builtin_prompt(ANSWER_PROMPT_ID)?.expect("built-in prompt");
/// let mut vars = HashMap::new();
/// vars.insert("query".to_string(), "Which centres reported delays?".to_string());
/// vars.insert("context".to_string(), String::new());
///
/// let built = build_prompt(&def, &vars, false)?;
/// println!("User prompt: {}", built.user);
/// # Ok(())
/// # }
/// ```
pub fn build_prompt(
    definition: &PromptDefinition,
    variables: &HashMap<String, String>,
    overridden: bool,
) -> AppResult<BuiltPrompt> {
    tracing::debug!("Building prompt: {}", definition.id);

    let mut handlebars = Handlebars::new();
    // Plain text, not HTML
    handlebars.register_escape_fn(handlebars::no_escape);

    register(&mut handlebars, "user", &definition.template)?;
    let user = render(&handlebars, "user", variables)?;

    let system = match definition.system.as_deref() {
        Some(template) if !template.trim().is_empty() => {
            register(&mut handlebars, "system", template)?;
            Some(render(&handlebars, "system", variables)?)
        }
        _ => None,
    };

    let mut names: Vec<String> = variables.keys().cloned().collect();
    names.sort();

    Ok(BuiltPrompt {
        system,
        user,
        metadata: BuiltPromptMetadata {
            source_prompt_id: definition.id.clone(),
            variables: names,
            overridden,
        },
    })
}

fn register(handlebars: &mut Handlebars<'_>, name: &str, template: &str) -> AppResult<()> {
    handlebars
        .register_template_string(name, template)
        .map_err(|e| AppError::Prompt(format!("Failed to register {} template: {}", name, e)))
}

fn render(
    handlebars: &Handlebars<'_>,
    name: &str,
    variables: &HashMap<String, String>,
) -> AppResult<String> {
    handlebars
        .render(name, variables)
        .map_err(|e| AppError::Prompt(format!("Failed to render {} template: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PromptBehavior, PromptOutputSpec};

    fn definition(system: Option<&str>, template: &str) -> PromptDefinition {
        PromptDefinition {
            id: "test.prompt".to_string(),
            title: "Test".to_string(),
            api_version: "1.0".to_string(),
            created_by: "test".to_string(),
            behavior: PromptBehavior {
                tone: "professional".to_string(),
                style: "concise".to_string(),
            },
            system: system.map(str::to_string),
            template: template.to_string(),
            output: PromptOutputSpec {
                format: "markdown".to_string(),
            },
        }
    }

    #[test]
    fn test_render_user_and_system() {
        let def = definition(Some("You help {{audience}}."), "Question: {{query}}");
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "Why <late>?".to_string());
        vars.insert("audience".to_string(), "programme managers".to_string());

        let built = build_prompt(&def, &vars, false).unwrap();
        // No HTML escaping
        assert_eq!(built.user, "Question: Why <late>?");
        assert_eq!(built.system.as_deref(), Some("You help programme managers."));
        assert_eq!(built.metadata.variables, vec!["audience", "query"]);
        assert!(!built.metadata.overridden);
    }

    #[test]
    fn test_missing_variable_renders_empty() {
        let def = definition(None, "Q: {{query}}|{{context}}");
        let mut vars = HashMap::new();
        vars.insert("query".to_string(), "x".to_string());

        let built = build_prompt(&def, &vars, true).unwrap();
        assert_eq!(built.user, "Q: x|");
        assert!(built.system.is_none());
        assert!(built.metadata.overridden);
    }

    #[test]
    fn test_invalid_template() {
        let def = definition(None, "{{#if query}}unterminated");
        let result = build_prompt(&def, &HashMap::new(), false);
        assert!(matches!(result, Err(AppError::Prompt(_))));
    }
}
