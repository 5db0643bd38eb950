//! Prompt types for Trainer Insight.

use serde::{Deserialize, Serialize};

/// A prompt definition loaded from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    #[serde(rename = "createdBy", default)]
    pub created_by: String,

    pub behavior: PromptBehavior,

    /// System message template (Handlebars)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// User message template (Handlebars)
    pub template: String,

    pub output: PromptOutputSpec,
}

/// Behavioral settings for prompt execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptBehavior {
    /// Tone (e.g., "professional", "casual")
    pub tone: String,

    /// Style (e.g., "concise", "structured")
    pub style: String,
}

/// Output specification for the prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptOutputSpec {
    /// Output format (e.g., "text", "markdown")
    pub format: String,
}

/// A rendered prompt ready for the generator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPrompt {
    pub system: Option<String>,

    pub user: String,

    pub metadata: BuiltPromptMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltPromptMetadata {
    #[serde(rename = "sourcePromptId")]
    pub source_prompt_id: String,

    /// Names of the variables that were supplied, sorted
    #[serde(rename = "variables")]
    pub variables: Vec<String>,

    /// Whether the definition came from a workspace override
    #[serde(rename = "overridden")]
    pub overridden: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: feedback.answer
title: Centre coordinator answers
apiVersion: "1.1"
createdBy: training-ops
behavior:
  tone: warm
  style: bulleted
system: "Answer from the trainer feedback only."
template: "{{context}}\n\nQ: {{query}}"
output:
  format: markdown
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "feedback.answer");
        assert_eq!(def.api_version, "1.1");
        assert_eq!(def.created_by, "training-ops");
        assert_eq!(def.behavior.style, "bulleted");
        assert_eq!(
            def.system.as_deref(),
            Some("Answer from the trainer feedback only.")
        );
        assert!(def.template.starts_with("{{context}}"));
    }

    #[test]
    fn test_system_is_optional() {
        let yaml = r#"
id: bare
title: Bare
apiVersion: "1.0"
behavior: { tone: neutral, style: short }
template: "{{query}}"
output: { format: text }
"#;
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.system.is_none());
    }
}
