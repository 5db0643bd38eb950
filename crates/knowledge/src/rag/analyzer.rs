//! Query analyzer: coarse metadata filters from free-text questions.
//!
//! Filters come from an ordered rule table. Within a category the first
//! rule whose pattern matches decides, even when its extractor then rejects
//! the capture. Extraction is best effort: a missed filter only means an
//! unfiltered search.

use crate::types::Metadata;
use insight_core::{AppError, AppResult};
use regex::Regex;
use serde::Serialize;

/// What a rule extracts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterCategory {
    Project,
    Batch,
    Location,
    Date,
    ContentType,
}

impl FilterCategory {
    pub const ALL: [FilterCategory; 5] = [
        FilterCategory::Project,
        FilterCategory::Batch,
        FilterCategory::Location,
        FilterCategory::Date,
        FilterCategory::ContentType,
    ];

    /// Metadata field the category filters on.
    pub fn field(&self) -> &'static str {
        match self {
            FilterCategory::Project => "project_name",
            FilterCategory::Batch => "batch_id",
            FilterCategory::Location => "centre_name",
            FilterCategory::Date => "feedback_date",
            FilterCategory::ContentType => "content_type",
        }
    }
}

/// How a capture becomes a filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Extractor {
    /// Capture cut at the first connector word, title-cased
    ProjectName,
    /// Words after the last connector word, title-cased
    TrailingProjectName,
    /// Capture as written in the query
    Verbatim,
    /// Single word, title-cased, stoplist applies
    Place,
    /// `d-m-yyyy` or `d/m/yyyy` normalized to `dd-mm-yyyy`
    ExplicitDate,
    /// Recognized but too coarse for an equality filter
    Recognized,
    /// Fixed value
    Constant(&'static str),
}

/// Source form of one rule.
struct RuleDef {
    category: FilterCategory,
    pattern: &'static str,
    extractor: Extractor,
}

const RULES: &[RuleDef] = &[
    RuleDef {
        category: FilterCategory::Project,
        pattern: r"(?i)\bin\s+(?:the\s+)?([a-z][a-z\s\-]*?)\s+project\b",
        extractor: Extractor::TrailingProjectName,
    },
    RuleDef {
        category: FilterCategory::Project,
        pattern: r"(?i)\bproject\s+([a-z][a-z\-]*(?:\s+[a-z][a-z\-]*){0,3})",
        extractor: Extractor::ProjectName,
    },
    RuleDef {
        category: FilterCategory::Project,
        pattern: r"(?i)\b([a-z]+\s+cultivation)\b",
        extractor: Extractor::ProjectName,
    },
    RuleDef {
        category: FilterCategory::Batch,
        pattern: r"(?i)\bbatch[- ]([a-z0-9\-]+)",
        extractor: Extractor::Verbatim,
    },
    RuleDef {
        category: FilterCategory::Batch,
        pattern: r"(?i)\bfor\s+([a-z0-9\-]+)\s+batch\b",
        extractor: Extractor::Verbatim,
    },
    RuleDef {
        category: FilterCategory::Location,
        pattern: r"(?i)\bin\s+([a-z]+)\b",
        extractor: Extractor::Place,
    },
    RuleDef {
        category: FilterCategory::Location,
        pattern: r"(?i)\bat\s+([a-z]+)\b",
        extractor: Extractor::Place,
    },
    RuleDef {
        category: FilterCategory::Location,
        pattern: r"(?i)\bcentre[- ]([a-z]+)\b",
        extractor: Extractor::Place,
    },
    RuleDef {
        category: FilterCategory::Date,
        pattern: r"\b(\d{1,2}[-/]\d{1,2}[-/]\d{4})\b",
        extractor: Extractor::ExplicitDate,
    },
    RuleDef {
        category: FilterCategory::Date,
        pattern: r"(?i)\b(january|february|march|april|may|june|july|august|september|october|november|december)\b(?:\s+\d{4})?",
        extractor: Extractor::Recognized,
    },
    RuleDef {
        category: FilterCategory::Date,
        pattern: r"\b(\d{4})\b",
        extractor: Extractor::Recognized,
    },
    RuleDef {
        category: FilterCategory::ContentType,
        pattern: r"(?i)(challenge)",
        extractor: Extractor::Constant("challenges"),
    },
    RuleDef {
        category: FilterCategory::ContentType,
        pattern: r"(?i)(feedback)",
        extractor: Extractor::Constant("feedback"),
    },
    RuleDef {
        category: FilterCategory::ContentType,
        pattern: r"(?i)(course\s+plan)",
        extractor: Extractor::Constant("course_plan"),
    },
];

const MONTHS: &[&str] = &[
    "january", "february", "march", "april", "may", "june", "july", "august", "september",
    "october", "november", "december",
];

const DOMAIN_WORDS: &[&str] = &[
    "challenge", "challenges", "feedback", "course", "courses", "project", "projects", "batch",
    "batches", "centre", "centres", "center", "training", "trainer", "trainers", "session",
    "sessions", "plan", "plans", "general", "total",
];

const DETERMINERS: &[&str] = &[
    "the", "a", "an", "this", "that", "these", "those", "our", "my", "your", "their", "all",
    "any", "each", "every", "which", "what", "some", "last", "recent",
];

/// Words that end a project name inside a longer capture.
const CONNECTORS: &[&str] = &[
    "in", "at", "on", "for", "during", "with", "from", "of", "and", "or", "the", "a", "an", "to",
    "by", "about", "batch", "centre",
];

fn is_stop_word(word: &str) -> bool {
    let word = word.to_lowercase();
    MONTHS.contains(&word.as_str())
        || DOMAIN_WORDS.contains(&word.as_str())
        || DETERMINERS.contains(&word.as_str())
}

struct Rule {
    category: FilterCategory,
    regex: Regex,
    extractor: Extractor,
}

/// Outcome of one category for a query, for `insight filters`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleOutcome {
    pub category: FilterCategory,
    pub field: &'static str,
    /// Text captured by the deciding rule
    pub matched: Option<String>,
    /// Filter value, if the capture was accepted
    pub value: Option<String>,
}

pub struct QueryAnalyzer {
    rules: Vec<Rule>,
}

impl std::fmt::Debug for QueryAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryAnalyzer")
            .field("rules", &self.rules.len())
            .finish()
    }
}

impl QueryAnalyzer {
    /// Compile the rule table.
    pub fn new() -> AppResult<Self> {
        let rules = RULES
            .iter()
            .map(|def| {
                let regex = Regex::new(def.pattern).map_err(|e| {
                    AppError::Invariant(format!("Invalid analyzer pattern {}: {}", def.pattern, e))
                })?;
                Ok(Rule {
                    category: def.category,
                    regex,
                    extractor: def.extractor,
                })
            })
            .collect::<AppResult<Vec<_>>>()?;

        Ok(Self { rules })
    }

    /// Extract `field -> value` filters. Never fails; an empty map means
    /// "search everything".
    pub fn extract_filters(&self, query: &str) -> Metadata {
        let filters: Metadata = self
            .explain(query)
            .into_iter()
            .filter_map(|outcome| outcome.value.map(|v| (outcome.field.to_string(), v)))
            .collect();

        tracing::debug!(?filters, "Extracted query filters");
        filters
    }

    /// Per-category outcome, including captures that were rejected.
    pub fn explain(&self, query: &str) -> Vec<RuleOutcome> {
        FilterCategory::ALL
            .iter()
            .map(|category| self.evaluate(*category, query))
            .collect()
    }

    fn evaluate(&self, category: FilterCategory, query: &str) -> RuleOutcome {
        let deciding = self
            .rules
            .iter()
            .filter(|rule| rule.category == category)
            .find_map(|rule| rule.regex.captures(query).map(|caps| (rule, caps)));

        let Some((rule, caps)) = deciding else {
            return RuleOutcome {
                category,
                field: category.field(),
                matched: None,
                value: None,
            };
        };

        let captured = caps
            .get(1)
            .or_else(|| caps.get(0))
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
        let value = extract(rule.extractor, &captured);

        RuleOutcome {
            category,
            field: category.field(),
            matched: Some(captured),
            value,
        }
    }
}

fn extract(extractor: Extractor, captured: &str) -> Option<String> {
    match extractor {
        Extractor::ProjectName => {
            let words: Vec<&str> = captured
                .split_whitespace()
                .take_while(|word| !is_connector(word))
                .collect();
            project_name(&words)
        }
        Extractor::TrailingProjectName => {
            let words: Vec<&str> = captured.split_whitespace().collect();
            let start = words
                .iter()
                .rposition(|word| is_connector(word))
                .map_or(0, |i| i + 1);
            project_name(&words[start..])
        }
        Extractor::Verbatim => {
            if captured.is_empty() || is_stop_word(captured) {
                None
            } else {
                Some(captured.to_string())
            }
        }
        Extractor::Place => {
            if captured.is_empty() || is_stop_word(captured) {
                None
            } else {
                Some(title_case(captured))
            }
        }
        Extractor::ExplicitDate => normalize_date(captured),
        Extractor::Recognized => None,
        Extractor::Constant(value) => Some(value.to_string()),
    }
}

fn is_connector(word: &str) -> bool {
    CONNECTORS.contains(&word.to_lowercase().as_str())
}

fn project_name(words: &[&str]) -> Option<String> {
    let name = words.join(" ");
    if name.is_empty() || is_stop_word(&name) {
        None
    } else {
        Some(title_case(&name))
    }
}

/// `5/3/2025` -> `05-03-2025`. Out-of-range days or months are rejected.
fn normalize_date(captured: &str) -> Option<String> {
    let parts: Vec<&str> = captured.split(['-', '/']).collect();
    let [day, month, year] = parts.as_slice() else {
        return None;
    };

    let day: u32 = day.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    if !(1..=31).contains(&day) || !(1..=12).contains(&month) {
        return None;
    }

    Some(format!("{:02}-{:02}-{}", day, month, year))
}

/// Uppercase the first letter of every word, lowercase the rest.
pub fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
