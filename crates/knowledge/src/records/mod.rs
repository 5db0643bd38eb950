//! Feedback records and the store they are read from.
//!
//! The record store holds normalized tables (feedback logs, batches,
//! centres, ...). Joining them into a [`FeedbackRecord`] happens client side
//! through key lookups, see [`assemble`].

mod assemble;
mod json_store;

pub use assemble::{assemble, AssemblyReport};
pub use json_store::JsonRecordStore;

use insight_core::AppResult;
use serde::Serialize;
use serde_json::{Map, Value};

/// A raw entity as stored upstream.
pub type RawRecord = Map<String, Value>;

/// Tables of the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    FeedbackLog,
    BatchCourse,
    Batch,
    Centre,
    Course,
    Project,
    User,
    CoursePlan,
}

impl EntityKind {
    pub const ALL: [EntityKind; 8] = [
        EntityKind::FeedbackLog,
        EntityKind::BatchCourse,
        EntityKind::Batch,
        EntityKind::Centre,
        EntityKind::Course,
        EntityKind::Project,
        EntityKind::User,
        EntityKind::CoursePlan,
    ];

    /// Upstream table name.
    pub fn table(&self) -> &'static str {
        match self {
            EntityKind::FeedbackLog => "TrainersFeedbackLog",
            EntityKind::BatchCourse => "BatchCourse",
            EntityKind::Batch => "Batch",
            EntityKind::Centre => "Centre",
            EntityKind::Course => "Course",
            EntityKind::Project => "Project",
            EntityKind::User => "User",
            EntityKind::CoursePlan => "CoursePlan",
        }
    }

    /// Field that `find_by_key` matches on. Feedback logs are only ever
    /// listed, never looked up.
    pub fn key_field(&self) -> Option<&'static str> {
        match self {
            EntityKind::FeedbackLog => None,
            EntityKind::BatchCourse => Some("bctm_id"),
            EntityKind::Batch => Some("batch_id"),
            EntityKind::Centre => Some("centre_id"),
            EntityKind::Course => Some("course_id"),
            EntityKind::Project => Some("project_id"),
            EntityKind::User => Some("user_id"),
            EntityKind::CoursePlan => Some("course_plan_id"),
        }
    }
}

/// Read access to the upstream record store.
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    /// Human-readable name for logs and status output.
    fn name(&self) -> &str;

    /// Every entry of a table as `(id, value)`. Ids are the map keys of an
    /// object-shaped table or the positions of a list-shaped one; null
    /// entries are left out.
    async fn fetch_all(&self, entity: EntityKind) -> AppResult<Vec<(String, Value)>>;

    /// The first entry whose key field equals `key`.
    async fn find_by_key(&self, entity: EntityKind, key: &str) -> AppResult<Option<RawRecord>>;
}

/// Text-valued field of a raw record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FieldText {
    #[default]
    Absent,
    Text(String),
    /// The field held a structure where text was expected
    Malformed(&'static str),
}

impl FieldText {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => FieldText::Absent,
            Some(Value::Array(_)) => FieldText::Malformed("a list"),
            Some(Value::Object(_)) => FieldText::Malformed("an object"),
            Some(other) => scalar_to_string(other)
                .map(FieldText::Text)
                .unwrap_or(FieldText::Absent),
        }
    }
}

/// Stringify a scalar JSON value. Structures and null yield `None`.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Scalar field as a string, empty when missing.
pub(crate) fn text_of(raw: &RawRecord, key: &str) -> String {
    raw.get(key).and_then(scalar_to_string).unwrap_or_default()
}

/// First non-empty field among `keys`.
fn first_text(raw: &RawRecord, keys: &[&str]) -> String {
    keys.iter()
        .map(|key| text_of(raw, key))
        .find(|value| !value.is_empty())
        .unwrap_or_default()
}

fn id_or(raw: &RawRecord, field: &str, fallback: &str) -> String {
    let id = text_of(raw, field);
    if id.is_empty() {
        fallback.to_string()
    } else {
        id
    }
}

/// The feedback log entry itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackLog {
    pub feedback: FieldText,
    pub challenges: FieldText,
    pub feedback_date: String,
    pub total_hours_spent: String,
    pub logged_by: String,
    pub bctm_id: String,
    pub course_plan_ids: Vec<String>,
}

impl FeedbackLog {
    pub fn from_raw(raw: &RawRecord) -> Self {
        let course_plan_ids: Vec<String> = match raw.get("course_plan_id") {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(other).into_iter().collect(),
            None => Vec::new(),
        };

        Self {
            feedback: FieldText::from_value(raw.get("feedback")),
            challenges: FieldText::from_value(raw.get("challenges")),
            feedback_date: text_of(raw, "feedback_date"),
            total_hours_spent: text_of(raw, "Total_hours_Spent"),
            logged_by: text_of(raw, "loggedby"),
            bctm_id: text_of(raw, "bctm_id"),
            course_plan_ids: course_plan_ids
                .into_iter()
                .filter(|id| !id.trim().is_empty())
                .collect(),
        }
    }
}

/// Link row tying a batch to its course, project and trainer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchCourse {
    pub batch_id: String,
    pub course_id: String,
    pub project_id: String,
    pub user_id: String,
}

impl BatchCourse {
    pub fn from_raw(raw: &RawRecord) -> Self {
        Self {
            batch_id: text_of(raw, "batch_id"),
            course_id: text_of(raw, "course_id"),
            project_id: text_of(raw, "project_id"),
            user_id: text_of(raw, "user_id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Batch {
    pub batch_id: String,
    pub batch_type: String,
    pub status: String,
    pub centre_id: String,
}

impl Batch {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            batch_id: id_or(raw, "batch_id", key),
            batch_type: text_of(raw, "batch_type"),
            status: text_of(raw, "status"),
            centre_id: text_of(raw, "centre_id"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Centre {
    pub centre_id: String,
    pub centre_name: String,
    pub district: String,
    pub state: String,
    pub village: String,
}

impl Centre {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            centre_id: id_or(raw, "centre_id", key),
            centre_name: text_of(raw, "centre_name"),
            district: text_of(raw, "district"),
            state: text_of(raw, "state"),
            village: text_of(raw, "village"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Course {
    pub course_id: String,
    pub course_name: String,
    pub course_description: String,
}

impl Course {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            course_id: id_or(raw, "course_id", key),
            course_name: text_of(raw, "course_name"),
            course_description: text_of(raw, "course_description"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Project {
    pub project_id: String,
    pub project_name: String,
    pub project_description: String,
}

impl Project {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            project_id: id_or(raw, "project_id", key),
            project_name: text_of(raw, "project_name"),
            project_description: text_of(raw, "project_desc"),
        }
    }
}

/// A trainer or the person who logged the feedback.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub role: String,
}

impl UserProfile {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            user_id: id_or(raw, "user_id", key),
            name: first_text(raw, &["full_name", "name"]),
            role: first_text(raw, &["utype", "role"]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoursePlan {
    pub course_plan_id: String,
    pub details: FieldText,
}

impl CoursePlan {
    pub fn from_raw(key: &str, raw: &RawRecord) -> Self {
        Self {
            course_plan_id: id_or(raw, "course_plan_id", key),
            details: FieldText::from_value(raw.get("course_plan_details")),
        }
    }
}

/// A feedback log joined with everything it references. Related entities
/// that could not be found are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeedbackRecord {
    pub feedback_id: String,
    pub log: FeedbackLog,
    pub batch: Option<Batch>,
    pub centre: Option<Centre>,
    pub course: Option<Course>,
    pub project: Option<Project>,
    pub trainer: Option<UserProfile>,
    pub logged_by: Option<UserProfile>,
    pub course_plans: Vec<CoursePlan>,
}
