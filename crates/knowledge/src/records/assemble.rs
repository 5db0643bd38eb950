//! Client-side joins from feedback logs to full records.

use super::json_store::type_name;
use super::{
    Batch, BatchCourse, Centre, Course, CoursePlan, EntityKind, FeedbackLog, FeedbackRecord,
    Project, RawRecord, RecordStore, UserProfile,
};
use crate::types::SkipReason;
use insight_core::AppResult;
use serde_json::Value;
use tracing::{debug, info, warn};

/// Outcome of assembling every feedback log in the store.
#[derive(Debug, Default)]
pub struct AssemblyReport {
    pub records: Vec<FeedbackRecord>,
    pub skipped: Vec<SkipReason>,
}

impl AssemblyReport {
    /// Number of log entries seen, assembled or not.
    pub fn total_entries(&self) -> usize {
        self.records.len() + self.skipped.len()
    }
}

/// Join every feedback log with its related entities.
///
/// Fails only when the feedback log table itself cannot be read. A log that
/// is malformed or whose lookups fail is skipped and reported; a related
/// entity that simply does not exist leaves its slot empty.
pub async fn assemble(store: &dyn RecordStore) -> AppResult<AssemblyReport> {
    let logs = store.fetch_all(EntityKind::FeedbackLog).await?;
    info!(store = store.name(), entries = logs.len(), "Assembling feedback records");

    let mut report = AssemblyReport::default();
    for (feedback_id, value) in logs {
        match assemble_one(store, &feedback_id, &value).await {
            Ok(record) => report.records.push(record),
            Err(reason) => {
                warn!("Skipping feedback record: {}", reason);
                report.skipped.push(reason);
            }
        }
    }

    info!(
        assembled = report.records.len(),
        skipped = report.skipped.len(),
        "Feedback records assembled"
    );
    Ok(report)
}

async fn assemble_one(
    store: &dyn RecordStore,
    feedback_id: &str,
    value: &Value,
) -> Result<FeedbackRecord, SkipReason> {
    let raw = value.as_object().ok_or_else(|| {
        debug!(found = type_name(value), "Feedback log is not an object");
        SkipReason::MalformedRecord {
            record_id: feedback_id.to_string(),
        }
    })?;

    let log = FeedbackLog::from_raw(raw);
    let mut record = FeedbackRecord {
        feedback_id: feedback_id.to_string(),
        ..Default::default()
    };

    let link = lookup(store, feedback_id, EntityKind::BatchCourse, &log.bctm_id)
        .await?
        .map(|raw| BatchCourse::from_raw(&raw));

    if let Some(link) = &link {
        record.batch = lookup(store, feedback_id, EntityKind::Batch, &link.batch_id)
            .await?
            .map(|raw| Batch::from_raw(&link.batch_id, &raw));

        if let Some(batch) = &record.batch {
            record.centre = lookup(store, feedback_id, EntityKind::Centre, &batch.centre_id)
                .await?
                .map(|raw| Centre::from_raw(&batch.centre_id, &raw));
        }

        record.course = lookup(store, feedback_id, EntityKind::Course, &link.course_id)
            .await?
            .map(|raw| Course::from_raw(&link.course_id, &raw));

        record.project = lookup(store, feedback_id, EntityKind::Project, &link.project_id)
            .await?
            .map(|raw| Project::from_raw(&link.project_id, &raw));

        record.trainer = lookup(store, feedback_id, EntityKind::User, &link.user_id)
            .await?
            .map(|raw| UserProfile::from_raw(&link.user_id, &raw));
    }

    record.logged_by = lookup(store, feedback_id, EntityKind::User, &log.logged_by)
        .await?
        .map(|raw| UserProfile::from_raw(&log.logged_by, &raw));

    for plan_id in &log.course_plan_ids {
        if let Some(raw) = lookup(store, feedback_id, EntityKind::CoursePlan, plan_id).await? {
            record.course_plans.push(CoursePlan::from_raw(plan_id, &raw));
        }
    }

    record.log = log;
    Ok(record)
}

/// Look up a related entity. An empty key means "not linked".
async fn lookup(
    store: &dyn RecordStore,
    feedback_id: &str,
    entity: EntityKind,
    key: &str,
) -> Result<Option<RawRecord>, SkipReason> {
    let key = key.trim();
    if key.is_empty() {
        return Ok(None);
    }

    match store.find_by_key(entity, key).await {
        Ok(Some(raw)) => Ok(Some(raw)),
        Ok(None) => {
            debug!(
                record = feedback_id,
                entity = entity.table(),
                key,
                "Related entity not found"
            );
            Ok(None)
        }
        Err(e) => Err(SkipReason::LookupFailed {
            record_id: feedback_id.to_string(),
            entity: entity.table(),
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{FieldText, JsonRecordStore};
    use serde_json::json;

    fn export() -> Value {
        json!({
            "TrainersFeedbackLog": [
                {
                    "feedback": "Trainees planted rafts on schedule.",
                    "challenges": "Rough sea delayed two sessions.",
                    "feedback_date": "22-05-2025",
                    "Total_hours_Spent": 6,
                    "loggedby": "u2",
                    "bctm_id": "bc1",
                    "course_plan_id": ["cp1", "cp-missing"]
                },
                null,
                "not a record",
                {
                    "feedback": "Orientation only.",
                    "bctm_id": "bc-missing"
                }
            ],
            "BatchCourse": {
                "bc1": {"bctm_id": "bc1", "batch_id": "B-12", "course_id": "C1", "project_id": "P1", "user_id": "u1"}
            },
            "Batch": {"B-12": {"batch_id": "B-12", "batch_type": "Residential", "status": "active", "centre_id": "c1"}},
            "Centre": {"c1": {"centre_id": "c1", "centre_name": "Mandapam", "district": "Ramanathapuram", "state": "Tamil Nadu"}},
            "Course": {"C1": {"course_id": "C1", "course_name": "Seaweed Farming"}},
            "Project": {"P1": {"project_id": "P1", "project_name": "Seaweed Cultivation"}},
            "User": {
                "u1": {"user_id": "u1", "full_name": "Meena R", "utype": "trainer"},
                "u2": {"user_id": "u2", "name": "Ravi", "role": "coordinator"}
            },
            "CoursePlan": {"cp1": {"course_plan_id": "cp1", "course_plan_details": "Week 1: site survey"}}
        })
    }

    #[tokio::test]
    async fn test_assemble_joins_related_entities() {
        let store = JsonRecordStore::from_value("test", &export()).unwrap();
        let report = assemble(&store).await.unwrap();

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.total_entries(), 3);
        assert_eq!(
            report.skipped[0],
            SkipReason::MalformedRecord {
                record_id: "2".into()
            }
        );

        let full = &report.records[0];
        assert_eq!(full.feedback_id, "0");
        assert_eq!(full.batch.as_ref().unwrap().batch_type, "Residential");
        assert_eq!(full.centre.as_ref().unwrap().centre_name, "Mandapam");
        assert_eq!(full.course.as_ref().unwrap().course_name, "Seaweed Farming");
        assert_eq!(full.project.as_ref().unwrap().project_name, "Seaweed Cultivation");
        assert_eq!(full.trainer.as_ref().unwrap().name, "Meena R");
        assert_eq!(full.logged_by.as_ref().unwrap().name, "Ravi");
        assert_eq!(full.course_plans.len(), 1);
        assert_eq!(
            full.course_plans[0].details,
            FieldText::Text("Week 1: site survey".into())
        );
    }

    #[tokio::test]
    async fn test_missing_link_leaves_slots_empty() {
        let store = JsonRecordStore::from_value("test", &export()).unwrap();
        let report = assemble(&store).await.unwrap();

        let sparse = &report.records[1];
        assert_eq!(sparse.feedback_id, "3");
        assert!(sparse.batch.is_none());
        assert!(sparse.project.is_none());
        assert!(sparse.logged_by.is_none());
        assert!(sparse.course_plans.is_empty());
    }

    #[tokio::test]
    async fn test_empty_store() {
        let store = JsonRecordStore::from_value("test", &json!({})).unwrap();
        let report = assemble(&store).await.unwrap();
        assert!(report.records.is_empty());
        assert_eq!(report.total_entries(), 0);
    }
}
