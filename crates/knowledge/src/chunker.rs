//! Splits feedback records into bounded, overlapping chunks.
//!
//! Sizes are measured in characters, never bytes, so multi-byte text is
//! never cut inside a code point.

use crate::records::{FeedbackRecord, FieldText};
use crate::types::{Chunk, ContentCategory, Metadata, SkipReason};
use insight_core::config::ChunkingSettings;

/// Split text into windows of at most `max_chunk_size` characters.
///
/// The text is trimmed first. A window that ends before the end of the text
/// is pulled back to its last space, provided that space lies after the
/// window start. The next window starts `chunk_overlap` characters before
/// the previous window's nominal end, and always at least one character
/// further than the previous start.
pub fn split_text(text: &str, max_chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    let max_chunk_size = max_chunk_size.max(1);
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    if len <= max_chunk_size {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < len {
        let mut end = start + max_chunk_size;

        if end < len {
            if let Some(space) = chars[start..end].iter().rposition(|c| *c == ' ') {
                let space = start + space;
                if space > start {
                    end = space;
                }
            }
        }

        let piece: String = chars[start..end.min(len)].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        // Unclamped `end`: after the final window this jumps past `len`.
        start = (start + 1).max(end.saturating_sub(chunk_overlap));
    }

    pieces
}

/// Chunks produced from a batch of records plus the fields that were skipped.
#[derive(Debug, Default)]
pub struct ChunkReport {
    pub chunks: Vec<Chunk>,
    pub skipped: Vec<SkipReason>,
}

impl ChunkReport {
    fn absorb(&mut self, other: ChunkReport) {
        self.chunks.extend(other.chunks);
        self.skipped.extend(other.skipped);
    }
}

/// Turns feedback records into chunks.
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    settings: ChunkingSettings,
}

impl Chunker {
    pub fn new(settings: ChunkingSettings) -> Self {
        Self { settings }
    }

    /// Chunk one record. Malformed fields are logged and contribute nothing.
    pub fn chunk(&self, record: &FeedbackRecord) -> Vec<Chunk> {
        let report = self.chunk_with_report(record);
        for reason in &report.skipped {
            tracing::warn!("Skipping field: {}", reason);
        }
        report.chunks
    }

    /// Chunk many records, collecting every skip reason.
    pub fn chunk_all(&self, records: &[FeedbackRecord]) -> ChunkReport {
        let mut report = ChunkReport::default();
        for record in records {
            report.absorb(self.chunk_with_report(record));
        }
        for reason in &report.skipped {
            tracing::warn!("Skipping field: {}", reason);
        }
        tracing::debug!(
            records = records.len(),
            chunks = report.chunks.len(),
            skipped = report.skipped.len(),
            "Chunked feedback records"
        );
        report
    }

    /// Chunk one record, returning skipped fields instead of logging them.
    pub fn chunk_with_report(&self, record: &FeedbackRecord) -> ChunkReport {
        let context = metadata_context(record);
        let id = &record.feedback_id;

        let mut units = vec![
            self.chunk_field(
                record,
                "feedback",
                &record.log.feedback,
                ContentCategory::Feedback,
                format!("{}_{}", id, ContentCategory::Feedback.id_segment()),
                &context,
            ),
            self.chunk_field(
                record,
                "challenges",
                &record.log.challenges,
                ContentCategory::Challenges,
                format!("{}_{}", id, ContentCategory::Challenges.id_segment()),
                &context,
            ),
        ];

        for (plan_index, plan) in record.course_plans.iter().enumerate() {
            let mut plan_context = context.clone();
            plan_context.insert("course_plan_id".to_string(), plan.course_plan_id.clone());

            units.push(self.chunk_field(
                record,
                "course_plan_details",
                &plan.details,
                ContentCategory::CoursePlan,
                format!(
                    "{}_{}_{}",
                    id,
                    ContentCategory::CoursePlan.id_segment(),
                    plan_index
                ),
                &plan_context,
            ));
        }

        let mut report = ChunkReport::default();
        for unit in units {
            match unit {
                Ok(chunks) => report.chunks.extend(chunks),
                Err(reason) => report.skipped.push(reason),
            }
        }
        report
    }

    fn chunk_field(
        &self,
        record: &FeedbackRecord,
        field: &str,
        text: &FieldText,
        category: ContentCategory,
        id_prefix: String,
        context: &Metadata,
    ) -> Result<Vec<Chunk>, SkipReason> {
        let text = match text {
            FieldText::Absent => return Ok(Vec::new()),
            FieldText::Malformed(found) => {
                return Err(SkipReason::MalformedField {
                    record_id: record.feedback_id.clone(),
                    field: field.to_string(),
                    found: *found,
                })
            }
            FieldText::Text(text) => text,
        };

        let pieces = split_text(
            text,
            self.settings.max_chunk_size,
            self.settings.chunk_overlap,
        );

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(i, piece)| Chunk {
                chunk_id: format!("{}_{}", id_prefix, i),
                text: piece,
                category,
                metadata: context.clone(),
                source_record_id: record.feedback_id.clone(),
            })
            .collect())
    }
}

/// Flatten a record's context into string metadata.
///
/// Log fields are always present (possibly empty); entity fields only when
/// the entity was found.
pub fn metadata_context(record: &FeedbackRecord) -> Metadata {
    let mut m = Metadata::new();
    let mut put = |key: &str, value: &str| {
        m.insert(key.to_string(), value.to_string());
    };

    let log = &record.log;
    put("feedback_date", &log.feedback_date);
    put("total_hours_spent", &log.total_hours_spent);
    put("loggedby", &log.logged_by);
    put("bctm_id", &log.bctm_id);

    if let Some(batch) = &record.batch {
        put("batch_id", &batch.batch_id);
        put("batch_type", &batch.batch_type);
        put("batch_status", &batch.status);
    }

    if let Some(centre) = &record.centre {
        put("centre_id", &centre.centre_id);
        put("centre_name", &centre.centre_name);
        put("district", &centre.district);
        put("state", &centre.state);
        put("village", &centre.village);
    }

    if let Some(course) = &record.course {
        put("course_id", &course.course_id);
        put("course_name", &course.course_name);
        put("course_description", &course.course_description);
    }

    if let Some(project) = &record.project {
        put("project_id", &project.project_id);
        put("project_name", &project.project_name);
        put("project_description", &project.project_description);
    }

    if let Some(trainer) = &record.trainer {
        put("user_id", &trainer.user_id);
        put("user_name", &trainer.name);
        put("user_role", &trainer.role);
    }

    if let Some(logger) = &record.logged_by {
        put("logged_by_user_id", &logger.user_id);
        put("logged_by_user_name", &logger.name);
        put("logged_by_user_role", &logger.role);
    }

    m
}
