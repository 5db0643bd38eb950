//! Result aggregation: threshold, group by record, rank.

use crate::types::{
    ContentBucket, GroupedResult, RetrievalHit, ScoredText, CONTENT_TYPE_KEY, FEEDBACK_ID_KEY,
    UNKNOWN,
};

/// Hits used when none clears the threshold.
pub const FALLBACK_HITS: usize = 3;

/// Hits with `similarity_score >= threshold`, or the first
/// [`FALLBACK_HITS`] raw hits in rank order when none qualifies.
pub fn relevant_hits(hits: &[RetrievalHit], threshold: f32) -> Vec<RetrievalHit> {
    let relevant: Vec<RetrievalHit> = hits
        .iter()
        .filter(|hit| hit.similarity_score >= threshold)
        .cloned()
        .collect();

    if relevant.is_empty() && !hits.is_empty() {
        tracing::warn!(
            threshold,
            hits = hits.len(),
            "No hit above the similarity threshold, using the top {}",
            FALLBACK_HITS
        );
        return hits.iter().take(FALLBACK_HITS).cloned().collect();
    }

    relevant
}

/// Group relevant hits per source record, strongest group first.
///
/// Groups keep the metadata of their first hit; content buckets and their
/// items keep encounter order. Groups with equal best scores keep the order
/// in which they were first seen.
pub fn process(hits: &[RetrievalHit], threshold: f32) -> Vec<GroupedResult> {
    group(&relevant_hits(hits, threshold))
}

/// Group hits without thresholding.
pub fn group(hits: &[RetrievalHit]) -> Vec<GroupedResult> {
    let mut groups: Vec<GroupedResult> = Vec::new();

    for hit in hits {
        let feedback_id = hit.field(FEEDBACK_ID_KEY).unwrap_or(UNKNOWN).to_string();
        let content_type = hit.field(CONTENT_TYPE_KEY).unwrap_or(UNKNOWN).to_string();

        let pos = match groups.iter().position(|g| g.feedback_id == feedback_id) {
            Some(pos) => pos,
            None => {
                groups.push(GroupedResult {
                    feedback_id,
                    metadata: hit.metadata.clone(),
                    content_types: Vec::new(),
                    max_similarity: hit.similarity_score,
                    total_chunks: 0,
                });
                groups.len() - 1
            }
        };
        let group = &mut groups[pos];

        let item = ScoredText {
            text: hit.text.clone(),
            similarity_score: hit.similarity_score,
        };
        match group
            .content_types
            .iter_mut()
            .find(|bucket| bucket.content_type == content_type)
        {
            Some(bucket) => bucket.items.push(item),
            None => group.content_types.push(ContentBucket {
                content_type,
                items: vec![item],
            }),
        }

        group.max_similarity = group.max_similarity.max(hit.similarity_score);
        group.total_chunks += 1;
    }

    // Vec::sort_by is stable.
    groups.sort_by(|a, b| b.max_similarity.total_cmp(&a.max_similarity));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Metadata;

    fn hit(id: &str, feedback_id: &str, content_type: &str, similarity: f32) -> RetrievalHit {
        let mut metadata = Metadata::new();
        if !feedback_id.is_empty() {
            metadata.insert(FEEDBACK_ID_KEY.into(), feedback_id.into());
        }
        if !content_type.is_empty() {
            metadata.insert(CONTENT_TYPE_KEY.into(), content_type.into());
        }
        RetrievalHit::new(id, format!("text of {}", id), metadata, 1.0 - similarity)
    }

    #[test]
    fn test_threshold_filters_hits() {
        let hits = vec![
            hit("a", "1", "feedback", 0.9),
            hit("b", "1", "challenges", 0.5),
            hit("c", "2", "feedback", 0.75),
        ];

        let relevant = relevant_hits(&hits, 0.7);
        let ids: Vec<&str> = relevant.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
    }

    #[test]
    fn test_fallback_uses_first_three_raw_hits() {
        let hits = vec![
            hit("a", "1", "feedback", 0.5),
            hit("b", "2", "feedback", 0.4),
            hit("c", "3", "feedback", 0.3),
            hit("d", "4", "feedback", 0.2),
            hit("e", "5", "feedback", 0.1),
        ];

        let groups = process(&hits, 0.7);
        let ids: Vec<&str> = groups.iter().map(|g| g.feedback_id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(groups.iter().map(|g| g.total_chunks).sum::<usize>(), 3);
    }

    #[test]
    fn test_fallback_with_fewer_hits() {
        let hits = vec![hit("a", "1", "feedback", 0.1)];
        assert_eq!(relevant_hits(&hits, 0.9).len(), 1);
        assert!(relevant_hits(&[], 0.9).is_empty());
        assert!(process(&[], 0.9).is_empty());
    }

    #[test]
    fn test_grouping_and_buckets() {
        let hits = vec![
            hit("a", "1", "challenges", 0.8),
            hit("b", "2", "feedback", 0.95),
            hit("c", "1", "feedback", 0.85),
            hit("d", "1", "challenges", 0.9),
        ];

        let groups = process(&hits, 0.7);
        assert_eq!(groups.len(), 2);

        assert_eq!(groups[0].feedback_id, "2");
        let record = &groups[1];
        assert_eq!(record.feedback_id, "1");
        assert_eq!(record.total_chunks, 3);
        assert!((record.max_similarity - 0.9).abs() < 1e-6);
        assert_eq!(record.content_type_names(), vec!["challenges", "feedback"]);

        let challenges = record.bucket("challenges").unwrap();
        let texts: Vec<&str> = challenges.items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["text of a", "text of d"]);
    }

    #[test]
    fn test_missing_metadata_groups_as_unknown() {
        let hits = vec![hit("a", "", "", 0.8), hit("b", "", "feedback", 0.75)];
        let groups = process(&hits, 0.7);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].feedback_id, UNKNOWN);
        assert_eq!(groups[0].content_type_names(), vec![UNKNOWN, "feedback"]);
    }

    #[test]
    fn test_ties_keep_first_seen_order() {
        let hits = vec![
            hit("a", "7", "feedback", 0.8),
            hit("b", "3", "feedback", 0.8),
            hit("c", "5", "feedback", 0.9),
        ];

        let groups = process(&hits, 0.7);
        let ids: Vec<&str> = groups.iter().map(|g| g.feedback_id.as_str()).collect();
        assert_eq!(ids, vec!["5", "7", "3"]);
    }

    #[test]
    fn test_group_metadata_from_first_hit() {
        let mut first = hit("a", "1", "feedback", 0.8);
        first.metadata.insert("centre_name".into(), "Mandapam".into());
        let mut second = hit("b", "1", "challenges", 0.9);
        second.metadata.insert("centre_name".into(), "Elsewhere".into());

        let groups = process(&[first, second], 0.7);
        assert_eq!(groups[0].field("centre_name"), Some("Mandapam"));
    }
}
