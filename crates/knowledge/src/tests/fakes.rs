//! Test doubles for the RAG service.

use crate::embeddings::providers::HashingProvider;
use crate::embeddings::{EmbeddingGateway, EmbeddingProvider};
use crate::memory_index::MemoryIndex;
use crate::rag::{FeedbackRag, RagOptions};
use crate::records::{JsonRecordStore, RecordStore};
use crate::vector_index::VectorIndex;
use insight_core::config::{GeneratorSettings, RetrievalSettings};
use insight_core::{AppError, AppResult, RetryPolicy};
use insight_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DIMS: usize = 64;

pub const SCRIPTED_ANSWER: &str = "Rough sea and missing boats delayed the Mandapam sessions.";

/// Two usable feedback logs, a deleted one and a corrupted one.
pub fn export() -> Value {
    json!({
        "TrainersFeedbackLog": [
            null,
            {
                "feedback": "Farmers learned rope planting of seaweed quickly and attendance was high.",
                "challenges": "Rough sea delayed two sessions and boats were unavailable.",
                "feedback_date": "22-05-2025",
                "Total_hours_Spent": 6,
                "loggedby": "u2",
                "bctm_id": "bc1",
                "course_plan_id": ["cp1"]
            },
            {
                "feedback": "Tailoring students completed the stitching module.",
                "challenges": "Power cuts stopped the sewing machines.",
                "feedback_date": "03-06-2025",
                "Total_hours_Spent": "4",
                "loggedby": "u2",
                "bctm_id": "bc2"
            },
            "corrupted"
        ],
        "BatchCourse": {
            "bc1": {"batch_id": "B-12", "course_id": "c1", "project_id": "p1", "user_id": "u1"},
            "bc2": {"batch_id": "B-20", "course_id": "c2", "project_id": "p2", "user_id": "u1"}
        },
        "Batch": {
            "B-12": {"batch_type": "Residential", "status": "active", "centre_id": "ce1"},
            "B-20": {"batch_type": "Day", "status": "active", "centre_id": "ce2"}
        },
        "Centre": {
            "ce1": {"centre_name": "Mandapam", "district": "Ramanathapuram", "state": "Tamil Nadu"},
            "ce2": {"centre_name": "Madurai", "district": "Madurai", "state": "Tamil Nadu"}
        },
        "Course": {
            "c1": {"course_name": "Seaweed Farming"},
            "c2": {"course_name": "Basic Tailoring"}
        },
        "Project": {
            "p1": {"project_name": "Seaweed Cultivation"},
            "p2": {"project_name": "Tailoring"}
        },
        "User": {
            "u1": {"full_name": "Meena R", "utype": "trainer"},
            "u2": {"name": "Ravi", "role": "coordinator"}
        },
        "CoursePlan": {
            "cp1": {"course_plan_details": "Week 1: site survey. Week 2: rope preparation."}
        }
    })
}

pub fn store() -> Arc<dyn RecordStore> {
    Arc::new(JsonRecordStore::from_value("fixture", &export()).unwrap())
}

pub fn empty_store() -> Arc<dyn RecordStore> {
    Arc::new(JsonRecordStore::empty("empty"))
}

pub fn hashing_gateway() -> EmbeddingGateway {
    EmbeddingGateway::new(
        Arc::new(HashingProvider::new(DIMS)),
        RetryPolicy::immediate(1),
        Duration::ZERO,
    )
}

pub fn broken_gateway() -> EmbeddingGateway {
    EmbeddingGateway::new(
        Arc::new(BrokenProvider),
        RetryPolicy::immediate(2),
        Duration::ZERO,
    )
}

pub fn options(auto_initialize: bool) -> RagOptions {
    RagOptions {
        retrieval: RetrievalSettings {
            top_k: 5,
            similarity_threshold: 0.7,
            auto_initialize,
        },
        generator: GeneratorSettings {
            retry: RetryPolicy::immediate(3),
            ..GeneratorSettings::default()
        },
        ..RagOptions::default()
    }
}

pub fn service(
    store: Arc<dyn RecordStore>,
    gateway: EmbeddingGateway,
    index: Arc<dyn VectorIndex>,
    llm: Arc<ScriptedLlm>,
    options: RagOptions,
) -> FeedbackRag {
    FeedbackRag::new(store, gateway, index, llm, options).unwrap()
}

/// Service over the fixture export with an in-memory index.
pub fn fixture_service(llm: Arc<ScriptedLlm>, auto_initialize: bool) -> FeedbackRag {
    service(
        store(),
        hashing_gateway(),
        Arc::new(MemoryIndex::new(DIMS)),
        llm,
        options(auto_initialize),
    )
}

/// Embedding backend that rejects every request.
#[derive(Debug)]
pub struct BrokenProvider;

#[async_trait::async_trait]
impl EmbeddingProvider for BrokenProvider {
    fn provider_name(&self) -> &str {
        "broken"
    }

    fn model_name(&self) -> &str {
        "broken-v0"
    }

    fn dimensions(&self) -> usize {
        DIMS
    }

    async fn embed_once(&self, _text: &str) -> AppResult<Vec<f32>> {
        Err(AppError::Status {
            service: "embedding".to_string(),
            status: 400,
            message: "bad input".to_string(),
        })
    }
}

/// Generator that plays back scripted outcomes, then answers
/// [`SCRIPTED_ANSWER`].
pub struct ScriptedLlm {
    replies: Mutex<VecDeque<AppResult<LlmResponse>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedLlm {
    pub fn answering() -> Arc<Self> {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<AppResult<LlmResponse>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<LlmRequest> {
        self.requests.lock().unwrap().clone()
    }
}

pub fn reply(content: &str) -> LlmResponse {
    LlmResponse {
        content: content.to_string(),
        model: "scripted".to_string(),
        usage: LlmUsage::new(120, 30),
        done: true,
    }
}

/// What the chat-completions client returns for a reply without `choices`.
pub fn empty_reply() -> LlmResponse {
    LlmResponse {
        content: String::new(),
        model: "scripted".to_string(),
        usage: LlmUsage::default(),
        done: false,
    }
}

#[async_trait::async_trait]
impl LlmClient for ScriptedLlm {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(reply(SCRIPTED_ANSWER)))
    }
}
