// src/services/testing.rs
use crate::errors::ConciergeError;
use crate::models::NormalizedImage;
use crate::services::gemini::{GenerateRequest, GenerativeModel};
use async_trait::async_trait;
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;

/// In-memory model that replays canned replies and records every request.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, ConciergeError>>>,
    requests: Mutex<Vec<GenerateRequest>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Result<String, ConciergeError>>) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    async fn generate(&self, request: GenerateRequest) -> Result<String, ConciergeError> {
        self.requests.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ConciergeError::Unknown("no scripted reply left".into())))
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

pub fn sample_image() -> NormalizedImage {
    NormalizedImage::from_encoded("image/jpeg", &[0xFF, 0xD8, 0xFF, 0xE0], 8, 6)
}

pub fn diagnosis_reply() -> serde_json::Value {
    json!({
        "recommendedDress": "Timeless lace with a soft train",
        "dressLine": "A-line",
        "bestMatchId": "dress-1",
        "reason": "Frames a balanced oval face",
        "analysisReasons": {
            "facial": "oval",
            "skin": "clear warm tone",
            "atmosphere": "graceful"
        },
        "faceReading": "Cooperative and warm",
        "faceShape": "oval",
        "personalColor": "spring",
        "atmosphereLabel": "graceful",
        "weddingAdvice": "Decide the big items together first",
        "stylingDetails": {
            "accessories": "pearl drops",
            "hairstyle": "loose updo",
            "bouquet": "garden roses"
        },
        "conciergeMessage": "We look forward to seeing you in Kobe"
    })
}
