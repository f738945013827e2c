// src/services/concierge_service.rs
use crate::errors::ConciergeError;
use crate::models::*;
use crate::services::gemini::{Content, GenerateRequest, GenerativeModel, Part};
use crate::services::prompts;
use log::{info, warn};
use std::sync::Arc;
use std::time::Instant;

pub struct ConciergeService {
    model: Arc<dyn GenerativeModel>,
}

impl ConciergeService {
    pub fn new(model: Arc<dyn GenerativeModel>) -> Self {
        Self { model }
    }

    /// Runs one styling diagnosis. `catalog` must already be filtered to `mode`.
    pub async fn diagnose(
        &self,
        subject: &NormalizedImage,
        mode: DiagnosisMode,
        catalog: &[CatalogEntry],
        partner: Option<&NormalizedImage>,
    ) -> Result<DiagnosisResult, ConciergeError> {
        let start = Instant::now();
        let request = DiagnosisRequest {
            subject,
            partner,
            mode,
            catalog,
        };

        info!(
            "Requesting {:?} diagnosis from {} (partner: {}, catalog: {})",
            mode,
            self.model.model_name(),
            partner.is_some(),
            catalog.len()
        );

        let reply = self.model.generate(build_diagnosis_request(&request)).await?;
        let result = DiagnosisResult::from_reply(&reply).inspect_err(|e| {
            warn!("Discarding diagnosis reply: {}", e);
        })?;

        if let Some(id) = result.best_match_id.as_deref().filter(|id| !id.is_empty()) {
            if !catalog.iter().any(|entry| entry.id == id) {
                warn!("Diagnosis picked {} which is not in the catalog sent", id);
            }
        }

        info!("Diagnosis finished in {}ms", start.elapsed().as_millis());
        Ok(result)
    }

    /// Sends one chat turn with the full prior history. Returns "" when the
    /// model had nothing to say.
    pub async fn converse(
        &self,
        history: &[ChatMessage],
        message: &str,
        attachment: Option<&NormalizedImage>,
    ) -> Result<String, ConciergeError> {
        info!(
            "Chat turn with {} prior messages (attachment: {})",
            history.len(),
            attachment.is_some()
        );

        let reply = self
            .model
            .generate(build_chat_request(history, message, attachment))
            .await?;

        if reply.is_empty() {
            warn!("Chat model returned no text");
        }
        Ok(reply)
    }
}

pub fn build_diagnosis_request(request: &DiagnosisRequest<'_>) -> GenerateRequest {
    let mut parts = vec![
        Part::text(prompts::DIAGNOSIS_PERSONA.trim()),
        Part::text(prompts::SUBJECT_LABEL),
        Part::image(request.subject),
    ];

    if let Some(partner) = request.partner {
        parts.push(Part::text(prompts::PARTNER_LABEL));
        parts.push(Part::image(partner));
    }

    parts.push(Part::text(prompts::CATALOG_LABEL));
    for entry in request.catalog {
        parts.push(Part::text(format!("DRESS_ID: {}", entry.id)));
        parts.push(Part::image(&entry.image));
    }

    parts.push(Part::text(prompts::diagnosis_task(
        request.mode,
        request.partner.is_some(),
    )));

    GenerateRequest {
        system_instruction: None,
        contents: vec![Content {
            role: "user".to_string(),
            parts,
        }],
        response_schema: Some(prompts::diagnosis_response_schema()),
    }
}

pub fn build_chat_request(
    history: &[ChatMessage],
    message: &str,
    attachment: Option<&NormalizedImage>,
) -> GenerateRequest {
    let mut contents: Vec<Content> = history
        .iter()
        .map(|turn| turn_content(turn.role, &turn.text, turn.image.as_ref()))
        .collect();
    contents.push(turn_content(ChatRole::User, message, attachment));

    GenerateRequest {
        system_instruction: Some(prompts::CHAT_PERSONA.trim().to_string()),
        contents,
        response_schema: None,
    }
}

/// A user turn that carried only a photo is always sent with the fixed photo
/// prompt, both live and when replayed as history.
fn turn_content(role: ChatRole, text: &str, image: Option<&NormalizedImage>) -> Content {
    let text = if role == ChatRole::User && image.is_some() && text.trim().is_empty() {
        prompts::IMAGE_ONLY_PROMPT
    } else {
        text
    };
    let mut parts = vec![Part::text(text)];
    if let Some(image) = image {
        parts.push(Part::image(image));
    }
    Content {
        role: role.wire_role().to_string(),
        parts,
    }
}
