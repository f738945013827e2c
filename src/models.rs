// src/models.rs
use crate::errors::ConciergeError;
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Image bytes as handed over by the device, before any decoding.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub data: Bytes,
    pub filename: Option<String>,
    pub content_type: Option<String>,
}

impl RawImage {
    pub fn from_bytes(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            filename: None,
            content_type: None,
        }
    }
}

/// A resized, re-encoded image carried around as a `data:` URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedImage {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

impl NormalizedImage {
    pub fn from_encoded(mime_type: &str, encoded: &[u8], width: u32, height: u32) -> Self {
        Self {
            data_url: format!(
                "data:{};base64,{}",
                mime_type,
                general_purpose::STANDARD.encode(encoded)
            ),
            width,
            height,
        }
    }

    pub fn mime_type(&self) -> &str {
        self.data_url
            .strip_prefix("data:")
            .and_then(|rest| rest.split(';').next())
            .unwrap_or("image/jpeg")
    }

    /// The base64 part after the comma.
    pub fn payload(&self) -> &str {
        self.data_url
            .split_once(',')
            .map(|(_, data)| data)
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosisMode {
    Wedding,
    Color,
}

impl DiagnosisMode {
    pub fn label(&self) -> &'static str {
        match self {
            DiagnosisMode::Wedding => "wedding dress",
            DiagnosisMode::Color => "color dress",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DressType {
    ALine,
    Princess,
    Mermaid,
    Empire,
    Slender,
}

impl DressType {
    pub fn label(&self) -> &'static str {
        match self {
            DressType::ALine => "A-line",
            DressType::Princess => "Princess line",
            DressType::Mermaid => "Mermaid line",
            DressType::Empire => "Empire",
            DressType::Slender => "Slender line",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    pub dress_type: DressType,
    pub category: DiagnosisMode,
    pub image: NormalizedImage,
    pub source: String,
    pub added_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Entry for a dress photo the user picked from their own device.
    pub fn user_selection(category: DiagnosisMode, image: NormalizedImage) -> Self {
        Self {
            id: Uuid::new_v4().simple().to_string(),
            title: "Selection".to_string(),
            dress_type: DressType::ALine,
            category,
            image,
            source: "User".to_string(),
            added_at: Utc::now(),
        }
    }
}

/// Everything one diagnosis call needs. Never stored.
#[derive(Debug, Clone, Copy)]
pub struct DiagnosisRequest<'a> {
    pub subject: &'a NormalizedImage,
    pub partner: Option<&'a NormalizedImage>,
    pub mode: DiagnosisMode,
    pub catalog: &'a [CatalogEntry],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisResult {
    pub recommended_dress: String,
    pub dress_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_match_id: Option<String>,
    pub reason: String,
    pub analysis_reasons: AnalysisReasons,
    pub face_reading: String,
    pub face_shape: String,
    pub personal_color: String,
    pub atmosphere_label: String,
    pub wedding_advice: String,
    pub styling_details: StylingDetails,
    pub concierge_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skin_tone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partner_compatibility: Option<String>,
    #[serde(
        default,
        deserialize_with = "partial_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub partner_diagnosis: Option<IndividualDiagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preparation_tasks: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wedding_scenario: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReasons {
    pub facial: String,
    pub skin: String,
    pub atmosphere: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StylingDetails {
    pub accessories: String,
    pub hairstyle: String,
    pub bouquet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndividualDiagnosis {
    pub face_shape: String,
    pub skin_tone: String,
    pub personal_color: String,
    pub atmosphere_label: String,
}

/// An incomplete partner block is dropped rather than failing the whole result.
fn partial_as_none<'de, D>(deserializer: D) -> Result<Option<IndividualDiagnosis>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|value| match serde_json::from_value(value) {
        Ok(partner) => Some(partner),
        Err(e) => {
            log::warn!("Ignoring incomplete partnerDiagnosis: {}", e);
            None
        }
    }))
}

impl DiagnosisResult {
    /// Validates the model's reply text into a typed result.
    pub fn from_reply(reply: &str) -> Result<Self, ConciergeError> {
        let body = strip_code_fence(reply);
        if body.is_empty() {
            return Err(ConciergeError::ResponseFormat(
                "Empty diagnosis reply".to_string(),
            ));
        }

        let value: serde_json::Value = serde_json::from_str(body)?;
        if !value.is_object() {
            return Err(ConciergeError::ResponseFormat(
                "Diagnosis reply is not a JSON object".to_string(),
            ));
        }

        serde_json::from_value(value).map_err(|e| {
            ConciergeError::ResponseFormat(format!("Diagnosis reply does not match schema: {}", e))
        })
    }

    /// Looks up `bestMatchId` in the catalog; a dangling or empty id yields `None`.
    pub fn matched_entry<'a>(&self, catalog: &'a [CatalogEntry]) -> Option<&'a CatalogEntry> {
        let id = self.best_match_id.as_deref().filter(|id| !id.is_empty())?;
        catalog.iter().find(|entry| entry.id == id)
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    /// Role name on the Gemini wire.
    pub fn wire_role(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "model",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<NormalizedImage>,
    pub sent_at: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>, image: Option<NormalizedImage>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
            image,
            sent_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
            image: None,
            sent_at: Utc::now(),
        }
    }
}
