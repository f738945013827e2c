// src/services/gemini.rs
use crate::config::Config;
use crate::errors::ConciergeError;
use crate::models::NormalizedImage;
use async_trait::async_trait;
use log::{error, info};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{Value, json};
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn image(image: &NormalizedImage) -> Self {
        Part::InlineData {
            inline_data: InlineData {
                mime_type: image.mime_type().to_string(),
                data: image.payload().to_string(),
            },
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Part::Text { text } => Some(text),
            Part::InlineData { .. } => None,
        }
    }

    pub fn is_image(&self) -> bool {
        matches!(self, Part::InlineData { .. })
    }
}

/// One `generateContent` call, independent of transport.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub system_instruction: Option<String>,
    pub contents: Vec<Content>,
    pub response_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn to_body(&self) -> Value {
        let mut body = json!({ "contents": self.contents });

        if let Some(instruction) = &self.system_instruction {
            body["systemInstruction"] = json!({ "parts": [{ "text": instruction }] });
        }
        if let Some(schema) = &self.response_schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema
            });
        }

        body
    }
}

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Sends one request and returns the reply text, or an empty string when
    /// the service produced none.
    async fn generate(&self, request: GenerateRequest) -> Result<String, ConciergeError>;

    fn model_name(&self) -> &str;
}

pub struct GeminiClient {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, ConciergeError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ConciergeError::Unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            client,
        })
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim();
        let model_path = if model.starts_with("models/") {
            model.to_string()
        } else {
            format!("models/{}", model)
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, request: GenerateRequest) -> Result<String, ConciergeError> {
        let start = Instant::now();

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request.to_body())
            .send()
            .await
            .map_err(|e| {
                error!("Gemini request to {} failed: {}", self.model, e);
                ConciergeError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = classify_failure(status, &body);
            error!("Gemini {} returned {}: {}", self.model, status, err);
            return Err(err);
        }

        let payload: Value = response.json().await.map_err(|e| {
            ConciergeError::ResponseFormat(format!("Failed to parse Gemini response: {}", e))
        })?;

        let text = reply_text(&payload);
        info!(
            "Gemini {} replied in {}ms ({} chars)",
            self.model,
            start.elapsed().as_millis(),
            text.len()
        );

        Ok(text)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

/// Joins the text parts of the first candidate. Thought parts are skipped.
pub fn reply_text(payload: &Value) -> String {
    payload["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter(|part| !part["thought"].as_bool().unwrap_or(false))
                .filter_map(|part| part["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Maps a non-success HTTP reply onto the error taxonomy.
pub fn classify_failure(status: StatusCode, body: &str) -> ConciergeError {
    let lowered = body.to_ascii_lowercase();
    let detail = format!("{}: {}", status, body.chars().take(512).collect::<String>());

    if status == StatusCode::TOO_MANY_REQUESTS
        || lowered.contains("resource_exhausted")
        || lowered.contains("quota")
    {
        ConciergeError::QuotaExceeded(detail)
    } else if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || lowered.contains("api_key_invalid")
        || lowered.contains("api key not valid")
    {
        ConciergeError::Auth(detail)
    } else if matches!(
        status,
        StatusCode::REQUEST_TIMEOUT
            | StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    ) {
        ConciergeError::Network(detail)
    } else {
        ConciergeError::Unknown(detail)
    }
}
