//! Wire types for the generateContent endpoint.

use dosetrack_domain::DoseTrackError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from the label-scan service.
#[derive(Debug, Error)]
pub enum LabelScanError {
    #[error("Scan service not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed ({0})")]
    Authentication(u16),

    #[error("Rate limited, retry after {0}s")]
    RateLimit(u64),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    InvalidSchema(String),
}

impl From<LabelScanError> for DoseTrackError {
    fn from(err: LabelScanError) -> Self {
        match err {
            LabelScanError::NotConfigured(msg) => DoseTrackError::Config(msg),
            LabelScanError::Network(msg) => DoseTrackError::Network(msg),
            LabelScanError::Authentication(status) => {
                DoseTrackError::Network(format!("scan authentication failed ({status})"))
            }
            LabelScanError::RateLimit(secs) => {
                DoseTrackError::Network(format!("scan rate limited, retry after {secs}s"))
            }
            LabelScanError::Api { status, message } => {
                DoseTrackError::Network(format!("scan API error {status}: {message}"))
            }
            LabelScanError::InvalidSchema(msg) => DoseTrackError::Internal(msg),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    #[serde(rename = "systemInstruction")]
    pub system_instruction: Content,
    #[serde(rename = "generationConfig")]
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Content {
    pub parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "inline_data", skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(value: impl Into<String>) -> Self {
        Self { text: Some(value.into()), inline_data: None }
    }

    pub fn image(mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData { mime_type: mime_type.into(), data: data.into() }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InlineData {
    #[serde(rename = "mime_type")]
    pub mime_type: String,
    pub data: String,
}

#[derive(Debug, Serialize)]
pub struct GenerationConfig {
    #[serde(rename = "response_mime_type")]
    pub response_mime_type: String,
    #[serde(rename = "response_schema")]
    pub response_schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
pub struct Candidate {
    pub content: Option<Content>,
}

impl GenerateContentResponse {
    /// The text of the first candidate part, if the model produced
    /// any.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()
            .and_then(|candidate| candidate.content.as_ref())
            .and_then(|content| content.parts.first())
            .and_then(|part| part.text.as_deref())
    }
}
