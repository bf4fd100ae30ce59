//! Client for the label-scan vision endpoint.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dosetrack_domain::{DoseTrackError, ScannedMedication};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::http::HttpClient;

use super::types::{
    Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig, LabelScanError,
    Part,
};

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

const SYSTEM_INSTRUCTION: &str = "You are an expert medical assistant. Analyze images of \
prescriptions or medication boxes. The image may contain ONE or SEVERAL distinct medications; \
identify them all. For EACH medication or treatment extract: 1. The medication or procedure \
name. 2. The dose or a short description (e.g. \"500mg\", \"Apply to wound\"). 3. The frequency \
in hours (e.g. every 8 hours yields 8). If unspecified, estimate the usual value or return 24. \
Return a JSON array with every item found.";

const USER_PROMPT: &str =
    "Analyze this image and extract the complete list of medications and their regimens.";

/// Configuration for [`LabelScanClient`].
#[derive(Debug, Clone)]
pub struct LabelScanConfig {
    pub api_key: String,
    pub endpoint: String,
    pub model: String,
}

impl LabelScanConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Vision-model client that turns a label photo into medication
/// candidates.
pub struct LabelScanClient {
    http_client: HttpClient,
    config: LabelScanConfig,
}

impl LabelScanClient {
    pub fn new(config: LabelScanConfig, http_client: HttpClient) -> Self {
        Self { http_client, config }
    }

    /// Scan a base64-encoded image. A data-URL header
    /// (`data:image/...;base64,`) is stripped if present.
    ///
    /// An empty or unparseable model answer yields zero candidates
    /// rather than an error; only transport and API failures are
    /// surfaced.
    pub async fn scan_image(
        &self,
        base64_image: &str,
    ) -> Result<Vec<ScannedMedication>, LabelScanError> {
        let image = strip_data_url_header(base64_image);
        if image.is_empty() {
            return Err(LabelScanError::InvalidSchema("empty image payload".to_string()));
        }
        if BASE64.decode(&image).is_err() {
            return Err(LabelScanError::InvalidSchema(
                "image payload is not valid base64".to_string(),
            ));
        }

        info!(image_chars = image.len(), "Scanning medication label");

        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part::image("image/jpeg", image), Part::text(USER_PROMPT)],
            }],
            system_instruction: Content { parts: vec![Part::text(SYSTEM_INSTRUCTION)] },
            generation_config: GenerationConfig {
                response_mime_type: "application/json".to_string(),
                response_schema: json!({
                    "type": "ARRAY",
                    "items": {
                        "type": "OBJECT",
                        "properties": {
                            "name": { "type": "STRING", "description": "Medication name" },
                            "description": { "type": "STRING", "description": "Dose or instructions" },
                            "frequencyHours": { "type": "NUMBER", "description": "Frequency in hours" }
                        },
                        "required": ["name", "frequencyHours"]
                    }
                }),
            },
        };

        let url = format!(
            "{}/{}:generateContent?key={}",
            self.config.endpoint, self.config.model, self.config.api_key
        );
        let builder = self
            .http_client
            .request(Method::POST, &url)
            .header("Content-Type", "application/json")
            .json(&request);

        let response = self.http_client.send(builder).await.map_err(|err| match err {
            DoseTrackError::Network(msg) => LabelScanError::Network(msg),
            other => LabelScanError::Network(other.to_string()),
        })?;

        let status = response.status();
        debug!(status = status.as_u16(), "Scan response received");

        if !status.is_success() {
            return Err(error_for_status(status.as_u16(), response).await);
        }

        let body: GenerateContentResponse = response.json().await.map_err(|err| {
            LabelScanError::InvalidSchema(format!("failed to parse response: {err}"))
        })?;

        let Some(text) = body.first_text() else {
            warn!("Scan response carried no text part");
            return Ok(Vec::new());
        };

        match serde_json::from_str::<Vec<ScannedMedication>>(text) {
            Ok(candidates) => {
                info!(count = candidates.len(), "Label scan complete");
                Ok(candidates)
            }
            Err(err) => {
                warn!(error = %err, "Model answer was not a candidate list");
                Ok(Vec::new())
            }
        }
    }
}

fn strip_data_url_header(image: &str) -> String {
    let trimmed = image.trim();
    if let Some(rest) = trimmed.strip_prefix("data:") {
        if let Some((header, data)) = rest.split_once(";base64,") {
            if header.starts_with("image/") {
                return data.to_string();
            }
        }
    }
    trimmed.to_string()
}

async fn error_for_status(status: u16, response: reqwest::Response) -> LabelScanError {
    let message = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
    match status {
        401 | 403 => LabelScanError::Authentication(status),
        429 => LabelScanError::RateLimit(60),
        _ => LabelScanError::Api { status, message },
    }
}
