//! Google Gemini `generateContent` backend and model discovery.

use crate::api::GenerationBackend;
use crate::error::TransportError;
use crate::models::{FailureCause, GenerationRequest, GenerationResult};
use crate::transport::{CLIENT, Transport};
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Long-form generation routinely outlives the shared client's timeout.
const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const BLOCKING_FINISH_REASONS: &[&str] = &["SAFETY", "PROHIBITED_CONTENT", "BLOCKLIST", "SPII"];

const HARM_CATEGORIES: &[&str] = &[
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct GenerateContentResponse {
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CandidateContent {
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Turn an HTTP status and body into a [`GenerationResult`].
pub fn classify(backend_id: &str, status: u16, body: &str) -> GenerationResult {
    let backend_id = backend_id.to_string();
    if !(200..300).contains(&status) {
        return GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Status(status),
        };
    }

    let response: GenerateContentResponse = match serde_json::from_str(body) {
        Ok(r) => r,
        Err(e) => {
            return GenerationResult::Failure {
                backend_id,
                cause: FailureCause::Transport(format!("undecodable response: {e}")),
            };
        }
    };

    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        return GenerationResult::Blocked { backend_id, reason };
    }

    let Some(candidate) = response.candidates.into_iter().next() else {
        return GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Transport("response had no candidates".into()),
        };
    };

    if let Some(reason) = candidate
        .finish_reason
        .filter(|r| BLOCKING_FINISH_REASONS.contains(&r.as_str()))
    {
        return GenerationResult::Blocked { backend_id, reason };
    }

    let raw_text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();
    if raw_text.trim().is_empty() {
        return GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Transport("response had no text".into()),
        };
    }

    GenerationResult::Success { backend_id, raw_text }
}

/// One Gemini model.
#[derive(Clone)]
pub struct GeminiBackend {
    model: String,
    api_key: String,
    endpoint: String,
    /// Send `BLOCK_NONE` for every harm category.
    unrestricted: bool,
}

impl GeminiBackend {
    pub fn new(model: &str, api_key: &str, endpoint: Option<&str>, unrestricted: bool) -> Self {
        Self {
            model: model.trim_start_matches("models/").to_string(),
            api_key: api_key.to_string(),
            endpoint: endpoint.unwrap_or(DEFAULT_ENDPOINT).trim_end_matches('/').to_string(),
            unrestricted,
        }
    }

    fn safety_settings(&self) -> Vec<SafetySetting> {
        if !self.unrestricted {
            return Vec::new();
        }
        HARM_CATEGORIES
            .iter()
            .map(|&category| SafetySetting {
                category,
                threshold: "BLOCK_NONE",
            })
            .collect()
    }
}

impl fmt::Debug for GeminiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiBackend")
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("unrestricted", &self.unrestricted)
            .finish()
    }
}

impl GenerationBackend for GeminiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    #[instrument(level = "info", skip_all, fields(backend = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let t0 = Instant::now();
        let url = format!("{}/models/{}:generateContent", self.endpoint, self.model);
        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt_text(),
                }],
            }],
            safety_settings: self.safety_settings(),
        };

        let res = CLIENT
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(GENERATION_TIMEOUT)
            .json(&body)
            .send()
            .await;
        let res = match res {
            Ok(res) => res,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Gemini request failed");
                return GenerationResult::Failure {
                    backend_id: self.model.clone(),
                    cause: FailureCause::Transport(e.to_string()),
                };
            }
        };

        let status = res.status().as_u16();
        let text = match res.text().await {
            Ok(text) => text,
            Err(e) => {
                return GenerationResult::Failure {
                    backend_id: self.model.clone(),
                    cause: FailureCause::Transport(e.to_string()),
                };
            }
        };
        debug!(
            status,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            preview = %truncate_for_log(&text, 300),
            "Gemini response"
        );
        classify(&self.model, status, &text)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModelList {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ModelInfo {
    name: String,
    supported_generation_methods: Vec<String>,
}

/// Model ids from a `models.list` body that support `generateContent` and
/// contain `pattern`, in provider order.
pub fn matching_models(body: &[u8], pattern: &str, limit: usize) -> Result<Vec<String>, serde_json::Error> {
    let list: ModelList = serde_json::from_slice(body)?;
    let pattern = pattern.to_ascii_lowercase();
    Ok(list
        .models
        .into_iter()
        .filter(|m| m.supported_generation_methods.iter().any(|s| s == "generateContent"))
        .map(|m| m.name.trim_start_matches("models/").to_string())
        .filter(|id| id.to_ascii_lowercase().contains(&pattern))
        .take(limit)
        .collect())
}

/// Ask the provider which models are currently available.
#[instrument(level = "info", skip(transport, api_key))]
pub async fn discover_models<T: Transport>(
    transport: &T,
    endpoint: &str,
    api_key: &str,
    pattern: &str,
    limit: usize,
) -> Result<Vec<String>, TransportError> {
    let url = format!("{}/models?pageSize=1000", endpoint.trim_end_matches('/'));
    let body = transport.get(&url, &[("x-goog-api-key", api_key)]).await?;
    match matching_models(&body, pattern, limit) {
        Ok(ids) => {
            info!(found = ids.len(), ?ids, "Discovered Gemini models");
            Ok(ids)
        }
        Err(e) => {
            warn!(error = %e, "Model list was not understood");
            Ok(Vec::new())
        }
    }
}
