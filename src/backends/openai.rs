//! OpenAI-compatible `/chat/completions` backend. Works against any server
//! speaking that dialect (OpenAI, Ollama, vLLM, LM Studio, ...).

use crate::api::GenerationBackend;
use crate::models::{FailureCause, GenerationRequest, GenerationResult};
use crate::transport::CLIENT;
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

const BLOCKING_ERROR_CODES: &[&str] = &["content_filter", "content_policy_violation"];

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatResponse {
    choices: Vec<Choice>,
    error: Option<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Choice {
    message: Option<AssistantMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AssistantMessage {
    content: Option<String>,
    refusal: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiError {
    code: Option<String>,
    message: String,
}

/// Turn an HTTP status and body into a [`GenerationResult`].
pub fn classify(backend_id: &str, status: u16, body: &str) -> GenerationResult {
    let backend_id = backend_id.to_string();
    let parsed: Option<ChatResponse> = serde_json::from_str(body).ok();

    // policy refusals arrive as 400s with a typed error code
    if let Some(err) = parsed.as_ref().and_then(|r| r.error.as_ref()) {
        if let Some(code) = err.code.as_deref().filter(|c| BLOCKING_ERROR_CODES.contains(c)) {
            let reason = if err.message.is_empty() {
                code.to_string()
            } else {
                format!("{code}: {}", err.message)
            };
            return GenerationResult::Blocked { backend_id, reason };
        }
    }

    if !(200..300).contains(&status) {
        return GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Status(status),
        };
    }

    let Some(choice) = parsed.and_then(|r| r.choices.into_iter().next()) else {
        return GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Transport("response had no choices".into()),
        };
    };

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return GenerationResult::Blocked {
            backend_id,
            reason: "content_filter".into(),
        };
    }

    let message = choice.message.unwrap_or_default();
    if let Some(refusal) = message.refusal.filter(|r| !r.trim().is_empty()) {
        return GenerationResult::Blocked {
            backend_id,
            reason: format!("refusal: {}", truncate_for_log(&refusal, 200)),
        };
    }

    match message.content.filter(|c| !c.trim().is_empty()) {
        Some(raw_text) => GenerationResult::Success { backend_id, raw_text },
        None => GenerationResult::Failure {
            backend_id,
            cause: FailureCause::Transport("response had no text".into()),
        },
    }
}

/// One chat model behind an OpenAI-compatible endpoint.
#[derive(Clone)]
pub struct OpenAiBackend {
    model: String,
    base_url: String,
    /// Local servers usually need none.
    api_key: Option<String>,
}

impl OpenAiBackend {
    pub fn new(model: &str, base_url: Option<&str>, api_key: Option<&str>) -> Self {
        Self {
            model: model.to_string(),
            base_url: base_url.unwrap_or(DEFAULT_BASE_URL).trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()).map(str::to_string),
        }
    }
}

impl fmt::Debug for OpenAiBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiBackend")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl GenerationBackend for OpenAiBackend {
    fn id(&self) -> &str {
        &self.model
    }

    #[instrument(level = "info", skip_all, fields(backend = %self.model))]
    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        let t0 = Instant::now();
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: request.prompt_text(),
            }],
            temperature: 0.7,
        };

        let mut req = CLIENT
            .post(format!("{}/chat/completions", self.base_url))
            .timeout(GENERATION_TIMEOUT)
            .json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let res = match req.send().await {
            Ok(res) => res,
            Err(e) => {
                warn!(elapsed_ms = t0.elapsed().as_millis() as u64, error = %e, "Chat request failed");
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
            "Chat response"
        );
        classify(&self.model, status, &text)
    }
}
