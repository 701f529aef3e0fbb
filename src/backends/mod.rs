//! Concrete generation backends and the priority list built from config.
//!
//! The list is the configured `backends` in order, followed by any ids the
//! provider reports through discovery that are not already listed. Each entry
//! is wrapped in a [`RetryBackend`] so rate limits are absorbed per backend.

pub mod gemini;
pub mod openai;

use crate::api::{GenerationBackend, RetryBackend};
use crate::config::Config;
use crate::models::{GenerationRequest, GenerationResult};
use crate::transport::Transport;
use gemini::GeminiBackend;
use openai::OpenAiBackend;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// First delay of the per-backend retry schedule.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum BackendKind {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

/// One entry of the configured priority list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackendSpec {
    /// Model identifier as the provider knows it.
    pub id: String,
    pub kind: BackendKind,
    /// Endpoint override; the provider's public API when absent.
    #[serde(default)]
    pub base_url: Option<String>,
}

impl FromStr for BackendSpec {
    type Err = String;

    /// `gemini:<id>`, `openai:<id>`, `openai:<id>@<base_url>`, or a bare
    /// `<id>` meaning Gemini.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, rest) = match s.split_once(':') {
            Some(("gemini", rest)) => (BackendKind::Gemini, rest),
            Some(("openai", rest)) => (BackendKind::OpenAi, rest),
            _ => (BackendKind::Gemini, s),
        };
        let (id, base_url) = match rest.split_once('@') {
            Some((id, url)) => (id, Some(url.to_string())),
            None => (rest, None),
        };
        if id.is_empty() {
            return Err(format!("backend '{s}' has no model id"));
        }
        Ok(BackendSpec {
            id: id.to_string(),
            kind,
            base_url,
        })
    }
}

/// Provider credentials, read once by the CLI.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub gemini: Option<String>,
    pub openai: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("gemini", &self.gemini.as_ref().map(|_| "<redacted>"))
            .field("openai", &self.openai.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Any backend the config can name.
#[derive(Debug, Clone)]
pub enum HttpBackend {
    Gemini(GeminiBackend),
    OpenAi(OpenAiBackend),
}

impl HttpBackend {
    /// `None` when the entry needs a credential that is missing. OpenAI-compatible
    /// servers may run without a key, Gemini never does.
    pub fn from_spec(spec: &BackendSpec, keys: &ApiKeys, unrestricted: bool) -> Option<Self> {
        match spec.kind {
            BackendKind::Gemini => {
                let key = keys.gemini.as_deref().filter(|k| !k.is_empty())?;
                Some(HttpBackend::Gemini(GeminiBackend::new(
                    &spec.id,
                    key,
                    spec.base_url.as_deref(),
                    unrestricted,
                )))
            }
            BackendKind::OpenAi => Some(HttpBackend::OpenAi(OpenAiBackend::new(
                &spec.id,
                spec.base_url.as_deref(),
                keys.openai.as_deref(),
            ))),
        }
    }
}

impl GenerationBackend for HttpBackend {
    fn id(&self) -> &str {
        match self {
            HttpBackend::Gemini(b) => b.id(),
            HttpBackend::OpenAi(b) => b.id(),
        }
    }

    async fn generate(&self, request: &GenerationRequest) -> GenerationResult {
        match self {
            HttpBackend::Gemini(b) => b.generate(request).await,
            HttpBackend::OpenAi(b) => b.generate(request).await,
        }
    }
}

/// Append `discovered` Gemini ids not already present in `specs`.
pub fn merge_discovered(mut specs: Vec<BackendSpec>, discovered: Vec<String>) -> Vec<BackendSpec> {
    for id in discovered {
        if specs.iter().any(|s| s.kind == BackendKind::Gemini && s.id == id) {
            continue;
        }
        specs.push(BackendSpec {
            id,
            kind: BackendKind::Gemini,
            base_url: None,
        });
    }
    specs
}

/// The full priority list for a run.
///
/// Entries whose credentials are missing are logged and left out, so an empty
/// result means nothing can be asked and the run should not start.
#[instrument(level = "info", skip_all)]
pub async fn build_backends<T: Transport>(
    config: &Config,
    keys: &ApiKeys,
    transport: &T,
) -> Vec<RetryBackend<HttpBackend>> {
    let mut specs = config.backends.clone();

    if let Some(discovery) = &config.discovery {
        match keys.gemini.as_deref() {
            Some(key) => {
                match gemini::discover_models(transport, gemini::DEFAULT_ENDPOINT, key, &discovery.pattern, discovery.limit)
                    .await
                {
                    Ok(ids) => specs = merge_discovered(specs, ids),
                    Err(e) => warn!(error = %e, "Model discovery failed; using configured backends only"),
                }
            }
            None => warn!("Discovery configured without GEMINI_API_KEY; skipped"),
        }
    }

    let ids: Vec<&str> = specs.iter().map(|s| s.id.as_str()).collect();
    info!(count = specs.len(), ?ids, "Backend priority list");

    specs
        .iter()
        .filter_map(|spec| match HttpBackend::from_spec(spec, keys, config.unrestricted_safety) {
            Some(backend) => Some(RetryBackend::new(backend, config.retries_per_backend, RETRY_BASE_DELAY)),
            None => {
                warn!(backend = %spec.id, "No GEMINI_API_KEY; backend skipped");
                None
            }
        })
        .collect()
}
