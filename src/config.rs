//! Run configuration.
//!
//! A [`Config`] is built once in `main` from an optional YAML file plus CLI
//! overrides and then passed by reference into every stage. Every field has a
//! default, so a partial file (or none at all) is valid.
//!
//! ```yaml
//! feeds:
//!   - https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/section/internacional/portada
//! protocol: extended
//! image_strategy: synthesis
//! backends:
//!   - id: gemini-2.0-flash
//!     kind: gemini
//!   - id: llama3.1
//!     kind: openai
//!     base_url: http://localhost:11434/v1
//! discovery:
//!   pattern: flash
//! ```

use crate::backends::{BackendKind, BackendSpec};
use crate::images::ImageStrategy;
use crate::protocol::ProtocolVersion;
use serde::Deserialize;
use std::error::Error;
use tokio::fs;
use tracing::{info, instrument};

/// Everything a run needs that is not a secret.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Feed URLs to pick a story from.
    pub feeds: Vec<String>,
    /// Entries read from the head of each feed.
    pub max_entries_per_feed: usize,
    /// Minimum characters in the summary (or title) for a story to qualify.
    pub min_summary_length: usize,
    pub protocol: ProtocolVersion,
    pub image_strategy: ImageStrategy,
    /// Generation backends in priority order.
    pub backends: Vec<BackendSpec>,
    /// Optional provider-side discovery of extra backends.
    pub discovery: Option<DiscoveryConfig>,
    /// Extra attempts on the same backend after a 429/503.
    pub retries_per_backend: usize,
    /// Ask Gemini backends not to block any harm category.
    pub unrestricted_safety: bool,
    /// Publication name used in the prompt and the footer.
    pub masthead: String,
    /// Labels attached to every post.
    pub labels: Vec<String>,
    pub image: ImageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feeds: vec![
                "https://feeds.elpais.com/mrss-s/pages/ep/site/elpais.com/section/internacional/portada".to_string(),
                "https://www.bbc.com/mundo/temas/internacional/index.xml".to_string(),
            ],
            max_entries_per_feed: 6,
            min_summary_length: 21,
            protocol: ProtocolVersion::default(),
            image_strategy: ImageStrategy::default(),
            backends: vec![BackendSpec {
                id: "gemini-1.5-flash".to_string(),
                kind: BackendKind::Gemini,
                base_url: None,
            }],
            discovery: None,
            retries_per_backend: 1,
            unrestricted_safety: false,
            masthead: "Radar Internacional".to_string(),
            labels: vec!["Internacional".to_string(), "Noticias".to_string()],
            image: ImageConfig::default(),
        }
    }
}

/// Query the Gemini provider for model ids containing `pattern`.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscoveryConfig {
    pub pattern: String,
    /// Cap on discovered ids appended to the list.
    #[serde(default = "default_discovery_limit")]
    pub limit: usize,
}

fn default_discovery_limit() -> usize {
    3
}

/// Image resolution knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImageConfig {
    pub width: u32,
    pub height: u32,
    /// Last-resort image when nothing else produced a usable URL.
    pub placeholder_url: String,
    pub synthesis_endpoint: String,
    pub stock_endpoint: String,
    /// Photo used when a stock search comes back empty.
    pub stock_default_photo_id: u64,
    pub stock_per_page: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
            placeholder_url: "https://placehold.co/800x500/png?text=Radar+Internacional".to_string(),
            synthesis_endpoint: "https://image.pollinations.ai/prompt".to_string(),
            stock_endpoint: "https://api.pexels.com/v1/search".to_string(),
            stock_default_photo_id: 3_944_454,
            stock_per_page: 5,
        }
    }
}

impl Config {
    /// Parse a YAML document; missing fields take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Load from `path`, or use the built-in defaults when no path is given.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, Box<dyn Error>> {
        match path {
            Some(path) => {
                let yaml = fs::read_to_string(path).await?;
                let config = Self::from_yaml(&yaml)?;
                info!(path, feeds = config.feeds.len(), backends = config.backends.len(), "Loaded configuration");
                Ok(config)
            }
            None => {
                info!("No config file given; using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject configurations that cannot possibly produce a post.
    pub fn validate(&self) -> Result<(), String> {
        if self.feeds.is_empty() {
            return Err("no feeds configured".to_string());
        }
        if self.backends.is_empty() && self.discovery.is_none() {
            return Err("no generation backends configured".to_string());
        }
        if self.max_entries_per_feed == 0 {
            return Err("max_entries_per_feed must be at least 1".to_string());
        }
        if self.image.placeholder_url.trim().is_empty() {
            return Err("image.placeholder_url must not be empty".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.protocol, ProtocolVersion::Minimal);
        assert_eq!(config.image_strategy, ImageStrategy::Stock);
        assert_eq!(config.max_entries_per_feed, 6);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = Config::from_yaml(
            r#"
protocol: extended
image_strategy: synthesis
backends:
  - id: gemini-2.0-flash
    kind: gemini
  - id: llama3.1
    kind: openai
    base_url: http://localhost:11434/v1
discovery:
  pattern: flash
"#,
        )
        .unwrap();

        assert_eq!(config.protocol, ProtocolVersion::Extended);
        assert_eq!(config.image_strategy, ImageStrategy::Synthesis);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[1].kind, BackendKind::OpenAi);
        assert_eq!(
            config.backends[1].base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        let discovery = config.discovery.unwrap();
        assert_eq!(discovery.pattern, "flash");
        assert_eq!(discovery.limit, 3);
        assert_eq!(config.feeds.len(), 2);
        assert_eq!(config.masthead, "Radar Internacional");
    }

    #[test]
    fn test_title_body_protocol_name() {
        let config = Config::from_yaml("protocol: title-body\n").unwrap();
        assert_eq!(config.protocol, ProtocolVersion::TitleBody);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(Config::from_yaml("feedz: []\n").is_err());
    }

    #[test]
    fn test_validate_rejects_empty_feeds() {
        let config = Config {
            feeds: vec![],
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_discovery_only() {
        let config = Config {
            backends: vec![],
            discovery: Some(DiscoveryConfig {
                pattern: "flash".into(),
                limit: 2,
            }),
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "min_summary_length: 40\nlabels: [Mundo]\n").unwrap();

        let config = Config::load(path.to_str()).await.unwrap();
        assert_eq!(config.min_summary_length, 40);
        assert_eq!(config.labels, vec!["Mundo".to_string()]);
    }

    #[tokio::test]
    async fn test_load_without_path_uses_defaults() {
        let config = Config::load(None).await.unwrap();
        assert_eq!(config.min_summary_length, 21);
    }
}
