//! Image resolution.
//!
//! Three strategies turn the article's image directive into a picture URL:
//!
//! | Strategy    | Source                                              | Directive kind |
//! |-------------|-----------------------------------------------------|----------------|
//! | `synthesis` | prompt-rendering service, fresh seed every call     | visual scene   |
//! | `stock`     | keyword photo search, first landscape result        | keyword        |
//! | `source`    | the photo already attached to the feed entry        | keyword        |
//!
//! Whatever happens, [`ImageResolver::resolve`] returns a usable URL: every
//! failure path ends at a keyword placeholder or the configured static
//! placeholder. Downloading the bytes is a separate, optional step used only
//! for mirroring.

pub mod stock;
pub mod synthesis;

use crate::config::ImageConfig;
use crate::models::ResolvedImage;
use crate::protocol::{DirectiveKind, FALLBACK_DIRECTIVE};
use crate::transport::Transport;
use chrono::Utc;
use clap::ValueEnum;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ImageStrategy {
    Synthesis,
    #[default]
    Stock,
    Source,
}

impl ImageStrategy {
    /// What the model should put in the directive field for this strategy.
    pub fn directive_kind(self) -> DirectiveKind {
        match self {
            ImageStrategy::Synthesis => DirectiveKind::Scene,
            ImageStrategy::Stock | ImageStrategy::Source => DirectiveKind::Keyword,
        }
    }
}

/// Keyword-addressed placeholder photo. `lock` pins the pick for this URL.
pub fn keyword_placeholder(directive: &str, width: u32, height: u32) -> String {
    let tag: String = directive.chars().filter(|c| !c.is_whitespace()).collect();
    let tag = if tag.is_empty() {
        FALLBACK_DIRECTIVE.replace(' ', "")
    } else {
        tag
    };
    format!(
        "https://loremflickr.com/{width}/{height}/{}/all?lock={}",
        urlencoding::encode(&tag),
        Utc::now().timestamp()
    )
}

fn is_usable(candidate: &str) -> bool {
    Url::parse(candidate.trim())
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .unwrap_or(false)
}

pub struct ImageResolver<'a, T> {
    config: &'a ImageConfig,
    transport: &'a T,
    /// Without a key the stock strategy degrades to the keyword placeholder.
    stock_api_key: Option<&'a str>,
}

impl<'a, T: Transport> ImageResolver<'a, T> {
    pub fn new(config: &'a ImageConfig, transport: &'a T, stock_api_key: Option<&'a str>) -> Self {
        Self {
            config,
            transport,
            stock_api_key: stock_api_key.filter(|k| !k.is_empty()),
        }
    }

    /// Resolve `directive` to an image URL.
    ///
    /// # Arguments
    ///
    /// * `directive` - Keyword or scene description from the article
    /// * `strategy` - Which source to try first
    /// * `source_media` - The feed entry's own photo, used by [`ImageStrategy::Source`]
    ///
    /// # Returns
    ///
    /// A [`ResolvedImage`] with a usable URL and no bytes. When the strategy
    /// yields nothing usable, the keyword placeholder or the static
    /// placeholder is used; this never fails.
    #[instrument(level = "info", skip(self, source_media))]
    pub async fn resolve(
        &self,
        directive: &str,
        strategy: ImageStrategy,
        source_media: Option<&str>,
    ) -> ResolvedImage {
        let (w, h) = (self.config.width, self.config.height);
        let candidate = match strategy {
            ImageStrategy::Synthesis => Some(synthesis::prompt_url(
                &self.config.synthesis_endpoint,
                directive,
                w,
                h,
                synthesis::fresh_seed(),
            )),
            ImageStrategy::Stock => match self.stock_api_key {
                Some(key) => stock::search(self.transport, self.config, directive, key).await,
                None => {
                    info!("No stock API key; using keyword placeholder");
                    Some(keyword_placeholder(directive, w, h))
                }
            },
            ImageStrategy::Source => match source_media {
                Some(url) => Some(url.to_string()),
                None => {
                    info!("Story has no source media; using keyword placeholder");
                    Some(keyword_placeholder(directive, w, h))
                }
            },
        };

        let url = match candidate {
            Some(url) if is_usable(&url) => url.trim().to_string(),
            other => {
                warn!(candidate = ?other, "No usable image URL; using static placeholder");
                self.config.placeholder_url.clone()
            }
        };
        info!(%url, "Image resolved");
        ResolvedImage::from_url(url)
    }

    /// Fetch the image payload. Failure leaves `bytes` empty and the URL
    /// untouched.
    #[instrument(level = "info", skip_all, fields(url = %image.url))]
    pub async fn download(&self, image: ResolvedImage) -> ResolvedImage {
        match self.transport.get(&image.url, &[("Accept", "image/*")]).await {
            Ok(bytes) if !bytes.is_empty() => {
                info!(bytes = bytes.len(), "Image downloaded");
                ResolvedImage {
                    bytes: Some(bytes),
                    ..image
                }
            }
            Ok(_) => {
                warn!("Image download returned an empty body");
                image
            }
            Err(e) => {
                warn!(error = %e, "Image download failed");
                image
            }
        }
    }
}
