//! One run, start to finish.
//!
//! ```text
//! feeds ─▶ select_story ─▶ build_request ─▶ generate ─▶ parse ─▶ resolve image ─▶ publish
//!              │                               │                      │              │
//!            None ⇒ exit 2             exhausted ⇒ exit 3     never fails      error ⇒ exit 4
//! ```
//!
//! Stages run strictly in sequence and hand their output forward by value.
//! Only the three marked failures end a run; everything else degrades.

use crate::api::{self, GenerationBackend};
use crate::config::Config;
use crate::error::PipelineError;
use crate::images::ImageResolver;
use crate::models::{ParsedArticle, PublishOutcome};
use crate::prompt;
use crate::protocol;
use crate::publish::{self, BlogPlatform, NotifyChannel};
use crate::sources;
use crate::transport::Transport;
use crate::utils::truncate_for_log;
use rand::Rng;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// What a successful run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub story_title: String,
    pub backend_id: String,
    pub article: ParsedArticle,
    pub image_url: String,
    pub outcome: PublishOutcome,
}

/// The collaborators of a run, borrowed from `main`.
pub struct Pipeline<'a, T, B, P, N> {
    pub config: &'a Config,
    pub transport: &'a T,
    pub backends: &'a [B],
    pub platform: &'a P,
    pub channel: Option<&'a N>,
    pub stock_api_key: Option<&'a str>,
}

impl<T, B, P, N> Pipeline<'_, T, B, P, N>
where
    T: Transport,
    B: GenerationBackend,
    P: BlogPlatform,
    N: NotifyChannel,
{
    #[instrument(level = "info", skip_all)]
    pub async fn run<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<RunReport, PipelineError> {
        let t0 = Instant::now();
        let config = self.config;

        let story = sources::select_story(
            self.transport,
            &config.feeds,
            config.max_entries_per_feed,
            config.min_summary_length,
            rng,
        )
        .await
        .ok_or(PipelineError::NoEligibleStory)?;

        let request = prompt::build_request(&story, config);
        debug!(chars = request.prompt_text().chars().count(), "Prompt composed");

        let generated = api::generate(&request, self.backends)
            .await
            .map_err(|e| PipelineError::BackendsExhausted {
                attempts: e.attempts.len(),
            })?;

        let article = protocol::parse(&generated.raw_text, config.protocol);
        info!(
            title = %article.title,
            directive = %article.image_directive,
            category = ?article.category,
            location = ?article.location,
            body_preview = %truncate_for_log(&article.body_html, 120),
            "Article ready"
        );

        let resolver = ImageResolver::new(&config.image, self.transport, self.stock_api_key);
        let mut image = resolver
            .resolve(
                &article.image_directive,
                config.image_strategy,
                story.source_media.as_deref(),
            )
            .await;
        if self.channel.is_some() {
            image = resolver.download(image).await;
        }

        let outcome = publish::publish(
            &article,
            &image,
            &config.masthead,
            &config.labels,
            self.platform,
            self.channel,
        )
        .await
        .inspect_err(|e| warn!(error = %e, "Publish failed"))?;

        info!(
            post_url = %outcome.post_url,
            mirrored = outcome.mirrored,
            backend = %generated.backend_id,
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Run complete"
        );

        Ok(RunReport {
            story_title: story.title,
            backend_id: generated.backend_id,
            article,
            image_url: image.url,
            outcome,
        })
    }
}
