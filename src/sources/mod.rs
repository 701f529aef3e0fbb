//! Story sourcing: read every configured feed, pool the eligible entries and
//! pick one at random.
//!
//! Feeds are read concurrently. A feed that cannot be fetched or parsed is
//! logged and skipped; only an empty pool across all feeds fails the run.
//! Results are pooled in configuration order regardless of which feed
//! answered first, so a seeded RNG picks reproducibly.

pub mod rss;

use crate::error::FeedError;
use crate::models::{FeedEntry, StoryCandidate};
use crate::transport::Transport;
use futures::stream::{self, StreamExt};
use rand::Rng;
use rand::seq::IndexedRandom;
use tracing::{debug, error, info, instrument, warn};

/// Feeds fetched at the same time.
const FEED_CONCURRENCY: usize = 4;

const FEED_ACCEPT: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";

/// Fetch and parse one feed.
#[instrument(level = "info", skip(transport))]
pub async fn fetch_feed<T: Transport>(transport: &T, url: &str) -> Result<Vec<FeedEntry>, FeedError> {
    let body = transport.get(url, &[("Accept", FEED_ACCEPT)]).await?;
    debug!(bytes = body.len(), "Feed downloaded");
    rss::parse_feed(&body)
}

/// All eligible candidates across `feed_urls`, at most `max_entries_per_feed`
/// taken from the head of each feed.
#[instrument(level = "info", skip_all, fields(feeds = feed_urls.len()))]
pub async fn collect_pool<T: Transport>(
    transport: &T,
    feed_urls: &[String],
    max_entries_per_feed: usize,
    min_summary_length: usize,
) -> Vec<StoryCandidate> {
    let mut results: Vec<(usize, &String, Result<Vec<FeedEntry>, FeedError>)> =
        stream::iter(feed_urls.iter().enumerate())
            .map(|(i, url)| async move { (i, url, fetch_feed(transport, url).await) })
            .buffer_unordered(FEED_CONCURRENCY)
            .collect()
            .await;
    results.sort_by_key(|(i, _, _)| *i);

    let mut pool = Vec::new();
    for (_, url, result) in results {
        match result {
            Ok(entries) => {
                let before = pool.len();
                pool.extend(
                    entries
                        .into_iter()
                        .take(max_entries_per_feed)
                        .map(StoryCandidate::from)
                        .filter(|c| c.is_eligible(min_summary_length)),
                );
                info!(feed = %url, eligible = pool.len() - before, "Feed pooled");
            }
            Err(e) => {
                error!(feed = %url, error = %e, "Feed skipped");
            }
        }
    }
    pool
}

/// Pick one eligible story uniformly at random.
///
/// Feeds that cannot be fetched or parsed are logged and skipped; they never
/// abort selection on their own.
///
/// # Arguments
///
/// * `transport` - Where feed bodies come from
/// * `feed_urls` - Feeds in configured order
/// * `max_entries_per_feed` - How many entries to take from the head of each feed
/// * `min_summary_length` - Minimum characters for an entry to be eligible
/// * `rng` - Source of the uniform pick
///
/// # Returns
///
/// The chosen candidate, or `None` when no feed produced an eligible entry.
#[instrument(level = "info", skip_all)]
pub async fn select_story<T: Transport, R: Rng + ?Sized>(
    transport: &T,
    feed_urls: &[String],
    max_entries_per_feed: usize,
    min_summary_length: usize,
    rng: &mut R,
) -> Option<StoryCandidate> {
    let pool = collect_pool(transport, feed_urls, max_entries_per_feed, min_summary_length).await;
    match pool.choose(rng) {
        Some(story) => {
            info!(pool = pool.len(), title = %story.title, has_media = story.source_media.is_some(), "Story selected");
            Some(story.clone())
        }
        None => {
            warn!("No eligible story in any feed");
            None
        }
    }
}
