//! Data models passed between the stages of a run.
//!
//! Each value is produced by exactly one stage and handed forward by value:
//! - [`FeedEntry`]: one syndicated item as read from a feed
//! - [`StoryCandidate`]: the entry chosen to write about
//! - [`GenerationRequest`] / [`GenerationResult`]: the prompt and what a backend made of it
//! - [`ParsedArticle`]: the article split out of the model's text
//! - [`ResolvedImage`]: the illustration for the post
//! - [`PublishOutcome`]: what the platform and the channel made of the post

use std::fmt;

/// How a media link was attached to a feed entry.
///
/// The declaration order is the priority order used when picking the
/// source photo for a story.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MediaKind {
    /// `<media:content>` or an image `<enclosure>`.
    Attachment,
    /// `<media:thumbnail>`.
    Thumbnail,
    /// Any other link whose declared type is an image.
    Link,
}

/// A media URL found on a feed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLink {
    pub url: String,
    pub kind: MediaKind,
    /// Declared MIME type, if the feed gave one.
    pub mime: Option<String>,
}

impl MediaLink {
    fn is_image(&self) -> bool {
        match &self.mime {
            Some(mime) => mime.to_ascii_lowercase().starts_with("image/"),
            // media:content/thumbnail without a type are photos in practice
            None => self.kind != MediaKind::Link,
        }
    }
}

/// One syndicated item as read from a feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedEntry {
    pub title: String,
    /// Plain-text summary; `None` when the feed had no description at all.
    pub summary: Option<String>,
    pub media: Vec<MediaLink>,
}

impl FeedEntry {
    /// Best photo attached to the entry: attachment, then thumbnail, then
    /// any image-typed link.
    pub fn source_media(&self) -> Option<String> {
        self.media
            .iter()
            .filter(|m| m.is_image() && !m.url.trim().is_empty())
            .min_by_key(|m| m.kind)
            .map(|m| m.url.trim().to_string())
    }
}

/// The story a run writes about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryCandidate {
    pub title: String,
    /// Source summary; may be empty.
    pub summary: String,
    /// Photo already attached to the feed entry.
    pub source_media: Option<String>,
}

impl StoryCandidate {
    /// The text the eligibility threshold is measured on: the summary, or
    /// the title when the summary is absent.
    pub fn eligibility_text(&self) -> &str {
        if self.summary.is_empty() {
            &self.title
        } else {
            &self.summary
        }
    }

    /// Eligible when the measured text is at least `min_len` characters.
    pub fn is_eligible(&self, min_len: usize) -> bool {
        self.eligibility_text().chars().count() >= min_len
    }
}

impl From<FeedEntry> for StoryCandidate {
    fn from(entry: FeedEntry) -> Self {
        let source_media = entry.source_media();
        Self {
            title: entry.title,
            summary: entry.summary.unwrap_or_default(),
            source_media,
        }
    }
}

/// The composed prompt. Built once per run and reused verbatim for every
/// backend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    prompt_text: String,
}

impl GenerationRequest {
    pub fn new(prompt_text: String) -> Self {
        Self { prompt_text }
    }

    pub fn prompt_text(&self) -> &str {
        &self.prompt_text
    }
}

/// Why a backend attempt failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    /// The backend answered with a non-success HTTP status.
    Status(u16),
    /// The request never produced a usable answer (network, decoding, empty body).
    Transport(String),
}

impl FailureCause {
    /// Rate limiting and temporary overload are worth one more try on the
    /// same backend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FailureCause::Status(429 | 503))
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Status(code) => write!(f, "HTTP {code}"),
            FailureCause::Transport(msg) => write!(f, "{msg}"),
        }
    }
}

/// The outcome of one backend attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success { backend_id: String, raw_text: String },
    Blocked { backend_id: String, reason: String },
    Failure { backend_id: String, cause: FailureCause },
}

impl GenerationResult {
    pub fn backend_id(&self) -> &str {
        match self {
            GenerationResult::Success { backend_id, .. }
            | GenerationResult::Blocked { backend_id, .. }
            | GenerationResult::Failure { backend_id, .. } => backend_id,
        }
    }
}

/// The article split out of the model's output.
///
/// Always populated: either parsed or built by the deterministic fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedArticle {
    pub title: String,
    /// Keyword or scene description driving the image resolver.
    pub image_directive: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub body_html: String,
}

/// The illustration for the post.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    /// Never empty; the static placeholder when every strategy failed.
    pub url: String,
    /// Downloaded payload, only fetched for mirroring.
    pub bytes: Option<Vec<u8>>,
}

impl ResolvedImage {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bytes: None,
        }
    }
}

impl fmt::Debug for ResolvedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedImage")
            .field("url", &self.url)
            .field("bytes", &self.bytes.as_ref().map(Vec::len))
            .finish()
    }
}

/// Result of the publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    pub post_url: String,
    /// Whether the notification channel accepted the mirrored photo.
    pub mirrored: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(url: &str, kind: MediaKind, mime: Option<&str>) -> MediaLink {
        MediaLink {
            url: url.to_string(),
            kind,
            mime: mime.map(str::to_string),
        }
    }

    #[test]
    fn test_source_media_prefers_attachment() {
        let entry = FeedEntry {
            title: "t".into(),
            summary: None,
            media: vec![
                link("https://x/link.jpg", MediaKind::Link, Some("image/jpeg")),
                link("https://x/thumb.jpg", MediaKind::Thumbnail, None),
                link("https://x/full.jpg", MediaKind::Attachment, Some("image/jpeg")),
            ],
        };
        assert_eq!(entry.source_media().as_deref(), Some("https://x/full.jpg"));
    }

    #[test]
    fn test_source_media_skips_non_images() {
        let entry = FeedEntry {
            title: "t".into(),
            summary: None,
            media: vec![
                link("https://x/clip.mp4", MediaKind::Attachment, Some("video/mp4")),
                link("https://x/page", MediaKind::Link, Some("text/html")),
                link("https://x/thumb.jpg", MediaKind::Thumbnail, None),
            ],
        };
        assert_eq!(entry.source_media().as_deref(), Some("https://x/thumb.jpg"));
    }

    #[test]
    fn test_source_media_untyped_link_is_ignored() {
        let entry = FeedEntry {
            title: "t".into(),
            summary: None,
            media: vec![link("https://x/a", MediaKind::Link, None)],
        };
        assert_eq!(entry.source_media(), None);
    }

    #[test]
    fn test_eligibility_falls_back_to_title() {
        let story = StoryCandidate {
            title: "A sufficiently long headline".into(),
            summary: String::new(),
            source_media: None,
        };
        assert!(story.is_eligible(20));

        let short = StoryCandidate {
            title: "Short".into(),
            summary: "Also short".into(),
            source_media: None,
        };
        assert!(!short.is_eligible(20));
    }

    #[test]
    fn test_eligibility_counts_chars_not_bytes() {
        let story = StoryCandidate {
            title: "t".into(),
            summary: "ñññññ".into(),
            source_media: None,
        };
        assert!(story.is_eligible(5));
        assert!(!story.is_eligible(6));
    }

    #[test]
    fn test_failure_cause_retryable() {
        assert!(FailureCause::Status(429).is_retryable());
        assert!(FailureCause::Status(503).is_retryable());
        assert!(!FailureCause::Status(400).is_retryable());
        assert!(!FailureCause::Transport("timeout".into()).is_retryable());
    }

    #[test]
    fn test_resolved_image_debug_hides_bytes() {
        let image = ResolvedImage {
            url: "https://x/a.jpg".into(),
            bytes: Some(vec![0u8; 42]),
        };
        let dbg = format!("{image:?}");
        assert!(dbg.contains("42"));
        assert!(!dbg.contains("[0, 0"));
    }
}
