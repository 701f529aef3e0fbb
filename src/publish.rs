//! The publish step: assemble the post, create it on the blog platform and
//! mirror it to the notification channel.
//!
//! Creating the post is the run's success signal, so a platform error is
//! returned to the caller as-is. The mirror is best effort: it only runs
//! after the post exists, only when image bytes were downloaded, and its
//! failure is logged and reported as `mirrored: false`.

use crate::error::{NotifyError, PublishError};
use crate::models::{ParsedArticle, PublishOutcome, ResolvedImage};
use itertools::Itertools;
use tracing::{info, instrument, warn};

/// Telegram's limit on photo captions, in characters.
pub const CAPTION_LIMIT: usize = 1024;

/// Somewhere posts are created.
pub trait BlogPlatform {
    /// Create a public entry and return its URL.
    async fn create_entry(&self, title: &str, html: &str, labels: &[String]) -> Result<String, PublishError>;
}

/// Somewhere a photo with a caption can be sent.
pub trait NotifyChannel {
    async fn send_photo(&self, image: &[u8], caption: &str) -> Result<(), NotifyError>;
}

fn escape_attr(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('"', "&quot;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The full post: image with its caption above the body, and the footer.
pub fn assemble_html(article: &ParsedArticle, image: &ResolvedImage, masthead: &str) -> String {
    let tag = escape_attr(&article.image_directive);
    format!(
        r#"<div style="font-family: 'Georgia', serif; font-size: 18px; line-height: 1.8;">
<div class="separator" style="clear: both; text-align: center; margin-bottom: 25px;">
<img border="0" src="{src}" style="width:100%; max-width:800px; border-radius:5px;" alt="{tag}"/>
<br/><small style="font-family:Arial; font-size:10px; color:#666;">ARCHIVO: {caption}</small>
</div>
{body}
<br><hr><i>{masthead} - Análisis Global</i>
</div>"#,
        src = escape_attr(&image.url),
        caption = tag.to_uppercase(),
        body = article.body_html,
        masthead = escape_attr(masthead),
    )
}

/// Fixed labels, then category and location; blanks dropped, first
/// occurrence kept.
pub fn labels(fixed: &[String], article: &ParsedArticle) -> Vec<String> {
    fixed
        .iter()
        .map(String::as_str)
        .chain(article.category.as_deref())
        .chain(article.location.as_deref())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .unique()
        .map(str::to_string)
        .collect()
}

/// `<title>\n\n<post url>`, cut to [`CAPTION_LIMIT`] characters.
pub fn caption(title: &str, post_url: &str) -> String {
    let full = format!("{title}\n\n{post_url}");
    if full.chars().count() <= CAPTION_LIMIT {
        return full;
    }
    // keep the link whole; shorten the title instead
    let room = CAPTION_LIMIT.saturating_sub(post_url.chars().count() + 3);
    let short: String = title.chars().take(room).collect();
    let out = format!("{short}…\n\n{post_url}");
    out.chars().take(CAPTION_LIMIT).collect()
}

/// Publish `article` and, when possible, mirror it.
///
/// The channel is only asked when one is configured and `image` carries
/// downloaded bytes. Its failure is logged and leaves the post standing.
///
/// # Arguments
///
/// * `article` - Parsed article to publish
/// * `image` - Illustration; its bytes are only needed for mirroring
/// * `masthead` - Publication name for the footer
/// * `fixed_labels` - Labels attached to every post
/// * `platform` - The blog
/// * `channel` - Optional notification mirror
///
/// # Returns
///
/// The created post's URL and whether the mirror succeeded.
///
/// # Errors
///
/// Returns [`PublishError`] when the platform rejects the post or gives no
/// URL back. The channel is not contacted in that case.
#[instrument(level = "info", skip_all, fields(title = %article.title))]
pub async fn publish<P: BlogPlatform, N: NotifyChannel>(
    article: &ParsedArticle,
    image: &ResolvedImage,
    masthead: &str,
    fixed_labels: &[String],
    platform: &P,
    channel: Option<&N>,
) -> Result<PublishOutcome, PublishError> {
    let html = assemble_html(article, image, masthead);
    let labels = labels(fixed_labels, article);

    let post_url = platform.create_entry(&article.title, &html, &labels).await?;
    info!(%post_url, ?labels, "Post created");

    let mirrored = match (channel, image.bytes.as_deref()) {
        (Some(channel), Some(bytes)) => match channel.send_photo(bytes, &caption(&article.title, &post_url)).await {
            Ok(()) => {
                info!("Post mirrored to notification channel");
                true
            }
            Err(e) => {
                warn!(error = %e, "Notification failed; post stands");
                false
            }
        },
        (Some(_), None) => {
            info!("No image bytes; notification skipped");
            false
        }
        (None, _) => false,
    };

    Ok(PublishOutcome { post_url, mirrored })
}
