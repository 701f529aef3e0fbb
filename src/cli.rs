//! Command-line interface.
//!
//! Secrets and deployment ids can come from flags or from the environment;
//! clap reads them once here and nothing else in the crate touches the
//! environment.

use crate::backends::BackendSpec;
use crate::images::ImageStrategy;
use crate::protocol::ProtocolVersion;
use clap::Parser;

/// Pick a story, have it written up, illustrate it and publish it.
///
/// # Examples
///
/// ```sh
/// # Defaults: two international feeds, Gemini, stock photos
/// GEMINI_API_KEY=... GOOGLE_TOKEN="$(cat token.json)" BLOG_ID=123 radar_news
///
/// # Scene-described synthetic images, local model as a last resort
/// radar_news --image-strategy synthesis \
///     --backend gemini-2.0-flash --backend openai:llama3.1@http://localhost:11434/v1
/// ```
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to config.yaml file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Directory for the JSON run record
    #[arg(short, long)]
    pub json_output_dir: Option<String>,

    /// Output field protocol the model is asked to follow
    #[arg(long, value_enum)]
    pub protocol: Option<ProtocolVersion>,

    /// How the post's image is found
    #[arg(long, value_enum)]
    pub image_strategy: Option<ImageStrategy>,

    /// Generation backend, highest priority first; replaces the configured list.
    /// `<id>`, `gemini:<id>`, `openai:<id>` or `openai:<id>@<base_url>`
    #[arg(short, long = "backend")]
    pub backends: Vec<BackendSpec>,

    /// Google Gemini API key
    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub gemini_api_key: Option<String>,

    /// Key for OpenAI-compatible backends
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    /// Pexels API key for the stock strategy
    #[arg(long, env = "PEXELS_API_KEY", hide_env_values = true)]
    pub pexels_api_key: Option<String>,

    /// OAuth authorized-user JSON for Blogger
    #[arg(long, env = "GOOGLE_TOKEN", hide_env_values = true)]
    pub google_token: Option<String>,

    /// Blogger blog id
    #[arg(long, env = "BLOG_ID")]
    pub blog_id: Option<String>,

    /// Telegram bot token; mirroring is off without it
    #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub telegram_bot_token: Option<String>,

    /// Telegram chat or channel id
    #[arg(long, env = "TELEGRAM_CHAT_ID")]
    pub telegram_chat_id: Option<String>,
}
