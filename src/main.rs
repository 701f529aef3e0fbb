//! # Radar News
//!
//! An unattended news agent: each invocation picks one story from the
//! configured feeds, has a generative model write it up as a long-form
//! Spanish article, illustrates it and publishes it to a blog, mirroring the
//! post to a Telegram channel when one is configured.
//!
//! ## Usage
//!
//! ```sh
//! radar_news --config radar.yaml -j ./runs
//! ```
//!
//! ## Architecture
//!
//! One strictly sequential pipeline per run (see [`pipeline`]):
//! 1. **Story Source**: read the feeds, pool eligible entries, pick one at random
//! 2. **Backend Selector**: try generation backends in priority order until one answers
//! 3. **Response Parser**: split the `||||`-delimited answer, or fall back to a generic article
//! 4. **Image Resolver**: synthesis, stock search or the feed's own photo, always ending in a URL
//! 5. **Publisher**: create the post, then best-effort mirror it
//!
//! ## Exit codes
//!
//! | Code | Meaning                               |
//! |------|---------------------------------------|
//! | 0    | post created                          |
//! | 1    | configuration or credentials unusable |
//! | 2    | no eligible story in any feed         |
//! | 3    | every generation backend failed       |
//! | 4    | the blog platform rejected the post   |

use clap::Parser;
use std::process::ExitCode;
use tracing::{error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod backends;
mod cli;
mod config;
mod error;
mod images;
mod models;
mod outputs;
mod pipeline;
mod platforms;
mod prompt;
mod protocol;
mod publish;
mod sources;
mod transport;
mod utils;

#[cfg(test)]
mod testing;

use backends::{ApiKeys, build_backends};
use cli::Cli;
use config::Config;
use outputs::json;
use pipeline::Pipeline;
use platforms::blogger::BloggerPlatform;
use platforms::telegram::TelegramChannel;
use transport::HttpTransport;
use utils::ensure_writable_dir;

const EXIT_STARTUP: u8 = 1;

#[tokio::main]
#[instrument]
async fn main() -> ExitCode {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!(version = env!("CARGO_PKG_VERSION"), "radar_news starting up");

    let args = Cli::parse();

    // ---- Configuration ----
    let mut config = match Config::load(args.config.as_deref()).await {
        Ok(config) => config,
        Err(e) => {
            error!(path = ?args.config, error = %e, "Failed to load configuration");
            return ExitCode::from(EXIT_STARTUP);
        }
    };
    if let Some(protocol) = args.protocol {
        config.protocol = protocol;
    }
    if let Some(strategy) = args.image_strategy {
        config.image_strategy = strategy;
    }
    if !args.backends.is_empty() {
        config.backends = args.backends.clone();
    }
    if let Err(reason) = config.validate() {
        error!(%reason, "Invalid configuration");
        return ExitCode::from(EXIT_STARTUP);
    }
    info!(
        feeds = config.feeds.len(),
        protocol = ?config.protocol,
        image_strategy = ?config.image_strategy,
        "Configuration ready"
    );

    // Early check: the run record must be writable before any network work
    if let Some(dir) = &args.json_output_dir {
        if let Err(e) = ensure_writable_dir(dir).await {
            error!(path = %dir, error = %e, "JSON output directory is not writable");
            return ExitCode::from(EXIT_STARTUP);
        }
    }

    // ---- Collaborators ----
    let transport = HttpTransport;
    let keys = ApiKeys {
        gemini: args.gemini_api_key.clone(),
        openai: args.openai_api_key.clone(),
    };
    let backends = build_backends(&config, &keys, &transport).await;
    if backends.is_empty() {
        error!("No usable generation backends; check GEMINI_API_KEY and the backends list");
        return ExitCode::from(EXIT_STARTUP);
    }

    let (Some(blog_id), Some(google_token)) = (args.blog_id.as_deref(), args.google_token.as_deref()) else {
        error!("BLOG_ID and GOOGLE_TOKEN are required to publish");
        return ExitCode::from(EXIT_STARTUP);
    };
    let platform = match BloggerPlatform::connect(blog_id, google_token).await {
        Ok(platform) => platform,
        Err(e) => {
            error!(error = %e, "Blog platform credentials unusable");
            return ExitCode::from(EXIT_STARTUP);
        }
    };

    let channel = TelegramChannel::from_parts(args.telegram_bot_token.as_deref(), args.telegram_chat_id.as_deref());
    if channel.is_none() {
        info!("No notification channel configured; mirroring disabled");
    }

    // ---- Run ----
    let pipeline = Pipeline {
        config: &config,
        transport: &transport,
        backends: &backends,
        platform: &platform,
        channel: channel.as_ref(),
        stock_api_key: args.pexels_api_key.as_deref(),
    };
    let result = pipeline.run(&mut rand::rng()).await;

    let elapsed = start_time.elapsed();
    match result {
        Ok(report) => {
            if let Some(dir) = &args.json_output_dir {
                if let Err(e) = json::write_run_record(&report, dir).await {
                    warn!(error = %e, "Failed to write run record; post stands");
                }
            }
            info!(
                ?elapsed,
                post_url = %report.outcome.post_url,
                mirrored = report.outcome.mirrored,
                "Execution complete"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(?elapsed, error = %e, exit_code = e.exit_code(), "Run failed");
            ExitCode::from(e.exit_code())
        }
    }
}
