//! Telegram Bot API `sendPhoto` as the notification channel.

use crate::error::NotifyError;
use crate::publish::NotifyChannel;
use crate::transport::CLIENT;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::fmt;
use tracing::instrument;

const API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

pub struct TelegramChannel {
    bot_token: String,
    chat_id: String,
}

impl fmt::Debug for TelegramChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramChannel")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

impl TelegramChannel {
    /// `None` unless both the token and the chat are set.
    pub fn from_parts(bot_token: Option<&str>, chat_id: Option<&str>) -> Option<Self> {
        let bot_token = bot_token.filter(|t| !t.is_empty())?;
        let chat_id = chat_id.filter(|c| !c.is_empty())?;
        Some(Self {
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{API_BASE}/bot{}/sendPhoto", self.bot_token)
    }
}

impl NotifyChannel for TelegramChannel {
    #[instrument(level = "info", skip_all, fields(chat_id = %self.chat_id, bytes = image.len()))]
    async fn send_photo(&self, image: &[u8], caption: &str) -> Result<(), NotifyError> {
        let photo = Part::bytes(image.to_vec()).file_name("radar.jpg");
        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", photo);

        let res = CLIENT.post(self.endpoint()).multipart(form).send().await?;
        let status = res.status();
        let body: ApiResponse = res.json().await.unwrap_or_default();
        if status.is_success() && body.ok {
            Ok(())
        } else {
            Err(NotifyError::Refused(
                body.description.unwrap_or_else(|| format!("HTTP {status}")),
            ))
        }
    }
}
