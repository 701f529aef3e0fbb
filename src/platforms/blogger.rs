//! Blogger v3 as the blog platform.
//!
//! Credentials are an OAuth "authorized user" JSON document (the shape the
//! Google client libraries write): an access `token`, and optionally a
//! `refresh_token` with the client id/secret and `token_uri` needed to mint a
//! fresh one. The refresh happens once, when connecting.

use crate::error::PublishError;
use crate::publish::BlogPlatform;
use crate::transport::CLIENT;
use crate::utils::truncate_for_log;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument, warn};

pub const API_BASE: &str = "https://www.googleapis.com/blogger/v3";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Default, Deserialize)]
#[serde(default)]
pub struct TokenFile {
    token: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    token_uri: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl TokenFile {
    pub fn parse(json: &str) -> Result<Self, PublishError> {
        serde_json::from_str(json).map_err(|e| PublishError::Credentials(format!("token JSON: {e}")))
    }

    fn stored_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .or(self.access_token.as_deref())
            .filter(|t| !t.is_empty())
    }

    /// `(token_uri, form)` when enough is present to refresh.
    fn refresh_form(&self) -> Option<(&str, [(&'static str, &str); 4])> {
        let refresh_token = self.refresh_token.as_deref()?;
        let client_id = self.client_id.as_deref()?;
        let client_secret = self.client_secret.as_deref()?;
        Some((
            self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI),
            [
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ],
        ))
    }
}

#[derive(Deserialize)]
struct RefreshResponse {
    access_token: String,
}

#[derive(Serialize)]
struct PostBody<'a> {
    kind: &'static str,
    title: &'a str,
    content: &'a str,
    labels: &'a [String],
}

#[derive(Deserialize)]
struct PostResponse {
    url: Option<String>,
}

pub struct BloggerPlatform {
    blog_id: String,
    access_token: String,
    api_base: String,
}

impl fmt::Debug for BloggerPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BloggerPlatform")
            .field("blog_id", &self.blog_id)
            .field("access_token", &"<redacted>")
            .finish()
    }
}

impl BloggerPlatform {
    /// Read the credentials and refresh the access token if possible.
    #[instrument(level = "info", skip(token_json))]
    pub async fn connect(blog_id: &str, token_json: &str) -> Result<Self, PublishError> {
        let creds = TokenFile::parse(token_json)?;

        let access_token = match creds.refresh_form() {
            Some((token_uri, form)) => {
                let res = CLIENT.post(token_uri).form(&form[..]).send().await?;
                let status = res.status();
                if !status.is_success() {
                    let body = res.text().await.unwrap_or_default();
                    warn!(%status, "Token refresh rejected");
                    return Err(PublishError::Credentials(format!(
                        "token refresh returned HTTP {status}: {}",
                        truncate_for_log(&body, 200)
                    )));
                }
                let refreshed: RefreshResponse = res.json().await?;
                info!("Access token refreshed");
                refreshed.access_token
            }
            None => creds
                .stored_token()
                .map(str::to_string)
                .ok_or_else(|| PublishError::Credentials("no access token and no refresh token".into()))?,
        };

        Ok(Self {
            blog_id: blog_id.to_string(),
            access_token,
            api_base: API_BASE.to_string(),
        })
    }

    fn posts_url(&self) -> String {
        format!("{}/blogs/{}/posts?isDraft=false", self.api_base, self.blog_id)
    }
}

impl BlogPlatform for BloggerPlatform {
    #[instrument(level = "info", skip_all, fields(blog_id = %self.blog_id))]
    async fn create_entry(&self, title: &str, html: &str, labels: &[String]) -> Result<String, PublishError> {
        let body = PostBody {
            kind: "blogger#post",
            title,
            content: html,
            labels,
        };
        let res = CLIENT
            .post(self.posts_url())
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(PublishError::Rejected {
                status: status.as_u16(),
                body: truncate_for_log(&body, 500),
            });
        }
        let created: PostResponse = res.json().await?;
        created.url.filter(|u| !u.is_empty()).ok_or(PublishError::MissingUrl)
    }
}
