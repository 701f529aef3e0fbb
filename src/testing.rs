// Test doubles for every collaborator seam.
//
// Each fake records its calls so tests can assert on order and on whether a
// collaborator was reached at all.

use crate::api::GenerationBackend;
use crate::error::{NotifyError, PublishError, TransportError};
use crate::models::{FailureCause, GenerationRequest, GenerationResult};
use crate::publish::{BlogPlatform, NotifyChannel};
use crate::transport::Transport;
use std::collections::VecDeque;
use std::sync::Mutex;

// =============================================================================
// Transport
// =============================================================================

/// Answers GETs by URL prefix; anything unknown is a 404.
#[derive(Default)]
pub struct FakeTransport {
    routes: Vec<(String, Result<Vec<u8>, u16>)>,
    calls: Mutex<Vec<(String, Vec<(String, String)>)>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, prefix: &str, body: impl Into<Vec<u8>>) -> Self {
        self.routes.push((prefix.to_string(), Ok(body.into())));
        self
    }

    pub fn with_status(mut self, prefix: &str, status: u16) -> Self {
        self.routes.push((prefix.to_string(), Err(status)));
        self
    }

    /// URLs requested, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(u, _)| u.clone()).collect()
    }

    /// Headers sent with the first request whose URL starts with `prefix`.
    pub fn headers_for(&self, prefix: &str) -> Option<Vec<(String, String)>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.starts_with(prefix))
            .map(|(_, h)| h.clone())
    }
}

impl Transport for FakeTransport {
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, TransportError> {
        self.calls.lock().unwrap().push((
            url.to_string(),
            headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        ));
        let route = self
            .routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match route {
            Some((_, Ok(body))) => Ok(body.clone()),
            Some((_, Err(status))) => Err(TransportError::Status {
                status: *status,
                url: url.to_string(),
            }),
            None => Err(TransportError::Status {
                status: 404,
                url: url.to_string(),
            }),
        }
    }
}

/// Minimal RSS document with one `<item>` per `(title, description)`.
pub fn rss_feed(items: &[(&str, &str)]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Test</title>"#);
    for (title, description) in items {
        xml.push_str(&format!(
            "<item><title>{title}</title><description>{description}</description></item>"
        ));
    }
    xml.push_str("</channel></rss>");
    xml
}

// =============================================================================
// Generation backends
// =============================================================================

#[derive(Debug, Clone)]
pub enum Outcome {
    Success(String),
    Blocked(String),
    Fail(FailureCause),
}

/// Plays its outcomes in order, repeating the last one.
pub struct ScriptedBackend {
    id: String,
    script: Mutex<VecDeque<Outcome>>,
    calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn new(id: &str, script: Vec<Outcome>) -> Self {
        Self {
            id: id.to_string(),
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl GenerationBackend for ScriptedBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn generate(&self, _request: &GenerationRequest) -> GenerationResult {
        *self.calls.lock().unwrap() += 1;
        let outcome = {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front()
            } else {
                script.front().cloned()
            }
        };
        let backend_id = self.id.clone();
        match outcome {
            Some(Outcome::Success(raw_text)) => GenerationResult::Success { backend_id, raw_text },
            Some(Outcome::Blocked(reason)) => GenerationResult::Blocked { backend_id, reason },
            Some(Outcome::Fail(cause)) => GenerationResult::Failure { backend_id, cause },
            None => GenerationResult::Failure {
                backend_id,
                cause: FailureCause::Transport("empty script".into()),
            },
        }
    }
}

// =============================================================================
// Blog platform
// =============================================================================

#[derive(Debug, Clone)]
pub struct PostCall {
    pub title: String,
    pub html: String,
    pub labels: Vec<String>,
}

/// Accepts every post with a fixed URL, or rejects every post.
pub struct FakePlatform {
    post_url: Option<String>,
    calls: Mutex<Vec<PostCall>>,
}

impl FakePlatform {
    pub fn accepting(post_url: &str) -> Self {
        Self {
            post_url: Some(post_url.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn rejecting() -> Self {
        Self {
            post_url: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<PostCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl BlogPlatform for FakePlatform {
    async fn create_entry(&self, title: &str, html: &str, labels: &[String]) -> Result<String, PublishError> {
        self.calls.lock().unwrap().push(PostCall {
            title: title.to_string(),
            html: html.to_string(),
            labels: labels.to_vec(),
        });
        match &self.post_url {
            Some(url) => Ok(url.clone()),
            None => Err(PublishError::Rejected {
                status: 403,
                body: "forbidden".into(),
            }),
        }
    }
}

// =============================================================================
// Notification channel
// =============================================================================

#[derive(Debug, Clone)]
pub struct PhotoCall {
    pub bytes: usize,
    pub caption: String,
}

pub struct FakeChannel {
    fail: bool,
    calls: Mutex<Vec<PhotoCall>>,
}

impl FakeChannel {
    pub fn working() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<PhotoCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl NotifyChannel for FakeChannel {
    async fn send_photo(&self, image: &[u8], caption: &str) -> Result<(), NotifyError> {
        self.calls.lock().unwrap().push(PhotoCall {
            bytes: image.len(),
            caption: caption.to_string(),
        });
        if self.fail {
            Err(NotifyError::Refused("chat not found".into()))
        } else {
            Ok(())
        }
    }
}
