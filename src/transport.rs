//! Plain HTTP GETs shared by the feed, stock-photo and download paths.

use crate::error::TransportError;
use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};

/// Process-wide client with a browser-like UA and a hard timeout. The
/// timeout is the only cancellation a network call gets.
pub static CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!(
            "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) ",
            "AppleWebKit/537.36 (KHTML, like Gecko) ",
            "Chrome/127.0.0.0 Safari/537.36"
        ))
        .timeout(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .expect("failed to build reqwest client")
});

/// Fetch a URL's body.
pub trait Transport {
    /// GET `url` with extra `headers`; non-2xx statuses are errors.
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, TransportError>;
}

/// [`Transport`] over the shared [`CLIENT`].
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

impl Transport for HttpTransport {
    #[instrument(level = "debug", skip(self, headers))]
    async fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<Vec<u8>, TransportError> {
        let t0 = Instant::now();
        let mut req = CLIENT.get(url);
        for (name, value) in headers {
            req = req.header(*name, *value);
        }
        let res = req.send().await?;

        let status = res.status();
        if !status.is_success() {
            warn!(%status, elapsed_ms = t0.elapsed().as_millis() as u64, "GET returned non-success status");
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let bytes = res.bytes().await?;
        debug!(%status, bytes = bytes.len(), elapsed_ms = t0.elapsed().as_millis() as u64, "GET complete");
        Ok(bytes.to_vec())
    }
}
