//! Keyword search against a Pexels-style stock photo API.

use crate::config::ImageConfig;
use crate::transport::Transport;
use serde::Deserialize;
use tracing::{info, instrument, warn};
use url::Url;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct SearchResponse {
    photos: Vec<Photo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Photo {
    width: u32,
    height: u32,
    src: PhotoSrc,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PhotoSrc {
    landscape: Option<String>,
    large: Option<String>,
    original: Option<String>,
}

pub fn search_url(endpoint: &str, query: &str, per_page: u32) -> Result<Url, url::ParseError> {
    Url::parse_with_params(
        endpoint,
        &[
            ("query", query),
            ("per_page", &per_page.to_string()),
            ("orientation", "landscape"),
        ],
    )
}

/// Display URL of the first result wider than it is tall.
pub fn first_landscape(body: &[u8]) -> Result<Option<String>, serde_json::Error> {
    let response: SearchResponse = serde_json::from_slice(body)?;
    Ok(response
        .photos
        .into_iter()
        .filter(|p| p.width > p.height)
        .find_map(|p| p.src.landscape.or(p.src.large).or(p.src.original)))
}

pub fn default_photo_url(id: u64) -> String {
    format!("https://images.pexels.com/photos/{id}/pexels-photo-{id}.jpeg?auto=compress&cs=tinysrgb&w=1260&h=750")
}

/// Search for `query`. `None` means the service could not be asked or did
/// not answer sensibly; an empty result set yields the default photo.
#[instrument(level = "info", skip(transport, config, api_key))]
pub async fn search<T: Transport>(
    transport: &T,
    config: &ImageConfig,
    query: &str,
    api_key: &str,
) -> Option<String> {
    let url = match search_url(&config.stock_endpoint, query, config.stock_per_page) {
        Ok(url) => url,
        Err(e) => {
            warn!(error = %e, endpoint = %config.stock_endpoint, "Bad stock endpoint");
            return None;
        }
    };

    let body = match transport.get(url.as_str(), &[("Authorization", api_key)]).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, "Stock search failed");
            return None;
        }
    };

    match first_landscape(&body) {
        Ok(Some(found)) => {
            info!(url = %found, "Stock photo found");
            Some(found)
        }
        Ok(None) => {
            info!(id = config.stock_default_photo_id, "No landscape result; using default photo");
            Some(default_photo_url(config.stock_default_photo_id))
        }
        Err(e) => {
            warn!(error = %e, "Stock response not understood");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeTransport;

    const RESULTS: &str = r#"{"page":1,"per_page":5,"photos":[
        {"id":1,"width":600,"height":900,"src":{"original":"https://p/1.jpg","landscape":"https://p/1-land.jpg"}},
        {"id":2,"width":1600,"height":900,"src":{"original":"https://p/2.jpg","landscape":"https://p/2-land.jpg"}},
        {"id":3,"width":1800,"height":900,"src":{"original":"https://p/3.jpg","landscape":"https://p/3-land.jpg"}}
    ]}"#;

    #[test]
    fn test_first_landscape_skips_portrait() {
        assert_eq!(
            first_landscape(RESULTS.as_bytes()).unwrap().as_deref(),
            Some("https://p/2-land.jpg")
        );
    }

    #[test]
    fn test_first_landscape_empty() {
        assert_eq!(first_landscape(br#"{"photos":[]}"#).unwrap(), None);
        assert_eq!(first_landscape(br#"{"total_results":0}"#).unwrap(), None);
    }

    #[test]
    fn test_search_url_params() {
        let url = search_url("https://api.pexels.com/v1/search", "trade summit", 5).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.pexels.com/v1/search?query=trade+summit&per_page=5&orientation=landscape"
        );
    }

    #[tokio::test]
    async fn test_search_sends_key_and_picks_landscape() {
        let config = ImageConfig::default();
        let transport = FakeTransport::new().with_body(&config.stock_endpoint, RESULTS);
        let found = search(&transport, &config, "summit", "px-key").await;
        assert_eq!(found.as_deref(), Some("https://p/2-land.jpg"));
        let headers = transport.headers_for(&config.stock_endpoint).unwrap();
        assert_eq!(headers, vec![("Authorization".to_string(), "px-key".to_string())]);
    }

    #[tokio::test]
    async fn test_search_empty_uses_default_photo() {
        let config = ImageConfig::default();
        let transport = FakeTransport::new().with_body(&config.stock_endpoint, r#"{"photos":[]}"#);
        let found = search(&transport, &config, "nothing", "k").await.unwrap();
        assert_eq!(found, default_photo_url(config.stock_default_photo_id));
    }

    #[tokio::test]
    async fn test_search_error_is_none() {
        let config = ImageConfig::default();
        let transport = FakeTransport::new().with_status(&config.stock_endpoint, 401);
        assert_eq!(search(&transport, &config, "x", "bad").await, None);
    }
}
