//! Error types for the collaborators and the fatal outcomes of a run.
//!
//! Only three things end a run early: no story to write about, no backend
//! willing to write it, and a platform that refuses the post. Everything else
//! degrades into a usable value and is merely logged.

use thiserror::Error;

/// A plain HTTP GET that did not produce a body.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },
}

/// A feed that could not be read.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("malformed XML: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("document is not an RSS or Atom feed")]
    NotAFeed,
}

/// The blog platform did not create the entry.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("platform request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("platform rejected the post with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("platform credentials unusable: {0}")]
    Credentials(String),
    #[error("platform response had no post URL")]
    MissingUrl,
}

/// The notification channel did not accept the photo.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("channel request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("channel refused the photo: {0}")]
    Refused(String),
}

/// Fatal outcomes of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no eligible story in any feed")]
    NoEligibleStory,
    #[error("all {attempts} generation backends failed or refused")]
    BackendsExhausted { attempts: usize },
    #[error("publishing failed: {0}")]
    Publish(#[from] PublishError),
}

impl PipelineError {
    /// Distinct non-zero exit code per failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            PipelineError::NoEligibleStory => 2,
            PipelineError::BackendsExhausted { .. } => 3,
            PipelineError::Publish(_) => 4,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct_and_non_zero() {
        let codes = [
            PipelineError::NoEligibleStory.exit_code(),
            PipelineError::BackendsExhausted { attempts: 2 }.exit_code(),
            PipelineError::Publish(PublishError::MissingUrl).exit_code(),
        ];
        for code in codes {
            assert_ne!(code, 0);
        }
        assert_ne!(codes[0], codes[1]);
        assert_ne!(codes[1], codes[2]);
        assert_ne!(codes[0], codes[2]);
    }

    #[test]
    fn test_error_messages() {
        let e = PipelineError::BackendsExhausted { attempts: 3 };
        assert_eq!(e.to_string(), "all 3 generation backends failed or refused");

        let e = PipelineError::from(PublishError::Rejected {
            status: 403,
            body: "forbidden".into(),
        });
        assert!(e.to_string().contains("HTTP 403"));
    }
}
