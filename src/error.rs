//! Error types for page packing and resource fetching.

use std::time::Duration;

use thiserror::Error;

/// Fatal errors that abort a pack run.
#[derive(Debug, Error)]
pub enum PackError {
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("failed to launch browser: {0}")]
    BrowserLaunch(String),

    #[error("browser error: {0}")]
    Browser(String),

    #[error("could not load page with any strategy (tried: {})", tried.join(", "))]
    PageLoad { tried: Vec<String> },

    #[error("page script failed ({step}): {message}")]
    Script { step: &'static str, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to fetch page {url}: {source}")]
    PageFetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

#[cfg(feature = "browser")]
impl From<chromiumoxide::error::CdpError> for PackError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        PackError::Browser(err.to_string())
    }
}

/// Failure of a single resource download. Never fatal.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("body exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("empty body")]
    Empty,
}

impl FetchError {
    /// Whether another attempt could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Status(code) => !matches!(code, 404 | 410),
            FetchError::Network(_) | FetchError::Timeout(_) => true,
            FetchError::TooLarge { .. } | FetchError::Empty => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(timeout)
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_final() {
        assert!(!FetchError::Status(404).is_retryable());
        assert!(!FetchError::Status(410).is_retryable());
        assert!(FetchError::Status(503).is_retryable());
        assert!(FetchError::Status(403).is_retryable());
    }

    #[test]
    fn test_size_and_empty_are_final() {
        assert!(!FetchError::TooLarge { limit: 10 }.is_retryable());
        assert!(!FetchError::Empty.is_retryable());
        assert!(FetchError::Network("reset".into()).is_retryable());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_retryable());
    }

    #[test]
    fn test_page_load_lists_strategies() {
        let err = PackError::PageLoad {
            tried: vec!["load".into(), "domcontentloaded".into()],
        };
        assert_eq!(
            err.to_string(),
            "could not load page with any strategy (tried: load, domcontentloaded)"
        );
    }
}
