use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("throttled by {url} with HTTP {status}")]
    Throttled { status: u16, url: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("max_retries_exceeded: {url} failed after {attempts} attempts (last error: {last_error})")]
    MaxRetriesExceeded {
        url: String,
        attempts: u32,
        last_error: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid rule for site {site}: {reason}")]
    InvalidRule { site: String, reason: String },

    #[error("invalid URL \"{url}\": {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Config(#[from] scrapedeck_core::ConfigError),
}
