//! Price-Ripple: a polite multi-source card price aggregator
//!
//! This crate looks up a trading card's market price across several sources,
//! some backed by marketplace APIs and some by crawling marketplaces that have
//! no API. Crawling respects robots.txt and per-source rate limits, failures
//! are tolerated per source, and results are cached and combined into one
//! price summary.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod model;
pub mod pricing;
pub mod robots;
pub mod sources;

use thiserror::Error;

/// Main error type for Price-Ripple operations
#[derive(Debug, Error)]
pub enum PriceError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No listings found on {source_name} for '{query}'")]
    NotFound { source_name: String, query: String },

    #[error("Upstream error from {source_name}: {message}")]
    Upstream {
        source_name: String,
        message: String,
    },

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Crawling {path} on {source_name} is disallowed by robots.txt")]
    PolicyDenied { source_name: String, path: String },

    #[error("No price observations to aggregate")]
    NoData,

    #[error("All requested sources failed: {attempted:?}")]
    AllSourcesFailed { attempted: Vec<String> },

    #[error("Storage error: {0}")]
    Storage(#[from] cache::StorageError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PriceError {
    /// Whether another attempt against the same source could succeed
    ///
    /// Missing listings and robots denials are stable answers; transport
    /// failures, timeouts and throttling are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PriceError::Upstream { .. }
                | PriceError::Http { .. }
                | PriceError::Timeout { .. }
                | PriceError::Reqwest(_)
        )
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector in config: {0}")]
    InvalidSelector(String),
}

/// Result type alias for Price-Ripple operations
pub type Result<T> = std::result::Result<T, PriceError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{AggregatedPriceResult, CardQuery, ObservationSource, PriceObservation};
pub use pricing::{PriceOptions, PriceOrchestrator};
