//! Price sources
//!
//! Every marketplace is reached through one `PriceSource` adapter:
//! - `ApiSource`: marketplaces with a JSON catalog/pricing API
//! - `CrawlerSource`: marketplaces crawled through their search pages
//!
//! Adapters are built once at startup and looked up by name through the
//! `SourceRegistry`.

mod api;
mod crawler;
mod registry;

pub use api::ApiSource;
pub use crawler::{default_game_keywords, CrawlerSource};
pub use registry::SourceRegistry;

use crate::model::{CardQuery, PriceObservation};
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;

/// How a source obtains its prices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Api,
    Crawler,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Api => f.write_str("api"),
            SourceKind::Crawler => f.write_str("crawler"),
        }
    }
}

/// Uniform contract every marketplace adapter implements
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Identifier used in requests, cache keys and results
    fn name(&self) -> &str;

    fn kind(&self) -> SourceKind;

    /// Fetches one price observation for the card
    ///
    /// # Errors
    ///
    /// * `NotFound` - The source answered but had no usable price points
    /// * `Upstream`, `Http`, `Timeout` - Transport or HTTP failure
    /// * `PolicyDenied` - robots.txt forbids crawling the search endpoint
    async fn fetch(&self, query: &CardQuery, timeout: Duration) -> Result<PriceObservation>;

    /// Placeholder observation substituted when every attempt failed
    ///
    /// Sources without a fallback return `None` and simply contribute nothing.
    fn fallback(&self, _query: &CardQuery) -> Option<PriceObservation> {
        None
    }
}
