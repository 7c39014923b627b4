//! Request orchestration
//!
//! One `get_card_prices` call moves through these states:
//!
//! ```text
//! CacheCheck ─hit─▶ Done
//!     │
//!    miss
//!     ▼
//! Dispatching ─▶ Collecting ─▶ Aggregating ─▶ CacheWrite ─▶ Done
//! ```
//!
//! Dispatching starts one retry-wrapped, individually timed-out call per
//! requested source and waits for all of them to settle. A source that
//! fails contributes nothing (or its fallback observation); the request
//! only fails when no source contributed.

use crate::cache::{cache_key, KeyValueStore, ResultCache, SqliteStore};
use crate::config::{Config, RetryConfig};
use crate::crawler::build_http_client;
use crate::model::{AggregatedPriceResult, CardQuery, PriceObservation};
use crate::pricing::aggregate::aggregate;
use crate::pricing::retry::{with_retry, RetryPolicy};
use crate::sources::{PriceSource, SourceRegistry};
use crate::{PriceError, Result};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Per-request knobs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceOptions {
    /// Sources to ask; `None` means every active source
    pub sources: Option<Vec<String>>,

    /// Read and write the result cache
    pub use_cache: bool,

    /// Attempts per source, including the first
    pub max_retries: u32,

    /// Bound on each individual source attempt (milliseconds)
    pub timeout_ms: u64,
}

impl Default for PriceOptions {
    fn default() -> Self {
        Self {
            sources: None,
            use_cache: true,
            max_retries: 3,
            timeout_ms: 20_000,
        }
    }
}

impl PriceOptions {
    /// Options carrying the configured retry and timeout settings
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.retry.max_attempts,
            timeout_ms: config.http.request_timeout_ms,
            ..Self::default()
        }
    }
}

/// Entry point for price lookups
pub struct PriceOrchestrator {
    registry: SourceRegistry,
    cache: ResultCache,
    base_delay: Duration,
}

impl PriceOrchestrator {
    /// Creates an orchestrator from prepared parts
    pub fn new(registry: SourceRegistry, cache: ResultCache, retry: &RetryConfig) -> Self {
        Self {
            registry,
            cache,
            base_delay: Duration::from_millis(retry.base_delay_ms),
        }
    }

    /// Builds the HTTP client, every active source and the result cache
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    ///
    /// # Returns
    ///
    /// * `Ok(PriceOrchestrator)` - Ready to serve lookups
    /// * `Err(PriceError)` - The client, a source or the cache database
    ///   could not be set up
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(&config.user_agent, &config.http)?;
        let registry = SourceRegistry::from_config(config, client)?;

        let ttl = Duration::from_secs(config.cache.price_ttl_secs);
        let cache = match &config.cache.database_path {
            Some(path) => {
                let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::new(Path::new(path))?);
                ResultCache::with_store(ttl, store)
            }
            None => ResultCache::new(ttl),
        };

        Ok(Self::new(registry, cache, &config.retry))
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Looks up a card's price across sources
    ///
    /// # Arguments
    ///
    /// * `query` - The card to price
    /// * `options` - Source selection, caching, retry and timeout settings
    ///
    /// # Returns
    ///
    /// * `Ok(AggregatedPriceResult)` - At least one source contributed
    /// * `Err(PriceError::AllSourcesFailed)` - No source produced an
    ///   observation; nothing is cached
    pub async fn get_card_prices(
        &self,
        query: &CardQuery,
        options: &PriceOptions,
    ) -> Result<AggregatedPriceResult> {
        let requested = self.requested_sources(options);
        let key = cache_key(query, &requested);

        tracing::debug!("CacheCheck: {} ({})", query, key);
        if options.use_cache {
            if let Some(hit) = self.cache.get(&key) {
                tracing::debug!("Done: cache hit for {}", query);
                return Ok(hit);
            }
        }

        tracing::debug!("Dispatching: {} source(s): {:?}", requested.len(), requested);
        let policy = RetryPolicy::new(options.max_retries, self.base_delay);
        let timeout = Duration::from_millis(options.timeout_ms);

        let settled = join_all(
            requested
                .iter()
                .map(|name| self.observe(name, query, policy, timeout)),
        )
        .await;

        let observations: Vec<PriceObservation> = settled.into_iter().flatten().collect();
        tracing::debug!(
            "Collecting: {} of {} source(s) contributed",
            observations.len(),
            requested.len()
        );
        if observations.is_empty() {
            return Err(PriceError::AllSourcesFailed {
                attempted: requested,
            });
        }

        tracing::debug!("Aggregating: {} observation(s)", observations.len());
        let result = aggregate(observations)?;

        if options.use_cache {
            tracing::debug!("CacheWrite: {}", key);
            self.cache.set(&key, result.clone());
        }

        tracing::debug!("Done: {} from {:?}", query, result.platforms_used);
        Ok(result)
    }

    /// Requested source names, de-duplicated in request order
    fn requested_sources(&self, options: &PriceOptions) -> Vec<String> {
        let names = options
            .sources
            .clone()
            .unwrap_or_else(|| self.registry.names());

        let mut seen = std::collections::HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Asks one source, substituting its fallback when it fails
    async fn observe(
        &self,
        name: &str,
        query: &CardQuery,
        policy: RetryPolicy,
        timeout: Duration,
    ) -> Option<PriceObservation> {
        let Some(source) = self.registry.get(name) else {
            tracing::warn!("Unknown or inactive source requested: {}", name);
            return None;
        };

        match fetch_with_retry(source.as_ref(), query, policy, timeout).await {
            Ok(observation) => Some(observation),
            // Logged once by the source itself
            Err(PriceError::PolicyDenied { .. }) => None,
            Err(e) => match source.fallback(query) {
                Some(fallback) => {
                    tracing::warn!("{}: {}; using fallback estimate", name, e);
                    Some(fallback)
                }
                None => {
                    tracing::warn!("{}: {}", name, e);
                    None
                }
            },
        }
    }
}

/// Runs a source fetch under the retry policy, bounding every attempt
async fn fetch_with_retry(
    source: &dyn PriceSource,
    query: &CardQuery,
    policy: RetryPolicy,
    timeout: Duration,
) -> Result<PriceObservation> {
    with_retry(policy, source.name(), || async move {
        match tokio::time::timeout(timeout, source.fetch(query, timeout)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PriceError::Timeout {
                url: format!("{} ({:?})", source.name(), timeout),
            }),
        }
    })
    .await
}
