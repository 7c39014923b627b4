//! Adapter for marketplaces crawled through their search pages
//!
//! A `CrawlerSource` consults the site's robots.txt once, then for every
//! query:
//!
//! 1. Builds a search string from the card identity plus a game keyword
//! 2. Waits for the per-source crawl delay and fetches the search page
//! 3. Extracts listings, then enriches the first few from their detail pages
//! 4. Summarizes the listing prices into one observation
//!
//! Extracted listings are cached per search string, so repeated queries do
//! not touch the site until the entry expires. Detail pages are fetched only
//! while the attempt has time left; the search listings alone are enough to
//! price a card.

use crate::cache::TtlCache;
use crate::config::{CrawlerConfig, CrawlerSourceConfig, UserAgentConfig};
use crate::crawler::{fetch_page, Extractor, RateGate, SelectorExtractor};
use crate::model::{
    CardQuery, CrawlerSearchResult, ObservationSource, PriceObservation, PriceStats,
};
use crate::robots::{load_policy, PolicyRequest, RobotsPolicy};
use crate::sources::{PriceSource, SourceKind};
use crate::{PriceError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::OnceCell;
use tokio::time::Instant;
use url::Url;

/// Game keywords appended to search strings when no override is configured
pub fn default_game_keywords() -> HashMap<String, String> {
    [
        ("pokemon", "ポケモンカード"),
        ("yugioh", "遊戯王"),
        ("onepiece", "ワンピースカード"),
        ("duelmasters", "デュエマ"),
        ("weiss", "ヴァイスシュヴァルツ"),
        ("mtg", "MTG"),
        ("magic", "MTG"),
    ]
    .into_iter()
    .map(|(game, keyword)| (game.to_string(), keyword.to_string()))
    .collect()
}

/// Marketplace reached by crawling its search results
pub struct CrawlerSource {
    name: String,
    base_url: Url,
    search_path: String,
    query_param: String,
    currency: String,
    fallback_base_price: Option<f64>,
    keywords: HashMap<String, String>,
    agent_name: String,
    settings: CrawlerConfig,
    client: Client,
    extractor: Box<dyn Extractor>,
    gate: RateGate,
    policy: OnceCell<RobotsPolicy>,
    searches: TtlCache<Vec<CrawlerSearchResult>>,
    denial_logged: AtomicBool,
}

impl CrawlerSource {
    /// Creates a crawler source with the selector-driven extractor
    ///
    /// # Arguments
    ///
    /// * `config` - The source's own configuration
    /// * `settings` - Crawl settings shared by all crawler sources
    /// * `user_agent` - Identity matched against robots.txt groups
    /// * `search_ttl` - Lifetime of cached search results
    /// * `client` - Shared HTTP client
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlerSource)` - Ready to crawl
    /// * `Err(PriceError)` - Invalid base URL or selector
    pub fn new(
        config: &CrawlerSourceConfig,
        settings: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        search_ttl: Duration,
        client: Client,
    ) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)?;
        let extractor = SelectorExtractor::new(
            &config.name,
            &config.currency,
            base_url.clone(),
            &config.selectors,
        )?;

        Self::with_extractor(
            config,
            settings,
            user_agent,
            search_ttl,
            client,
            Box::new(extractor),
        )
    }

    /// Creates a crawler source with a custom extractor
    pub fn with_extractor(
        config: &CrawlerSourceConfig,
        settings: &CrawlerConfig,
        user_agent: &UserAgentConfig,
        search_ttl: Duration,
        client: Client,
        extractor: Box<dyn Extractor>,
    ) -> Result<Self> {
        let mut keywords = default_game_keywords();
        for (game, keyword) in &config.keywords {
            keywords.insert(game.to_lowercase(), keyword.clone());
        }

        Ok(Self {
            name: config.name.clone(),
            base_url: Url::parse(&config.base_url)?,
            search_path: config.search_path.clone(),
            query_param: config.query_param.clone(),
            currency: config.currency.clone(),
            fallback_base_price: config.fallback_base_price,
            keywords,
            agent_name: user_agent.crawler_name.clone(),
            settings: settings.clone(),
            client,
            extractor,
            gate: RateGate::new(),
            policy: OnceCell::new(),
            searches: TtlCache::new(search_ttl),
            denial_logged: AtomicBool::new(false),
        })
    }

    /// Builds the site search string for a card
    ///
    /// Name, series, card number and the game keyword are joined with
    /// spaces; absent parts and unknown game types are skipped.
    pub fn search_term(&self, query: &CardQuery) -> String {
        let keyword = query
            .game_type
            .as_deref()
            .and_then(|game| self.keywords.get(&game.trim().to_lowercase()))
            .map(String::as_str);

        [
            Some(query.name.trim()),
            query.series.as_deref(),
            query.card_number.as_deref(),
            keyword,
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }

    /// The source's robots policy, fetched on first use
    pub async fn policy(&self) -> &RobotsPolicy {
        self.policy
            .get_or_init(|| async {
                let request = PolicyRequest {
                    base_url: &self.base_url,
                    agent_name: &self.agent_name,
                    search_path: &self.search_path,
                    min_delay_ms: self.settings.min_crawl_delay_ms,
                    timeout: Duration::from_millis(self.settings.robots_timeout_ms),
                };
                load_policy(&self.client, &request).await
            })
            .await
    }

    fn search_url(&self, term: &str) -> Result<Url> {
        let mut url = self.base_url.join(&self.search_path)?;
        url.query_pairs_mut().append_pair(&self.query_param, term);
        Ok(url)
    }

    /// Fetches one page while holding the source's rate gate
    async fn gated_fetch(&self, url: &Url, delay: Duration, timeout: Duration) -> Result<String> {
        let ticket = self.gate.acquire(delay).await;
        if !ticket.waited().is_zero() {
            tracing::trace!("{}: waited {:?} before {}", self.name, ticket.waited(), url);
        }
        let body = fetch_page(&self.client, url, &self.name, timeout).await;
        drop(ticket);
        body
    }

    /// Searches the site and enriches the leading listings
    ///
    /// Listings are cached as soon as they are extracted. Enrichment stops at
    /// `deadline`, keeping whatever details were filled in by then.
    async fn search(
        &self,
        term: &str,
        policy: &RobotsPolicy,
        timeout: Duration,
        deadline: Instant,
    ) -> Result<Vec<CrawlerSearchResult>> {
        if let Some(cached) = self.searches.get(term) {
            tracing::debug!("{}: using cached listings for '{}'", self.name, term);
            return Ok(cached);
        }

        let url = self.search_url(term)?;
        tracing::debug!("{}: searching {}", self.name, url);

        let html = self.gated_fetch(&url, policy.crawl_delay(), timeout).await?;
        let mut listings = self
            .extractor
            .extract_listings(&html, self.settings.max_results);

        if listings.is_empty() {
            return Ok(listings);
        }
        self.searches.set(term, listings.clone());

        let enrich = self.enrich(&mut listings, policy, timeout, deadline);
        if tokio::time::timeout_at(deadline, enrich).await.is_err() {
            tracing::debug!("{}: detail enrichment cut short for '{}'", self.name, term);
        }

        self.searches.set(term, listings.clone());
        Ok(listings)
    }

    /// Fills detail fields for the first `detail_limit` listings
    ///
    /// Detail pages disallowed by robots.txt are skipped. A failed detail
    /// fetch leaves the listing as extracted. Stops early when the crawl
    /// delay before the next page would run past `deadline`.
    async fn enrich(
        &self,
        listings: &mut [CrawlerSearchResult],
        policy: &RobotsPolicy,
        timeout: Duration,
        deadline: Instant,
    ) {
        let delay = policy.crawl_delay();
        for listing in listings.iter_mut().take(self.settings.detail_limit) {
            let Some(item_url) = listing.item_url.clone() else {
                continue;
            };

            if !policy.is_allowed(&item_url) {
                tracing::debug!("{}: detail page disallowed: {}", self.name, item_url);
                continue;
            }

            let url = match Url::parse(&item_url) {
                Ok(url) => url,
                Err(e) => {
                    tracing::debug!("{}: bad detail URL {}: {}", self.name, item_url, e);
                    continue;
                }
            };

            let wait = self.gate.time_until_next_request(delay).unwrap_or_default();
            if Instant::now() + wait >= deadline {
                tracing::debug!("{}: no time left for detail pages", self.name);
                break;
            }

            match self.gated_fetch(&url, delay, timeout).await {
                Ok(html) => listing.apply_detail(self.extractor.extract_detail(&html)),
                Err(e) => tracing::debug!("{}: detail fetch failed: {}", self.name, e),
            }
        }
    }
}

#[async_trait]
impl PriceSource for CrawlerSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Crawler
    }

    async fn fetch(&self, query: &CardQuery, timeout: Duration) -> Result<PriceObservation> {
        // Leave a tenth of the attempt for summarizing what was collected
        let deadline = Instant::now() + (timeout - timeout / 10);
        let policy = self.policy().await;

        if !policy.allowed_for_search {
            if !self.denial_logged.swap(true, Ordering::Relaxed) {
                tracing::warn!(
                    "{}: robots.txt disallows {} for {}, skipping source",
                    self.name,
                    self.search_path,
                    self.agent_name
                );
            }
            return Err(PriceError::PolicyDenied {
                source_name: self.name.clone(),
                path: self.search_path.clone(),
            });
        }

        let term = self.search_term(query);
        let listings = self.search(&term, policy, timeout, deadline).await?;

        let prices: Vec<f64> = listings.iter().map(|l| l.price).collect();
        let stats = PriceStats::from_prices(&prices).ok_or_else(|| PriceError::NotFound {
            source_name: self.name.clone(),
            query: term.clone(),
        })?;

        tracing::debug!(
            "{}: {} listings for '{}', median {}",
            self.name,
            stats.count,
            term,
            stats.median
        );

        Ok(PriceObservation::from_stats(
            &self.name,
            stats,
            &self.currency,
            ObservationSource::Crawler,
        ))
    }

    /// Placeholder range around the configured base price
    ///
    /// Spans half to twice the base, with the median at the base and the
    /// average slightly above it, mirroring the right skew of real listings.
    fn fallback(&self, _query: &CardQuery) -> Option<PriceObservation> {
        let base = self.fallback_base_price?;
        Some(PriceObservation {
            platform: self.name.clone(),
            average: base * 1.1,
            median: base,
            min: base * 0.5,
            max: base * 2.0,
            currency: self.currency.clone(),
            source: ObservationSource::Fallback,
            observed_at: Utc::now(),
            sample_size: 0,
        })
    }
}
