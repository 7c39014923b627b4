use serde::Deserialize;
use std::collections::HashMap;

/// Main configuration structure for Price-Ripple
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub user_agent: UserAgentConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub crawler: CrawlerConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default, rename = "api-source")]
    pub api_sources: Vec<ApiSourceConfig>,

    #[serde(default, rename = "crawler-source")]
    pub crawler_sources: Vec<CrawlerSourceConfig>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler, also matched against robots.txt groups
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value
    ///
    /// Format: `CrawlerName/Version (+ContactURL; ContactEmail)`
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Shared HTTP client settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct HttpConfig {
    /// Upper bound for any single request (milliseconds)
    pub request_timeout_ms: u64,

    /// Refuse plain-HTTP URLs
    pub https_only: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 20_000,
            https_only: true,
        }
    }
}

/// Crawler politeness and extraction limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Timeout for fetching robots.txt (milliseconds)
    pub robots_timeout_ms: u64,

    /// Floor applied to any Crawl-delay read from robots.txt (milliseconds)
    pub min_crawl_delay_ms: u64,

    /// Maximum listings kept from one search page
    pub max_results: usize,

    /// Number of listings enriched from their detail pages
    pub detail_limit: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            robots_timeout_ms: 5_000,
            min_crawl_delay_ms: 1_000,
            max_results: 20,
            detail_limit: 5,
        }
    }
}

/// Per-source retry behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct RetryConfig {
    /// Total attempts per source, including the first
    pub max_attempts: u32,

    /// Delay multiplied by the attempt index between attempts (milliseconds)
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheConfig {
    /// Lifetime of aggregated price results (seconds)
    pub price_ttl_secs: u64,

    /// Lifetime of raw crawler search results (seconds)
    pub search_ttl_secs: u64,

    /// Optional SQLite file that persists price results across restarts
    pub database_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            price_ttl_secs: 30 * 60,
            search_ttl_secs: 30 * 60,
            database_path: None,
        }
    }
}

/// A marketplace reachable through a JSON catalog/pricing API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiSourceConfig {
    /// Source identifier used in requests and results
    pub name: String,

    /// API root (e.g., "https://api.example.com")
    pub base_url: String,

    /// Inline credential; takes precedence over `api-key-env`
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the credential
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Currency of the returned prices
    #[serde(default = "default_api_currency")]
    pub currency: String,

    /// Number of catalog candidates considered for the name match
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl ApiSourceConfig {
    /// Resolves the credential from the inline key or the environment
    ///
    /// A source without a resolvable credential is inactive.
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }

        self.api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok())
            .filter(|k| !k.trim().is_empty())
    }
}

/// A marketplace without an API, priced by crawling its search pages
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerSourceConfig {
    /// Source identifier used in requests and results
    pub name: String,

    /// Site root (e.g., "https://jp.mercari.com")
    pub base_url: String,

    /// Path of the search endpoint, checked against robots.txt
    #[serde(default = "default_search_path")]
    pub search_path: String,

    /// Query-string parameter carrying the search term
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// Currency listings are priced in
    #[serde(default = "default_crawler_currency")]
    pub currency: String,

    /// Base price for the synthetic fallback; no fallback when absent
    #[serde(default)]
    pub fallback_base_price: Option<f64>,

    /// CSS selectors locating listing and detail fields
    pub selectors: SelectorConfig,

    /// Game-type to search keyword overrides, merged over the built-in table
    #[serde(default)]
    pub keywords: HashMap<String, String>,
}

/// CSS selectors for one crawled site
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SelectorConfig {
    /// Repeated container wrapping each listing
    pub item: String,

    /// Listing title, relative to the item
    pub title: String,

    /// Element whose text holds the price token, relative to the item
    pub price: String,

    /// Image element (`src` or `data-src`), relative to the item
    #[serde(default)]
    pub image: Option<String>,

    /// Anchor leading to the detail page, relative to the item; the item
    /// itself is used when it is an anchor and this is absent
    #[serde(default)]
    pub link: Option<String>,

    /// Detail page: item condition
    #[serde(default)]
    pub condition: Option<String>,

    /// Detail page: item description
    #[serde(default)]
    pub description: Option<String>,

    /// Detail page: seller name
    #[serde(default)]
    pub seller: Option<String>,
}

fn default_api_currency() -> String {
    "USD".to_string()
}

fn default_crawler_currency() -> String {
    "JPY".to_string()
}

fn default_search_limit() -> usize {
    10
}

fn default_search_path() -> String {
    "/search".to_string()
}

fn default_query_param() -> String {
    "keyword".to_string()
}
