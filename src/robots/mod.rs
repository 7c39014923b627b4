//! Robots.txt handling module
//!
//! This module fetches and parses robots.txt for crawled sources. Loading
//! never fails: any network, HTTP or decoding problem degrades to the
//! conservative default policy.

mod parser;

pub use parser::{RobotsPolicy, DEFAULT_CRAWL_DELAY_MS};

use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Inputs for loading one source's policy
#[derive(Debug, Clone)]
pub struct PolicyRequest<'a> {
    /// Site root the robots.txt is resolved against
    pub base_url: &'a Url,
    /// Crawler name matched against `User-agent` groups
    pub agent_name: &'a str,
    /// Search endpoint path checked for permission
    pub search_path: &'a str,
    /// Floor for the crawl delay (milliseconds)
    pub min_delay_ms: u64,
    /// Bound on the robots.txt request
    pub timeout: Duration,
}

/// Fetches and parses `<base_url>/robots.txt`
///
/// # Arguments
///
/// * `client` - HTTP client carrying the crawler's User-Agent
/// * `request` - Source and agent details
///
/// # Returns
///
/// The parsed policy, or `RobotsPolicy::default_policy` when robots.txt
/// could not be fetched. A 404 means the site publishes no rules, so
/// everything is allowed at the minimum delay.
pub async fn load_policy(client: &Client, request: &PolicyRequest<'_>) -> RobotsPolicy {
    let robots_url = match request.base_url.join("/robots.txt") {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(
                "Cannot build robots.txt URL for {}: {}; using default policy",
                request.base_url,
                e
            );
            return RobotsPolicy::default_policy(request.agent_name);
        }
    };

    tracing::debug!("Fetching robots.txt: {}", robots_url);

    let response = match client
        .get(robots_url.clone())
        .timeout(request.timeout)
        .send()
        .await
    {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(
                "Failed to fetch {}: {}; using default policy",
                robots_url,
                e
            );
            return RobotsPolicy::default_policy(request.agent_name);
        }
    };

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
        tracing::info!("No robots.txt at {}, crawling is unrestricted", robots_url);
        return RobotsPolicy::parse("", request.agent_name, request.search_path, request.min_delay_ms);
    }

    if !status.is_success() {
        tracing::warn!(
            "robots.txt at {} returned HTTP {}; using default policy",
            robots_url,
            status.as_u16()
        );
        return RobotsPolicy::default_policy(request.agent_name);
    }

    match response.text().await {
        Ok(body) => {
            let policy = RobotsPolicy::parse(
                &body,
                request.agent_name,
                request.search_path,
                request.min_delay_ms,
            );
            tracing::info!(
                "Loaded robots.txt for {}: search allowed = {}, crawl delay = {}ms",
                request.base_url,
                policy.allowed_for_search,
                policy.crawl_delay_ms
            );
            policy
        }
        Err(e) => {
            tracing::warn!(
                "Failed to read robots.txt body from {}: {}; using default policy",
                robots_url,
                e
            );
            RobotsPolicy::default_policy(request.agent_name)
        }
    }
}
