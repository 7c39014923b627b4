//! HTTP fetcher implementation
//!
//! This module handles outbound HTTP for the crawler adapters, including:
//! - Building the shared HTTP client with the crawler's User-Agent
//! - GET requests for search and detail pages
//! - Error classification into retryable and terminal failures

use crate::config::{HttpConfig, UserAgentConfig};
use crate::PriceError;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::time::Duration;
use url::Url;

/// Builds an HTTP client with proper configuration
///
/// Every request issued through this client carries the same stable
/// User-Agent identifying the crawler.
///
/// # Arguments
///
/// * `user_agent` - The user agent configuration
/// * `http` - Timeouts and transport restrictions
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use price_ripple::config::{HttpConfig, UserAgentConfig};
/// use price_ripple::crawler::build_http_client;
///
/// let user_agent = UserAgentConfig {
///     crawler_name: "PriceRipple".to_string(),
///     crawler_version: "1.0".to_string(),
///     contact_url: "https://example.com/about".to_string(),
///     contact_email: "admin@example.com".to_string(),
/// };
///
/// let client = build_http_client(&user_agent, &HttpConfig::default()).unwrap();
/// ```
pub fn build_http_client(
    user_agent: &UserAgentConfig,
    http: &HttpConfig,
) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent.header_value())
        .timeout(Duration::from_millis(http.request_timeout_ms))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(5))
        .https_only(http.https_only)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetches a page body with a GET request
///
/// # Error Classification
///
/// | Condition | Error |
/// |-----------|-------|
/// | HTTP 429 | `Upstream` (rate limited, retryable) |
/// | Other non-2xx | `Upstream` with the status code |
/// | Timeout | `Timeout` |
/// | Connection refused | `Upstream` |
/// | Anything else | `Http` |
///
/// # Arguments
///
/// * `client` - The HTTP client to use
/// * `url` - The URL to fetch
/// * `source_name` - Source the request belongs to, for error reporting
/// * `timeout` - Bound on this request
pub async fn fetch_page(
    client: &Client,
    url: &Url,
    source_name: &str,
    timeout: Duration,
) -> Result<String, PriceError> {
    let response = client
        .get(url.clone())
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| classify_transport_error(e, url, source_name))?;

    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(PriceError::Upstream {
            source_name: source_name.to_string(),
            message: format!("rate limited (HTTP 429) at {}", url),
        });
    }

    if !status.is_success() {
        return Err(PriceError::Upstream {
            source_name: source_name.to_string(),
            message: format!("HTTP {} from {}", status.as_u16(), url),
        });
    }

    response
        .text()
        .await
        .map_err(|e| classify_transport_error(e, url, source_name))
}

/// Maps a reqwest failure onto the crate's error taxonomy
pub(crate) fn classify_transport_error(
    error: reqwest::Error,
    url: &Url,
    source_name: &str,
) -> PriceError {
    if error.is_timeout() {
        PriceError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        PriceError::Upstream {
            source_name: source_name.to_string(),
            message: format!("connection failed to {}", url),
        }
    } else {
        PriceError::Http {
            url: url.to_string(),
            source: error,
        }
    }
}
