//! Shared fixtures for the integration tests

use price_ripple::config::{
    ApiSourceConfig, CacheConfig, Config, CrawlerConfig, CrawlerSourceConfig, HttpConfig,
    RetryConfig, SelectorConfig, UserAgentConfig,
};
use price_ripple::PriceOptions;
use serde_json::json;
use std::collections::HashMap;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_KEY: &str = "test-key";

pub fn user_agent() -> UserAgentConfig {
    UserAgentConfig {
        crawler_name: "TestBot".to_string(),
        crawler_version: "1.0.0".to_string(),
        contact_url: "https://example.com/contact".to_string(),
        contact_email: "test@example.com".to_string(),
    }
}

/// Configuration with short delays and plain HTTP allowed for mock servers
pub fn test_config() -> Config {
    Config {
        user_agent: user_agent(),
        http: HttpConfig {
            request_timeout_ms: 5_000,
            https_only: false,
        },
        crawler: CrawlerConfig {
            robots_timeout_ms: 2_000,
            min_crawl_delay_ms: 10, // Very short for testing
            max_results: 20,
            detail_limit: 5,
        },
        retry: RetryConfig {
            max_attempts: 2,
            base_delay_ms: 10,
        },
        cache: CacheConfig {
            price_ttl_secs: 60,
            search_ttl_secs: 60,
            database_path: None,
        },
        api_sources: vec![],
        crawler_sources: vec![],
    }
}

pub fn api_source(name: &str, base_url: &str) -> ApiSourceConfig {
    ApiSourceConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        api_key: Some(API_KEY.to_string()),
        api_key_env: None,
        currency: "USD".to_string(),
        search_limit: 10,
    }
}

pub fn crawler_source(name: &str, base_url: &str) -> CrawlerSourceConfig {
    CrawlerSourceConfig {
        name: name.to_string(),
        base_url: base_url.to_string(),
        search_path: "/search".to_string(),
        query_param: "keyword".to_string(),
        currency: "JPY".to_string(),
        fallback_base_price: None,
        selectors: SelectorConfig {
            item: ".item".to_string(),
            title: ".title".to_string(),
            price: ".price".to_string(),
            image: Some("img".to_string()),
            link: Some("a.link".to_string()),
            condition: Some(".condition".to_string()),
            description: None,
            seller: Some(".seller".to_string()),
        },
        keywords: HashMap::new(),
    }
}

pub fn options() -> PriceOptions {
    PriceOptions {
        max_retries: 2,
        timeout_ms: 5_000,
        ..PriceOptions::default()
    }
}

/// Mounts a catalog with one product and its listing prices
pub async fn mount_api(server: &MockServer, product_id: &str, name: &str, prices: &[f64]) {
    Mock::given(method("GET"))
        .and(path("/v1/catalog/search"))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                { "productId": "other", "name": "Charizard ex" },
                { "productId": product_id, "name": name }
            ]
        })))
        .mount(server)
        .await;

    let listings: Vec<_> = prices.iter().map(|p| json!({ "price": p })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/v1/pricing/{}", product_id)))
        .and(header("authorization", format!("Bearer {}", API_KEY).as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "currency": "USD",
            "listings": listings
        })))
        .mount(server)
        .await;
}

/// Mounts a robots.txt body
pub async fn mount_robots(server: &MockServer, body: &str) {
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

/// Search results page with one `.item` per (title, price text, href)
pub fn search_page(items: &[(&str, &str, &str)]) -> String {
    let body: String = items
        .iter()
        .map(|(title, price, href)| {
            format!(
                r#"<div class="item">
                    <img src="/img/{title}.jpg" alt="{title}">
                    <span class="title">{title}</span>
                    <span class="price">{price}</span>
                    <a class="link" href="{href}">details</a>
                </div>"#
            )
        })
        .collect();
    format!("<html><body><div class=\"results\">{}</div></body></html>", body)
}

/// Mounts a search page answered for one exact search term
pub async fn mount_search(server: &MockServer, term: &str, html: String) {
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("keyword", term))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html)
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}
