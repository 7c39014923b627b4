//! End-to-end lookups against mocked crawled marketplaces

use crate::common::{
    crawler_source, mount_robots, mount_search, options, search_page, test_config,
};
use price_ripple::config::Config;
use price_ripple::crawler::build_http_client;
use price_ripple::sources::{CrawlerSource, PriceSource};
use price_ripple::{CardQuery, ObservationSource, PriceError, PriceOptions, PriceOrchestrator};
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const USER_AGENT: &str = "TestBot/1.0.0 (+https://example.com/contact; test@example.com)";

fn build_source(config: &Config) -> CrawlerSource {
    let client = build_http_client(&config.user_agent, &config.http).expect("client");
    CrawlerSource::new(
        &config.crawler_sources[0],
        &config.crawler,
        &config.user_agent,
        Duration::from_secs(config.cache.search_ttl_secs),
        client,
    )
    .expect("crawler source")
}

async fn mount_detail(server: &MockServer, item: &str, condition: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/item/{}", item)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><p class="condition">{}</p><p class="seller">shop-{}</p></body></html>"#,
            condition, item
        )))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_search_and_details() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /item/3\n").await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(wiremock::matchers::query_param("keyword", "Pikachu 025 ポケモンカード"))
        .and(header("user-agent", USER_AGENT))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&[
            ("Pikachu A", "¥1,000", "/item/1"),
            ("Pikachu B", "1,500円", "/item/2"),
            ("Pikachu C", "¥2,000", "/item/3"),
        ])))
        .expect(1)
        .mount(&server)
        .await;

    mount_detail(&server, "1", "Near mint", 1).await;
    mount_detail(&server, "2", "Played", 1).await;
    // Disallowed by robots.txt
    mount_detail(&server, "3", "Damaged", 0).await;

    let mut config = test_config();
    config.crawler_sources = vec![crawler_source("shop", &server.uri())];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let query = CardQuery::new("Pikachu")
        .with_card_number("025")
        .with_game_type("pokemon");
    let result = orchestrator
        .get_card_prices(&query, &options())
        .await
        .expect("crawl should succeed");

    let shop = &result.platforms["shop"];
    assert_eq!(shop.source, ObservationSource::Crawler);
    assert_eq!(shop.currency, "JPY");
    assert_eq!(shop.sample_size, 3);
    assert_eq!(result.min, 1000.0);
    assert_eq!(result.max, 2000.0);
    assert_eq!(result.average, 1500.0);
    assert_eq!(result.median, 1500.0);
}

#[tokio::test]
async fn test_slow_detail_pages_do_not_sink_search() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 1\n").await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&[
            ("Pikachu A", "¥1,000", "/item/1"),
            ("Pikachu B", "¥2,000", "/item/2"),
            ("Pikachu C", "¥3,000", "/item/3"),
        ])))
        .expect(1) // Fetched once, never again on a retry
        .mount(&server)
        .await;

    // One crawl delay fits in the attempt, a second one does not
    mount_detail(&server, "1", "Near mint", 1).await;
    mount_detail(&server, "2", "Played", 0).await;
    mount_detail(&server, "3", "Damaged", 0).await;

    let mut config = test_config();
    config.crawler_sources = vec![crawler_source("shop", &server.uri())];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let tight = PriceOptions {
        timeout_ms: 1_500,
        ..options()
    };
    let result = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu"), &tight)
        .await
        .expect("search listings are enough to price the card");

    let shop = &result.platforms["shop"];
    assert_eq!(shop.source, ObservationSource::Crawler);
    assert_eq!(shop.sample_size, 3);
    assert_eq!(result.average, 2000.0);
}

#[tokio::test]
async fn test_search_disallowed_by_robots() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nDisallow: /search/\n").await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&[(
            "Pikachu",
            "¥1,000",
            "/item/1",
        )])))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config();
    let mut source = crawler_source("shop", &server.uri());
    // Denial is deliberate, so no estimate is substituted either
    source.fallback_base_price = Some(1000.0);
    config.crawler_sources = vec![source];

    let crawler = build_source(&config);
    let policy = crawler.policy().await;
    assert!(!policy.allowed_for_search);

    let err = crawler
        .fetch(&CardQuery::new("Pikachu"), Duration::from_secs(5))
        .await
        .expect_err("search is disallowed");
    assert!(matches!(err, PriceError::PolicyDenied { .. }));

    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    let err = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu"), &options())
        .await
        .expect_err("only source is denied");
    assert!(matches!(err, PriceError::AllSourcesFailed { .. }));
}

#[tokio::test]
async fn test_unmatched_markup_uses_fallback() {
    let server = MockServer::start().await;
    // No robots.txt mounted: the 404 means crawling is unrestricted

    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><ul class=\"redesigned\"><li>Pikachu ¥1,000</li></ul></body></html>",
        ))
        .expect(1) // An empty page is an answer, not a transient failure
        .mount(&server)
        .await;

    let mut config = test_config();
    let mut source = crawler_source("shop", &server.uri());
    source.fallback_base_price = Some(1500.0);
    config.crawler_sources = vec![source];

    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    let result = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu"), &options())
        .await
        .expect("fallback keeps the lookup alive");

    assert!(result.has_fallback());
    let shop = &result.platforms["shop"];
    assert_eq!(shop.source, ObservationSource::Fallback);
    assert_eq!(shop.median, 1500.0);
    assert_eq!(shop.min, 750.0);
    assert_eq!(shop.max, 3000.0);
    assert!(shop.min <= shop.average && shop.average <= shop.max);
    assert_eq!(result.platforms_used, vec!["shop"]);
}

#[tokio::test]
async fn test_search_results_cached_and_keywords_configurable() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nAllow: /\n").await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(wiremock::matchers::query_param("keyword", "Pikachu Pokemon card"))
        .respond_with(ResponseTemplate::new(200).set_body_string(search_page(&[(
            "Pikachu",
            "$12.50",
            "/item/1",
        )])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.crawler.detail_limit = 0;
    let mut source = crawler_source("shop", &server.uri());
    source
        .keywords
        .insert("pokemon".to_string(), "Pokemon card".to_string());
    config.crawler_sources = vec![source];

    let crawler = build_source(&config);
    let query = CardQuery::new("Pikachu").with_game_type("pokemon");
    assert_eq!(crawler.search_term(&query), "Pikachu Pokemon card");

    let first = crawler.fetch(&query, Duration::from_secs(5)).await.unwrap();
    let second = crawler.fetch(&query, Duration::from_secs(5)).await.unwrap();
    assert_eq!(first.average, 12.5);
    assert_eq!(first.average, second.average);
}

#[tokio::test]
async fn test_crawl_delay_spaces_requests() {
    let server = MockServer::start().await;
    mount_robots(&server, "User-agent: *\nCrawl-delay: 0.3\n").await;

    mount_search(
        &server,
        "Pikachu",
        search_page(&[("Pikachu", "¥500", "/item/1")]),
    )
    .await;
    mount_search(
        &server,
        "Raichu",
        search_page(&[("Raichu", "¥800", "/item/2")]),
    )
    .await;

    let mut config = test_config();
    config.crawler.detail_limit = 0;
    config.crawler_sources = vec![crawler_source("shop", &server.uri())];
    let crawler = build_source(&config);
    assert_eq!(crawler.policy().await.crawl_delay_ms, 300);

    let start = Instant::now();
    crawler
        .fetch(&CardQuery::new("Pikachu"), Duration::from_secs(5))
        .await
        .unwrap();
    crawler
        .fetch(&CardQuery::new("Raichu"), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(start.elapsed() >= Duration::from_millis(300));
}

#[tokio::test]
async fn test_api_and_crawler_combined() {
    let api = MockServer::start().await;
    let shop = MockServer::start().await;
    crate::common::mount_api(&api, "p-1", "Pikachu", &[10.0, 20.0]).await;
    mount_search(
        &shop,
        "Pikachu",
        search_page(&[("Pikachu", "$30", "/item/1"), ("Pikachu", "$50", "/item/2")]),
    )
    .await;

    let mut config = test_config();
    config.crawler.detail_limit = 0;
    config.api_sources = vec![crate::common::api_source("api", &api.uri())];
    let mut source = crawler_source("shop", &shop.uri());
    source.currency = "USD".to_string();
    config.crawler_sources = vec![source];

    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    let result = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu"), &options())
        .await
        .unwrap();

    assert_eq!(result.platforms_used, vec!["api", "shop"]);
    assert_eq!(result.average, (15.0 + 40.0) / 2.0);
    assert_eq!(result.min, 10.0);
    assert_eq!(result.max, 50.0);
    assert_eq!(result.total_results, 4);
}
