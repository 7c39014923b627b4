//! End-to-end lookups against mocked marketplace APIs

use crate::common::{api_source, mount_api, options, test_config};
use price_ripple::cache::cache_key;
use price_ripple::{CardQuery, ObservationSource, PriceError, PriceOptions, PriceOrchestrator};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_two_api_sources_aggregate() {
    let alpha = MockServer::start().await;
    let beta = MockServer::start().await;
    mount_api(&alpha, "a-1", "Pikachu VMAX", &[40.0, 45.0, 50.0]).await;
    mount_api(&beta, "b-7", "Pikachu VMAX", &[38.0, 44.0, 55.0]).await;

    let mut config = test_config();
    config.api_sources = vec![
        api_source("alpha", &alpha.uri()),
        api_source("beta", &beta.uri()),
    ];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let result = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu VMAX"), &options())
        .await
        .expect("lookup should succeed");

    assert_eq!(result.min, 38.0);
    assert_eq!(result.max, 55.0);

    // Mean of the per-platform averages, not of the pooled listings
    let expected = (45.0 + (38.0 + 44.0 + 55.0) / 3.0) / 2.0;
    assert!((result.average - expected).abs() < 1e-9);
    assert!(result.min <= result.median && result.median <= result.max);

    assert_eq!(result.platforms_used, vec!["alpha", "beta"]);
    assert_eq!(result.total_results, 6);
    assert_eq!(result.currency, "USD");
    assert_eq!(result.platforms["alpha"].source, ObservationSource::Api);
    assert!(!result.has_fallback());
}

#[tokio::test]
async fn test_failing_source_is_skipped() {
    let healthy = MockServer::start().await;
    let broken = MockServer::start().await;
    mount_api(&healthy, "p-1", "Charizard ex", &[100.0, 120.0]).await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2) // Both attempts, then give up
        .mount(&broken)
        .await;

    let mut config = test_config();
    config.api_sources = vec![
        api_source("healthy", &healthy.uri()),
        api_source("broken", &broken.uri()),
    ];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let result = orchestrator
        .get_card_prices(&CardQuery::new("Charizard ex"), &options())
        .await
        .expect("partial results are a success");

    assert_eq!(result.platforms_used, vec!["healthy"]);
    assert_eq!(result.average, 110.0);
}

#[tokio::test]
async fn test_all_sources_failed_is_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = test_config();
    config.api_sources = vec![api_source("down", &server.uri())];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    let query = CardQuery::new("Pikachu");

    let err = orchestrator
        .get_card_prices(&query, &options())
        .await
        .expect_err("every source failed");

    match err {
        PriceError::AllSourcesFailed { attempted } => assert_eq!(attempted, vec!["down"]),
        other => panic!("unexpected error: {}", other),
    }

    let key = cache_key(&query, &["down".to_string()]);
    assert!(orchestrator.cache().get(&key).is_none());
}

#[tokio::test]
async fn test_unmatched_catalog_counts_as_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/search"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({ "results": [] })),
        )
        .expect(1) // Not found is a stable answer, never retried
        .mount(&server)
        .await;

    let mut config = test_config();
    config.api_sources = vec![api_source("empty", &server.uri())];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let err = orchestrator
        .get_card_prices(&CardQuery::new("Pikachu"), &options())
        .await
        .expect_err("no product matched");
    assert!(matches!(err, PriceError::AllSourcesFailed { .. }));
}

#[tokio::test]
async fn test_cached_result_reused() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "results": [{ "productId": "p-9", "name": "Mewtwo" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/pricing/p-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "listings": [{ "price": 20.0 }, { "price": 30.0 }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = test_config();
    config.api_sources = vec![api_source("api", &server.uri())];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");

    let query = CardQuery::new("Mewtwo");
    let first = orchestrator.get_card_prices(&query, &options()).await.unwrap();

    // Same card, differently spelled, same source set
    let respelled = CardQuery::new("  mewtwo ");
    let second = orchestrator
        .get_card_prices(&respelled, &options())
        .await
        .unwrap();

    assert_eq!(first, second);
    // Missing currency in the response falls back to the configured one
    assert_eq!(first.currency, "USD");
}

#[tokio::test]
async fn test_durable_cache_survives_restart() {
    let server = MockServer::start().await;
    mount_api(&server, "p-2", "Eevee", &[5.0, 7.0]).await;

    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config();
    config.cache.database_path = Some(dir.path().join("prices.db").display().to_string());
    config.api_sources = vec![api_source("api", &server.uri())];

    let query = CardQuery::new("Eevee");
    let first = {
        let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
        orchestrator.get_card_prices(&query, &options()).await.unwrap()
    };

    // The API goes away; a fresh orchestrator must answer from the database
    server.reset().await;
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    let second = orchestrator.get_card_prices(&query, &options()).await.unwrap();
    assert_eq!(first, second);

    let uncached = PriceOptions {
        use_cache: false,
        ..options()
    };
    assert!(orchestrator.get_card_prices(&query, &uncached).await.is_err());
}

#[tokio::test]
async fn test_source_subset_and_inactive_source() {
    let server = MockServer::start().await;
    mount_api(&server, "p-3", "Snorlax", &[12.0]).await;

    let mut keyless = api_source("keyless", &server.uri());
    keyless.api_key = None;
    keyless.api_key_env = Some("PRICE_RIPPLE_IT_UNSET_KEY".to_string());

    let mut config = test_config();
    config.api_sources = vec![api_source("keyed", &server.uri()), keyless];
    let orchestrator = PriceOrchestrator::from_config(&config).expect("orchestrator");
    assert_eq!(orchestrator.registry().names(), vec!["keyed"]);

    let only_keyless = PriceOptions {
        sources: Some(vec!["keyless".to_string()]),
        ..options()
    };
    let err = orchestrator
        .get_card_prices(&CardQuery::new("Snorlax"), &only_keyless)
        .await
        .expect_err("inactive source cannot answer");
    assert!(matches!(err, PriceError::AllSourcesFailed { .. }));
}
