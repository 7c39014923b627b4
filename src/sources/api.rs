//! Adapter for marketplaces with a catalog/pricing API
//!
//! The catalog is searched for the card name, the best-matching product is
//! picked, and its listing prices are summarized:
//!
//! 1. `GET {base}/v1/catalog/search?q=<name>&limit=<n>`
//! 2. `GET {base}/v1/pricing/<product id>`
//!
//! Both requests carry `Authorization: Bearer <key>`.

use crate::config::ApiSourceConfig;
use crate::crawler::classify_transport_error;
use crate::model::{CardQuery, ObservationSource, PriceObservation, PriceStats};
use crate::sources::{PriceSource, SourceKind};
use crate::{PriceError, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use url::Url;

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    #[serde(default)]
    results: Vec<CatalogProduct>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CatalogProduct {
    product_id: String,
    name: String,
    #[serde(default)]
    series: Option<String>,
    #[serde(default)]
    number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    listings: Vec<PricePoint>,
}

#[derive(Debug, Deserialize)]
struct PricePoint {
    price: f64,
}

/// Marketplace reached through its JSON API
pub struct ApiSource {
    name: String,
    base_url: Url,
    api_key: String,
    currency: String,
    search_limit: usize,
    client: Client,
}

impl ApiSource {
    /// Creates an adapter from its configuration and resolved credential
    pub fn new(config: &ApiSourceConfig, api_key: String, client: Client) -> Result<Self> {
        Ok(Self {
            name: config.name.clone(),
            base_url: Url::parse(&config.base_url)?,
            api_key,
            currency: config.currency.clone(),
            search_limit: config.search_limit,
            client,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url, timeout: Duration) -> Result<T> {
        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&self.api_key)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| classify_transport_error(e, &url, &self.name))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(PriceError::NotFound {
                source_name: self.name.clone(),
                query: url.to_string(),
            });
        }

        if !status.is_success() {
            return Err(PriceError::Upstream {
                source_name: self.name.clone(),
                message: format!("HTTP {} from {}", status.as_u16(), url),
            });
        }

        response.json::<T>().await.map_err(|e| PriceError::Upstream {
            source_name: self.name.clone(),
            message: format!("malformed response from {}: {}", url, e),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }
}

#[async_trait]
impl PriceSource for ApiSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Api
    }

    async fn fetch(&self, query: &CardQuery, timeout: Duration) -> Result<PriceObservation> {
        let mut search_url = self.endpoint("/v1/catalog/search")?;
        search_url
            .query_pairs_mut()
            .append_pair("q", &query.name)
            .append_pair("limit", &self.search_limit.to_string());

        let catalog: CatalogResponse = self.get_json(search_url, timeout).await?;

        let product = best_match(&catalog.results, query).ok_or_else(|| PriceError::NotFound {
            source_name: self.name.clone(),
            query: query.to_string(),
        })?;

        tracing::debug!(
            "{}: matched '{}' to product {} ({})",
            self.name,
            query.name,
            product.product_id,
            product.name
        );

        let mut pricing_url = self.endpoint("/v1/pricing/")?;
        pricing_url
            .path_segments_mut()
            .map_err(|_| PriceError::Upstream {
                source_name: self.name.clone(),
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .push(&product.product_id);

        let pricing: PricingResponse = self.get_json(pricing_url, timeout).await?;

        let prices: Vec<f64> = pricing.listings.iter().map(|p| p.price).collect();
        let stats = PriceStats::from_prices(&prices).ok_or_else(|| PriceError::NotFound {
            source_name: self.name.clone(),
            query: query.to_string(),
        })?;

        let currency = pricing.currency.unwrap_or_else(|| self.currency.clone());
        Ok(PriceObservation::from_stats(
            &self.name,
            stats,
            currency,
            ObservationSource::Api,
        ))
    }
}

/// Picks the catalog product whose name best matches the query
///
/// Exact (normalized) names beat containment, which beats token overlap.
/// Matching series and card number break ties. Products sharing no token
/// with the query are never picked.
fn best_match<'a>(products: &'a [CatalogProduct], query: &CardQuery) -> Option<&'a CatalogProduct> {
    let wanted = normalize(&query.name);
    let wanted_tokens: HashSet<&str> = wanted.split(' ').filter(|t| !t.is_empty()).collect();

    products
        .iter()
        .filter_map(|product| {
            let name = normalize(&product.name);
            let tokens: HashSet<&str> = name.split(' ').filter(|t| !t.is_empty()).collect();
            let shared = wanted_tokens.intersection(&tokens).count();

            let mut score = if name == wanted {
                100.0
            } else if name.contains(&wanted) {
                60.0
            } else if wanted.contains(&name) && !name.is_empty() {
                40.0
            } else if shared > 0 {
                30.0 * shared as f64 / wanted_tokens.len().max(tokens.len()) as f64
            } else {
                return None;
            };

            if let (Some(a), Some(b)) = (&query.series, &product.series) {
                if normalize(a) == normalize(b) {
                    score += 20.0;
                }
            }
            if let (Some(a), Some(b)) = (&query.card_number, &product.number) {
                if normalize(a) == normalize(b) {
                    score += 20.0;
                }
            }

            Some((score, product))
        })
        .max_by(|(a, _), (b, _)| a.total_cmp(b))
        .map(|(_, product)| product)
}

fn normalize(value: &str) -> String {
    value
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
