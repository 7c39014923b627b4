//! Price observations, listings and aggregated results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Where a platform observation came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationSource {
    /// Parsed from a marketplace API response
    Api,
    /// Computed from scraped listings
    Crawler,
    /// Synthetic placeholder substituted after a crawler failed
    Fallback,
}

impl ObservationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservationSource::Api => "api",
            ObservationSource::Crawler => "crawler",
            ObservationSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Summary statistics over a set of price points
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub count: usize,
}

impl PriceStats {
    /// Computes mean, median, min and max over the given prices
    ///
    /// Non-finite and non-positive prices are ignored. Returns `None` when no
    /// usable price remains.
    pub fn from_prices(prices: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = prices
            .iter()
            .copied()
            .filter(|p| p.is_finite() && *p > 0.0)
            .collect();

        if sorted.is_empty() {
            return None;
        }

        sorted.sort_by(|a, b| a.total_cmp(b));

        let count = sorted.len();
        let average = sorted.iter().sum::<f64>() / count as f64;

        Some(Self {
            average,
            median: median_of_sorted(&sorted),
            min: sorted[0],
            max: sorted[count - 1],
            count,
        })
    }
}

/// Median of an already sorted, non-empty slice
///
/// Even-length slices average the two middle values.
pub fn median_of_sorted(sorted: &[f64]) -> f64 {
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Price summary reported by one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceObservation {
    pub platform: String,
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub currency: String,
    pub source: ObservationSource,
    pub observed_at: DateTime<Utc>,

    /// Number of price points behind the statistics (zero for fallbacks)
    #[serde(default)]
    pub sample_size: usize,
}

impl PriceObservation {
    /// Builds an observation stamped with the current time
    pub fn from_stats(
        platform: impl Into<String>,
        stats: PriceStats,
        currency: impl Into<String>,
        source: ObservationSource,
    ) -> Self {
        Self {
            platform: platform.into(),
            average: stats.average,
            median: stats.median,
            min: stats.min,
            max: stats.max,
            currency: currency.into(),
            source,
            observed_at: Utc::now(),
            sample_size: stats.count,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ObservationSource::Fallback
    }
}

/// Final combined answer for one card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedPriceResult {
    pub average: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub currency: String,
    pub platforms: BTreeMap<String, PriceObservation>,

    /// Platforms that actually contributed, in request order
    pub platforms_used: Vec<String>,
    pub total_results: usize,
    pub generated_at: DateTime<Utc>,
}

impl AggregatedPriceResult {
    /// Whether any contributing platform is a synthetic fallback
    pub fn has_fallback(&self) -> bool {
        self.platforms.values().any(PriceObservation::is_fallback)
    }
}

/// One scraped marketplace listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlerSearchResult {
    pub title: String,
    pub price: f64,
    pub currency: String,
    pub image_url: Option<String>,
    pub item_url: Option<String>,
    pub platform: String,
    pub condition: Option<String>,
    pub seller: Option<String>,
    pub description: Option<String>,
}

impl CrawlerSearchResult {
    /// Copies detail-page fields onto the listing, keeping existing values
    /// where the detail page had nothing
    pub fn apply_detail(&mut self, detail: ListingDetail) {
        if detail.condition.is_some() {
            self.condition = detail.condition;
        }
        if detail.description.is_some() {
            self.description = detail.description;
        }
        if detail.seller.is_some() {
            self.seller = detail.seller;
        }
    }
}

/// Fields extracted from an item detail page
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDetail {
    pub condition: Option<String>,
    pub description: Option<String>,
    pub seller: Option<String>,
}
