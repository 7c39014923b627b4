//! Combining per-platform observations into one result

use crate::model::{median_of_sorted, AggregatedPriceResult, PriceObservation};
use crate::{PriceError, Result};
use chrono::Utc;
use std::collections::BTreeMap;

/// Merges platform observations into a single price summary
///
/// - `average`: mean of the platform averages
/// - `median`: median of the platform averages
/// - `min` / `max`: extremes over the platform ranges
/// - `total_results`: sum of the platform sample sizes
/// - `currency`: the first observation's currency
///
/// Every platform counts once, however many listings it saw.
///
/// # Errors
///
/// `PriceError::NoData` when `observations` is empty.
pub fn aggregate(observations: Vec<PriceObservation>) -> Result<AggregatedPriceResult> {
    let first = observations.first().ok_or(PriceError::NoData)?;
    let currency = first.currency.clone();

    if observations.iter().any(|o| o.currency != currency) {
        let seen: Vec<String> = observations
            .iter()
            .map(|o| format!("{}={}", o.platform, o.currency))
            .collect();
        tracing::warn!(
            "Aggregating mixed currencies without conversion ({}); reporting {}",
            seen.join(", "),
            currency
        );
    }

    let mut averages: Vec<f64> = observations.iter().map(|o| o.average).collect();
    averages.sort_by(f64::total_cmp);

    let average = averages.iter().sum::<f64>() / averages.len() as f64;
    let median = median_of_sorted(&averages);
    let min = observations
        .iter()
        .map(|o| o.min)
        .fold(f64::INFINITY, f64::min);
    let max = observations
        .iter()
        .map(|o| o.max)
        .fold(f64::NEG_INFINITY, f64::max);
    let total_results = observations.iter().map(|o| o.sample_size).sum();

    let platforms_used: Vec<String> = observations.iter().map(|o| o.platform.clone()).collect();
    let platforms: BTreeMap<String, PriceObservation> = observations
        .into_iter()
        .map(|o| (o.platform.clone(), o))
        .collect();

    Ok(AggregatedPriceResult {
        average,
        median,
        min,
        max,
        currency,
        platforms,
        platforms_used,
        total_results,
        generated_at: Utc::now(),
    })
}
