//! Data model shared across sources, pricing and caching
//!
//! # Components
//!
//! - `CardQuery`: identity of the card being priced
//! - `PriceObservation`: one platform's price summary
//! - `AggregatedPriceResult`: the combined answer across platforms
//! - `CrawlerSearchResult`: one scraped listing

mod card;
mod price;

pub use card::CardQuery;
pub use price::{
    median_of_sorted, AggregatedPriceResult, CrawlerSearchResult, ListingDetail,
    ObservationSource, PriceObservation, PriceStats,
};
