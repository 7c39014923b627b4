//! Crawler building blocks for marketplaces without an API
//!
//! This module contains the pieces crawler-backed sources are made of:
//! - HTTP fetching with a stable User-Agent and error classification
//! - Per-source rate gating between requests
//! - Listing and detail extraction from HTML

mod extractor;
mod fetcher;
mod rate_limit;

pub use extractor::{parse_price, Extractor, SelectorExtractor};
pub use fetcher::{build_http_client, fetch_page};
pub use rate_limit::{GateTicket, RateGate};

pub(crate) use fetcher::classify_transport_error;
