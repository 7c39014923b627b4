//! Price lookup pipeline
//!
//! - `retry`: bounded retry with linear backoff around each source call
//! - `aggregate`: combining platform observations into one summary
//! - `orchestrator`: caching, concurrent dispatch, fallback substitution

mod aggregate;
mod orchestrator;
mod retry;

pub use aggregate::aggregate;
pub use orchestrator::{PriceOptions, PriceOrchestrator};
pub use retry::{with_retry, RetryPolicy};
