//! Per-source request gate
//!
//! Each crawled source owns one `RateGate`. Before a request the caller
//! acquires a ticket, which waits out the remainder of the crawl delay since
//! the previous request; dropping the ticket after the request stamps the
//! completion time. The stamp sits behind an async mutex, so concurrent
//! callers on the same source serialize instead of both observing an
//! already-elapsed window. Gates of different sources share nothing.

use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};
use tokio::time::Instant;

/// Tracks the last request time for one source
#[derive(Debug, Default)]
pub struct RateGate {
    last_request: Mutex<Option<Instant>>,
}

/// Exclusive right to issue one request to the gated source
///
/// The last-request stamp is updated when the ticket is dropped.
#[derive(Debug)]
pub struct GateTicket<'a> {
    last_request: MutexGuard<'a, Option<Instant>>,
    waited: Duration,
}

impl GateTicket<'_> {
    /// How long the caller was held back by the crawl delay
    pub fn waited(&self) -> Duration {
        self.waited
    }
}

impl Drop for GateTicket<'_> {
    fn drop(&mut self) {
        *self.last_request = Some(Instant::now());
    }
}

impl RateGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits until `delay` has passed since the previous request, then
    /// returns a ticket to hold across the request
    ///
    /// # Arguments
    ///
    /// * `delay` - Minimum spacing between two requests to this source
    pub async fn acquire(&self, delay: Duration) -> GateTicket<'_> {
        let guard = self.last_request.lock().await;

        let waited = match *guard {
            Some(last) => {
                let elapsed = last.elapsed();
                if elapsed < delay {
                    let remaining = delay - elapsed;
                    tracing::trace!("Rate gate sleeping {:?}", remaining);
                    tokio::time::sleep(remaining).await;
                    remaining
                } else {
                    Duration::ZERO
                }
            }
            None => Duration::ZERO,
        };

        GateTicket {
            last_request: guard,
            waited,
        }
    }

    /// Waits for the gate and stamps the current time immediately
    pub async fn wait(&self, delay: Duration) -> Duration {
        self.acquire(delay).await.waited()
    }

    /// Time remaining before the next request may start, if any
    ///
    /// Returns `None` when the gate is free or currently held by a request.
    pub fn time_until_next_request(&self, delay: Duration) -> Option<Duration> {
        let guard = self.last_request.try_lock().ok()?;
        let last = (*guard)?;
        let elapsed = last.elapsed();
        (elapsed < delay).then(|| delay - elapsed)
    }
}
