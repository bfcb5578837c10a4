//! Launch pacing and delay calculation
//!
//! This module handles:
//! - Spacing task launches by `delay / concurrency`
//! - Integrating robots.txt crawl delays into the configured delay

use crate::robots::RobotsRuleset;
use std::time::Duration;
use tokio::time::Instant;

/// Hands out launch slots for new fetch tasks
///
/// The first launch of a run starts immediately. Every later launch is at
/// least `interval` after the previous one, whether or not other tasks are
/// still in flight, which keeps the overall request rate near one request per
/// `delay` regardless of the concurrency limit.
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Option<Instant>,
}

impl Pacer {
    /// Creates a pacer for the given base delay and concurrency limit
    ///
    /// # Example
    ///
    /// ```
    /// use quarry::crawler::Pacer;
    /// use std::time::Duration;
    ///
    /// let pacer = Pacer::new(Duration::from_millis(900), 3);
    /// assert_eq!(pacer.interval(), Duration::from_millis(300));
    /// ```
    pub fn new(delay: Duration, concurrency: usize) -> Self {
        let divisor = u32::try_from(concurrency.max(1)).unwrap_or(u32::MAX);
        Self {
            interval: delay / divisor,
            next_slot: None,
        }
    }

    /// Minimum spacing between two launches
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time until the next slot opens, if a launch now would have to wait
    pub fn pending_wait(&self) -> Option<Duration> {
        self.next_slot
            .map(|slot| slot.saturating_duration_since(Instant::now()))
            .filter(|wait| !wait.is_zero())
    }

    /// Waits for a launch slot and reserves it
    pub async fn wait_for_slot(&mut self) {
        if let Some(wait) = self.pending_wait() {
            tracing::trace!("Pacing next launch by {:?}", wait);
            tokio::time::sleep(wait).await;
        }
        self.next_slot = Some(Instant::now() + self.interval);
    }
}

/// Calculates the effective delay between requests
///
/// This takes the maximum of:
/// - The configured delay
/// - The robots.txt crawl delay (if specified)
///
/// A robots crawl delay can raise the configured delay but never lower it.
pub fn effective_delay(configured: Duration, robots: &RobotsRuleset) -> Duration {
    robots
        .crawl_delay()
        .map_or(configured, |robots_delay| configured.max(robots_delay))
}
