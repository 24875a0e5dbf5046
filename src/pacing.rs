//! Deliberate pacing for injected and forwarded traffic.
//!
//! Two pieces:
//! - [`Pacer`] - an optional fixed delay awaited after each decoded frame
//! - [`PacingGate`] - a timer gate that opens once a threshold has elapsed
//!   since the last reset
//!
//! Neither blocks the runtime; waiting goes through `tokio::time`.

use std::time::Duration;

use tokio::time::Instant;

/// Optional delay applied after each decoded frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacer {
    delay: Option<Duration>,
}

impl Pacer {
    /// A pacer that never waits.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// A pacer that waits `delay` on every pause. A zero delay disables it.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay: (!delay.is_zero()).then_some(delay),
        }
    }

    /// Build from a millisecond setting.
    pub fn from_millis(ms: Option<u64>) -> Self {
        ms.map(|ms| Self::new(Duration::from_millis(ms)))
            .unwrap_or_default()
    }

    /// The configured delay, if any.
    #[inline]
    pub fn delay(&self) -> Option<Duration> {
        self.delay
    }

    /// Wait for the configured delay.
    pub async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Gate that opens when more than `threshold` has passed since `last`.
#[derive(Debug, Clone, Copy)]
pub struct PacingGate {
    threshold: Duration,
    last: Instant,
}

impl PacingGate {
    /// Create a gate whose timer starts at `now`.
    pub fn new(threshold: Duration, now: Instant) -> Self {
        Self {
            threshold,
            last: now,
        }
    }

    /// Threshold between openings.
    #[inline]
    pub fn threshold(&self) -> Duration {
        self.threshold
    }

    /// Whether strictly more than the threshold has elapsed.
    #[inline]
    pub fn ready(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.last) > self.threshold
    }

    /// Restart the timer at `now`.
    #[inline]
    pub fn reset(&mut self, now: Instant) {
        self.last = now;
    }
}
