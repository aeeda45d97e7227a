//! Hybrid count/time publish trigger

use std::time::{Duration, Instant};

/// Decides when accumulated histograms are published
///
/// Due when `elapsed > max_interval`, or when the message counter is a
/// multiple of `publish_every` and `elapsed > min_interval`. `elapsed` is
/// measured since the last publish attempt.
#[derive(Debug, Clone)]
pub struct PublishSchedule {
    publish_every: u32,
    min_interval: Duration,
    max_interval: Duration,
    last_publish: Instant,
}

impl PublishSchedule {
    pub fn new(publish_every: u32, min_interval: Duration, max_interval: Duration) -> Self {
        Self::starting_at(publish_every, min_interval, max_interval, Instant::now())
    }

    /// Schedule whose clock starts at `start`
    pub fn starting_at(
        publish_every: u32,
        min_interval: Duration,
        max_interval: Duration,
        start: Instant,
    ) -> Self {
        Self {
            publish_every,
            min_interval,
            max_interval,
            last_publish: start,
        }
    }

    pub fn is_due(&self, now: Instant, message_counter: u64) -> bool {
        if self.publish_every == 0 {
            return false;
        }
        let elapsed = now.saturating_duration_since(self.last_publish);
        elapsed > self.max_interval
            || (message_counter % u64::from(self.publish_every) == 0
                && elapsed > self.min_interval)
    }

    /// Stamp the publish time, called after every attempt
    pub fn mark_published(&mut self, now: Instant) {
        self.last_publish = now;
    }

    pub fn last_publish(&self) -> Instant {
        self.last_publish
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(start: Instant) -> PublishSchedule {
        PublishSchedule::starting_at(100, Duration::from_secs(1), Duration::from_secs(10), start)
    }

    #[test]
    fn test_hybrid_trigger() {
        let t0 = Instant::now();
        let mut s = schedule(t0);

        // counter multiple but min interval not reached
        assert!(!s.is_due(t0 + Duration::from_millis(500), 100));
        // min interval reached but counter not a multiple
        assert!(!s.is_due(t0 + Duration::from_secs(5), 150));
        // both conditions hold
        assert!(s.is_due(t0 + Duration::from_millis(1300), 200));

        s.mark_published(t0 + Duration::from_millis(1300));
        assert!(!s.is_due(t0 + Duration::from_secs(11), 250));
        // max interval elapsed since the last publish
        assert!(s.is_due(t0 + Duration::from_millis(11_400), 250));
    }

    #[test]
    fn test_zero_period_never_due() {
        let t0 = Instant::now();
        let s = PublishSchedule::starting_at(0, Duration::ZERO, Duration::ZERO, t0);
        assert!(!s.is_due(t0 + Duration::from_secs(100), 0));
    }
}
