//! Poll-window math for the cache poller.

use chrono::{DateTime, Duration, Utc};

/// A half-open aggregation window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PollWindow {
    /// Compute the window to query at `now`, lagging behind wall clock by
    /// the ingestion delay allowance `delay`.
    ///
    /// The start is aligned down to the interval grid, so under steady
    /// polling consecutive windows are strictly contiguous
    /// (`next.start == prev.start + interval`) and a skipped cycle leaves
    /// exactly one missing window rather than drifting starts.
    pub fn current(now: DateTime<Utc>, delay: Duration, interval: Duration) -> Self {
        let interval_ms = interval.num_milliseconds().max(1);
        let target = now - delay;
        let rem = target.timestamp_millis().rem_euclid(interval_ms);
        let start = target - Duration::milliseconds(rem);
        Self {
            start,
            end: start + interval,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}

impl std::fmt::Display for PollWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn window_lags_now_by_the_ingestion_delay() {
        let now = at(1_000_000);
        let w = PollWindow::current(now, Duration::seconds(30), Duration::seconds(10));
        assert!(w.end <= now - Duration::seconds(30) + Duration::seconds(10));
        assert_eq!(w.end - w.start, Duration::seconds(10));
    }

    #[test]
    fn windows_are_aligned_to_the_interval_grid() {
        let w = PollWindow::current(at(1_000_007), Duration::seconds(30), Duration::seconds(10));
        assert_eq!(w.start.timestamp() % 10, 0);
    }

    #[test]
    fn consecutive_ticks_produce_contiguous_windows() {
        let delay = Duration::seconds(30);
        let interval = Duration::seconds(10);
        let w1 = PollWindow::current(at(1_000_003), delay, interval);
        let w2 = PollWindow::current(at(1_000_013), delay, interval);
        let w3 = PollWindow::current(at(1_000_023), delay, interval);
        assert_eq!(w2.start, w1.start + interval);
        assert_eq!(w3.start, w2.start + interval);
        assert_eq!(w2.start, w1.end);
    }

    #[test]
    fn a_tick_within_the_same_slot_repeats_the_window() {
        let delay = Duration::seconds(30);
        let interval = Duration::seconds(10);
        let w1 = PollWindow::current(at(1_000_011), delay, interval);
        let w2 = PollWindow::current(at(1_000_014), delay, interval);
        assert_eq!(w1, w2);
    }

    #[test]
    fn contains_is_half_open() {
        let w = PollWindow::current(at(1_000_040), Duration::seconds(0), Duration::seconds(10));
        assert!(w.contains(w.start));
        assert!(!w.contains(w.end));
    }
}
