//! Process-wide throughput and phase-timing counters.

use parking_lot::Mutex;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// A point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Load events that ran to completion (committed or abandoned).
    pub classes_processed: u64,
    /// Time spent deciding which classes/rules are involved.
    pub match_time: Duration,
    /// Time spent building visitor chains.
    pub scan_time: Duration,
    /// Time spent driving structural parses through chains.
    pub analysis_time: Duration,
    /// Wall time of whole load events.
    pub total_time: Duration,
}

impl fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} classes (match {:?}, scan {:?}, analysis {:?}, total {:?})",
            self.classes_processed,
            self.match_time,
            self.scan_time,
            self.analysis_time,
            self.total_time
        )
    }
}

/// Shared counters, updated from every dispatching thread.
///
/// The mutex serializes increments so concurrent dispatches never lose
/// updates; this is the only globally mutated state in the engine.
#[derive(Debug, Default)]
pub struct Metrics {
    inner: Mutex<MetricsSnapshot>,
}

impl Metrics {
    pub(crate) fn record_scan(&self, elapsed: Duration) {
        self.inner.lock().scan_time += elapsed;
    }

    pub(crate) fn record_analysis(&self, elapsed: Duration) {
        self.inner.lock().analysis_time += elapsed;
    }

    pub(crate) fn record_class(&self, match_elapsed: Duration, total_elapsed: Duration) {
        let mut guard = self.inner.lock();
        guard.classes_processed += 1;
        guard.match_time += match_elapsed;
        guard.total_time += total_elapsed;
    }

    /// Copies out the current counter values.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        *self.inner.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_class_bumps_counter_and_times() {
        let metrics = Metrics::default();
        metrics.record_class(Duration::from_micros(3), Duration::from_micros(9));
        metrics.record_class(Duration::from_micros(1), Duration::from_micros(2));
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.classes_processed, 2);
        assert_eq!(snapshot.match_time, Duration::from_micros(4));
        assert_eq!(snapshot.total_time, Duration::from_micros(11));
    }

    #[test]
    fn snapshot_serializes() {
        let metrics = Metrics::default();
        metrics.record_scan(Duration::from_millis(1));
        let json = serde_json::to_string(&metrics.snapshot()).unwrap();
        assert!(json.contains("classes_processed"));
    }
}
