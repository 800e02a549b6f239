//! Per-key log of admitted request timestamps.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::time::Instant;

/// Timestamps of admitted requests for a single admission key.
///
/// The log is kept sorted oldest first, so expiring entries can only ever
/// sit at the front.
#[derive(Debug, Default, Clone)]
pub struct RequestLog {
    admitted: VecDeque<Instant>,
}

impl RequestLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry that has left the window ending at `now`.
    ///
    /// An entry exactly `window` old is expired: the window is `(now - window, now]`.
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: Instant, window: Duration) -> usize {
        let mut removed = 0;
        while let Some(&oldest) = self.admitted.front() {
            if now.saturating_duration_since(oldest) < window {
                break;
            }
            self.admitted.pop_front();
            removed += 1;
        }
        removed
    }

    /// Record an admitted request.
    ///
    /// A timestamp older than the newest entry is slotted into place rather
    /// than appended, so pruning from the front stays exact.
    pub fn record(&mut self, now: Instant) {
        match self.admitted.back() {
            Some(&newest) if now < newest => {
                let at = self.admitted.partition_point(|&t| t <= now);
                self.admitted.insert(at, now);
            }
            _ => self.admitted.push_back(now),
        }
    }

    /// Number of entries currently held.
    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    /// Whether the log holds no entries.
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }

    /// The oldest entry still held, if any.
    pub fn oldest(&self) -> Option<Instant> {
        self.admitted.front().copied()
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = Instant> + '_ {
        self.admitted.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prune_drops_only_expired_prefix() {
        let t0 = Instant::now();
        let window = Duration::from_secs(10);
        let mut log = RequestLog::new();

        log.record(t0);
        log.record(t0 + Duration::from_secs(3));
        log.record(t0 + Duration::from_secs(8));

        let removed = log.prune(t0 + Duration::from_secs(12), window);
        assert_eq!(removed, 1);
        assert_eq!(log.len(), 2);
        assert_eq!(log.oldest(), Some(t0 + Duration::from_secs(3)));
    }

    #[test]
    fn test_prune_boundary_is_exclusive() {
        let t0 = Instant::now();
        let window = Duration::from_secs(10);
        let mut log = RequestLog::new();
        log.record(t0);

        log.prune(t0 + window - Duration::from_millis(1), window);
        assert_eq!(log.len(), 1);

        log.prune(t0 + window, window);
        assert!(log.is_empty());
    }

    #[test]
    fn test_prune_ignores_earlier_now() {
        let t0 = Instant::now();
        let mut log = RequestLog::new();
        log.record(t0 + Duration::from_secs(5));

        assert_eq!(log.prune(t0, Duration::from_secs(1)), 0);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_late_record_keeps_log_sorted() {
        let t0 = Instant::now();
        let window = Duration::from_secs(10);
        let mut log = RequestLog::new();

        log.record(t0 + Duration::from_secs(10));
        log.record(t0);
        log.record(t0 + Duration::from_secs(4));

        let entries: Vec<_> = log.iter().collect();
        assert_eq!(
            entries,
            vec![t0, t0 + Duration::from_secs(4), t0 + Duration::from_secs(10)]
        );

        // The late t0 entry sits at the front and expires on schedule.
        assert_eq!(log.prune(t0 + Duration::from_secs(15), window), 2);
        assert_eq!(log.oldest(), Some(t0 + Duration::from_secs(10)));
    }

    #[test]
    fn test_empty_log() {
        let mut log = RequestLog::new();
        assert!(log.is_empty());
        assert_eq!(log.oldest(), None);
        assert_eq!(log.prune(Instant::now(), Duration::from_secs(1)), 0);
    }
}
