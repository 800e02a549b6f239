//! Core sliding-window limiter implementation.

use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace};

use super::backend::AdmissionControl;
use super::key::KeyScope;
use super::sweeper;
use super::window::RequestLog;
use crate::error::{Result, TurnstileError};

/// Parameters a limiter is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterSettings {
    /// Occupancy above which new requests are rejected
    pub quota: usize,
    /// Length of the sliding window
    pub window: Duration,
    /// How admission keys are derived
    pub scope: KeyScope,
}

impl LimiterSettings {
    /// Create settings from their parts.
    pub fn new(quota: usize, window: Duration, scope: KeyScope) -> Self {
        Self {
            quota,
            window,
            scope,
        }
    }

    /// Number of requests actually admitted per key within one window.
    ///
    /// The occupancy is compared against the quota before the new request is
    /// recorded, so one request beyond the quota is still let through.
    pub fn allowance(&self) -> usize {
        self.quota.saturating_add(1)
    }

    fn validate(&self) -> Result<()> {
        if self.window.is_zero() {
            return Err(TurnstileError::InvalidWindow);
        }
        Ok(())
    }
}

/// Outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys removed because all their entries expired
    pub removed: usize,
    /// Keys still holding entries
    pub retained: usize,
}

/// Point-in-time view of a limiter, suitable for admin endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct LimiterStats {
    /// Configured quota
    pub quota: usize,
    /// Requests admitted per key within one window
    pub allowance: usize,
    /// Window length in seconds
    pub window_secs: f64,
    /// How admission keys are derived
    pub scope: KeyScope,
    /// Keys currently held in memory
    pub tracked_keys: usize,
}

/// A sliding-window rate limiter keyed by admission key.
///
/// Every key maps to the log of its admitted requests. All keys share one
/// lock; critical sections only prune a prefix and append or remove one entry.
pub struct SlidingWindowLimiter {
    settings: LimiterSettings,
    /// Admitted-request logs indexed by admission key
    entries: Mutex<HashMap<String, RequestLog>>,
    /// Background sweep task, when one was started
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl SlidingWindowLimiter {
    /// Create a limiter without a background sweep.
    ///
    /// Idle keys are only removed when [`sweep`](Self::sweep) or
    /// [`sweep_at`](Self::sweep_at) is called.
    pub fn new(settings: LimiterSettings) -> Result<Self> {
        settings.validate()?;
        Ok(Self {
            settings,
            entries: Mutex::new(HashMap::new()),
            sweeper: Mutex::new(None),
        })
    }

    /// Create a limiter and start sweeping idle keys once per window.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(settings: LimiterSettings) -> Result<Arc<Self>> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TurnstileError::Runtime(e.to_string()))?;

        let limiter = Arc::new(Self::new(settings)?);
        let handle = sweeper::spawn(&runtime, Arc::downgrade(&limiter), settings.window);
        *limiter.sweeper.lock() = Some(handle);

        info!(
            quota = settings.quota,
            window = ?settings.window,
            scope = %settings.scope,
            "Sliding window limiter started"
        );

        Ok(limiter)
    }

    /// The settings this limiter was built with.
    pub fn settings(&self) -> LimiterSettings {
        self.settings
    }

    /// Decide whether a request for `key` arriving now is admitted.
    pub fn try_admit(&self, key: &str) -> bool {
        let mut entries = self.entries.lock();
        // Read the clock under the lock so logs stay sorted across threads.
        let now = Instant::now();
        self.admit_locked(&mut entries, key, now)
    }

    /// Decide whether a request for `key` arriving at `now` is admitted.
    ///
    /// Admitted requests are recorded; rejected ones leave no trace.
    pub fn try_admit_at(&self, key: &str, now: Instant) -> bool {
        let mut entries = self.entries.lock();
        self.admit_locked(&mut entries, key, now)
    }

    fn admit_locked(&self, entries: &mut HashMap<String, RequestLog>, key: &str, now: Instant) -> bool {
        let LimiterSettings { quota, window, .. } = self.settings;

        let log = match entries.get_mut(key) {
            Some(log) => log,
            None => entries.entry(key.to_string()).or_default(),
        };
        log.prune(now, window);
        let occupancy = log.len();

        trace!(key = %key, occupancy, quota, "Checking admission");

        if occupancy > quota {
            debug!(key = %key, occupancy, quota, "Admission rejected");
            return false;
        }

        log.record(now);
        true
    }

    /// Prune every key against the current time and drop the idle ones.
    pub fn sweep(&self) -> SweepReport {
        self.sweep_at(Instant::now())
    }

    /// Prune every key against `now` and drop the ones left empty.
    pub fn sweep_at(&self, now: Instant) -> SweepReport {
        let window = self.settings.window;
        let mut entries = self.entries.lock();
        let before = entries.len();

        entries.retain(|_, log| {
            log.prune(now, window);
            !log.is_empty()
        });

        let report = SweepReport {
            removed: before - entries.len(),
            retained: entries.len(),
        };

        debug!(
            removed = report.removed,
            retained = report.retained,
            "Swept idle admission keys"
        );

        report
    }

    /// Number of keys currently held in memory.
    pub fn tracked_keys(&self) -> usize {
        self.entries.lock().len()
    }

    /// Entries stored for `key`, without pruning.
    pub fn occupancy(&self, key: &str) -> usize {
        self.entries.lock().get(key).map_or(0, RequestLog::len)
    }

    /// Stored timestamps for `key`, oldest first.
    pub fn entries_for(&self, key: &str) -> Vec<Instant> {
        self.entries
            .lock()
            .get(key)
            .map(|log| log.iter().collect())
            .unwrap_or_default()
    }

    /// Snapshot of the limiter's configuration and footprint.
    pub fn stats(&self) -> LimiterStats {
        LimiterStats {
            quota: self.settings.quota,
            allowance: self.settings.allowance(),
            window_secs: self.settings.window.as_secs_f64(),
            scope: self.settings.scope,
            tracked_keys: self.tracked_keys(),
        }
    }

    /// Stop the background sweep.
    ///
    /// Returns `false` if no sweep was running.
    pub fn stop_sweeper(&self) -> bool {
        match self.sweeper.lock().take() {
            Some(handle) => {
                handle.abort();
                info!("Sliding window sweeper stopped");
                true
            }
            None => false,
        }
    }
}

impl AdmissionControl for SlidingWindowLimiter {
    fn scope(&self) -> KeyScope {
        self.settings.scope
    }

    fn try_admit(&self, key: &str) -> bool {
        SlidingWindowLimiter::try_admit(self, key)
    }
}

impl Drop for SlidingWindowLimiter {
    fn drop(&mut self) {
        if let Some(handle) = self.sweeper.get_mut().take() {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for SlidingWindowLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("settings", &self.settings)
            .finish()
    }
}
