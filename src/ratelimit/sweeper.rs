//! Background removal of idle admission keys.

use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

use super::limiter::SlidingWindowLimiter;

/// Spawn a task that sweeps `limiter` once every `period`.
///
/// The task only holds a weak reference and exits once the limiter is gone.
pub(crate) fn spawn(
    runtime: &Handle,
    limiter: Weak<SlidingWindowLimiter>,
    period: Duration,
) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let Some(limiter) = limiter.upgrade() else {
                break;
            };
            limiter.sweep();
        }

        debug!("Limiter dropped, sweeper exiting");
    })
}
