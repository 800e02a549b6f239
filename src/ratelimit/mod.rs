//! Sliding-window admission logic and state management.

mod backend;
mod key;
mod limiter;
mod sweeper;
mod window;

pub use backend::AdmissionControl;
pub use key::{KeyScope, GLOBAL_KEY};
pub use limiter::{LimiterSettings, LimiterStats, SlidingWindowLimiter, SweepReport};
pub use window::RequestLog;
