//! The managed timer contract
//!
//! Implemented by [`PeriodicTimer`](super::PeriodicTimer) and forwarded by
//! [`RegisteredTimer`](super::RegisteredTimer). The trait is object safe so
//! the registry can hold any timer as `dyn ManagedTimer`.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pollkeeper_types::{TimerSnapshot, TimerState};
use tokio_util::sync::CancellationToken;

use super::error::{TimerError, TimerFault};
use super::handler::TickHandler;
use super::wait::BoxFuture;

/// A controllable, observable periodic timer.
///
/// Control operations report an impossible transition (e.g. pausing a
/// stopped timer) as `Ok(false)`. `Err` is reserved for bad arguments and
/// for a call whose own cancellation token has fired.
pub trait ManagedTimer: Send + Sync {
    fn name(&self) -> &str;

    fn state(&self) -> TimerState;

    fn interval(&self) -> Duration;

    fn last_tick_utc(&self) -> Option<DateTime<Utc>>;

    /// When the next tick is due. `None` unless the timer is counting down.
    fn next_tick_utc(&self) -> Option<DateTime<Utc>>;

    /// The fault that stopped the timer, while it is `Faulted`
    fn last_fault(&self) -> Option<TimerFault>;

    /// Start the run loop from `Stopped` or `Faulted`.
    ///
    /// `cancel` is linked into the loop's run scope: cancelling it later
    /// stops the timer. Returns immediately; the loop runs on the Tokio
    /// runtime.
    fn start(
        &self,
        handler: Arc<dyn TickHandler>,
        cancel: CancellationToken,
    ) -> Result<bool, TimerError>;

    fn pause(&self, cancel: &CancellationToken) -> Result<bool, TimerError>;

    fn resume(&self, cancel: &CancellationToken) -> Result<bool, TimerError>;

    /// Change the period. Takes effect on the next wait, interrupting the
    /// current one. Returns `Ok(false)` if the interval is unchanged.
    fn update_interval(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, TimerError>;

    /// Stop the loop and wait for it to finish.
    ///
    /// Called from inside the timer's own tick handler, this only requests
    /// the stop and returns without waiting.
    fn stop<'a>(&'a self, cancel: &'a CancellationToken) -> BoxFuture<'a, Result<bool, TimerError>>;

    /// Stop and release the timer. Only the first call does any work.
    fn dispose(&self) -> BoxFuture<'_, ()>;

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            name: self.name().to_string(),
            state: self.state(),
            interval_ms: self.interval().as_millis() as u64,
            last_tick_utc: self.last_tick_utc(),
            next_tick_utc: self.next_tick_utc(),
            last_fault: self.last_fault().map(|f| f.to_string()),
        }
    }
}
