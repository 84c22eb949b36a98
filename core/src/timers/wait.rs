//! Periodic wait primitive used as the timer's alarm clock
//!
//! The timer never sleeps directly; it asks a [`WaitSource`] for a
//! [`PeriodicWait`] at the current interval and awaits its ticks. The loop
//! drops the wait (and asks for a new one) whenever the interval changes.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A running periodic schedule.
///
/// `wait_for_next_tick` must be cancel-safe: the loop drops the returned
/// future when a pause, stop or interval change interrupts the wait.
pub trait PeriodicWait: Send {
    fn wait_for_next_tick(&mut self) -> BoxFuture<'_, ()>;
}

/// Creates periodic waits for a given period
pub trait WaitSource: Send + Sync {
    fn periodic(&self, period: Duration) -> Box<dyn PeriodicWait>;
}

/// Longest period a [`TokioWaitSource`] schedules. Longer periods are capped
/// so deadline arithmetic on `Instant` cannot overflow.
pub const MAX_PERIOD: Duration = Duration::from_secs(86400 * 365 * 30);

/// Default wait source backed by `tokio::time::Interval`.
///
/// The first tick fires one full period after creation. Missed ticks are
/// delayed rather than burst. Periods above [`MAX_PERIOD`] are capped.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioWaitSource;

impl WaitSource for TokioWaitSource {
    fn periodic(&self, period: Duration) -> Box<dyn PeriodicWait> {
        let period = period.min(MAX_PERIOD);
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Box::new(TokioPeriodicWait { interval })
    }
}

struct TokioPeriodicWait {
    interval: Interval,
}

impl PeriodicWait for TokioPeriodicWait {
    fn wait_for_next_tick(&mut self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.interval.tick().await;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_tick_is_one_period_out() {
        let start = Instant::now();
        let mut wait = TokioWaitSource.periodic(Duration::from_millis(100));

        wait.wait_for_next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        wait.wait_for_next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn huge_period_is_capped() {
        let mut wait = TokioWaitSource.periodic(Duration::from_secs(u64::MAX));

        tokio::select! {
            _ = wait.wait_for_next_tick() => panic!("capped period fired early"),
            _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_wait_does_not_lose_schedule() {
        let start = Instant::now();
        let mut wait = TokioWaitSource.periodic(Duration::from_millis(100));

        tokio::select! {
            _ = wait.wait_for_next_tick() => panic!("tick fired before the interrupt"),
            _ = tokio::time::sleep(Duration::from_millis(30)) => {}
        }

        wait.wait_for_next_tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }
}
