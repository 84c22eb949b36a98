//! Decorator tying a timer's lifetime to registry membership

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pollkeeper_types::{TimerSnapshot, TimerState};
use tokio_util::sync::CancellationToken;

use super::error::{TimerError, TimerFault};
use super::handler::TickHandler;
use super::managed::ManagedTimer;
use super::periodic::PeriodicTimer;
use super::registry::TimerRegistry;
use super::wait::BoxFuture;

/// Forwards every operation to the inner timer and leaves the registry when
/// disposed (or dropped).
pub struct RegisteredTimer<T: ManagedTimer + 'static = PeriodicTimer> {
    inner: T,
    registry: Arc<TimerRegistry>,
}

impl<T: ManagedTimer + 'static> RegisteredTimer<T> {
    pub(crate) fn new(inner: T, registry: Arc<TimerRegistry>) -> Self {
        Self { inner, registry }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

/// Unregisters on drop, so cleanup runs even if inner disposal unwinds
struct Unregister<'a> {
    registry: &'a TimerRegistry,
    timer: &'a dyn ManagedTimer,
}

impl Drop for Unregister<'_> {
    fn drop(&mut self) {
        self.registry.unregister(self.timer);
    }
}

impl<T: ManagedTimer + 'static> ManagedTimer for RegisteredTimer<T> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn state(&self) -> TimerState {
        self.inner.state()
    }

    fn interval(&self) -> Duration {
        self.inner.interval()
    }

    fn last_tick_utc(&self) -> Option<DateTime<Utc>> {
        self.inner.last_tick_utc()
    }

    fn next_tick_utc(&self) -> Option<DateTime<Utc>> {
        self.inner.next_tick_utc()
    }

    fn last_fault(&self) -> Option<TimerFault> {
        self.inner.last_fault()
    }

    fn start(
        &self,
        handler: Arc<dyn TickHandler>,
        cancel: CancellationToken,
    ) -> Result<bool, TimerError> {
        self.inner.start(handler, cancel)
    }

    fn pause(&self, cancel: &CancellationToken) -> Result<bool, TimerError> {
        self.inner.pause(cancel)
    }

    fn resume(&self, cancel: &CancellationToken) -> Result<bool, TimerError> {
        self.inner.resume(cancel)
    }

    fn update_interval(
        &self,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<bool, TimerError> {
        self.inner.update_interval(interval, cancel)
    }

    fn stop<'a>(
        &'a self,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<bool, TimerError>> {
        self.inner.stop(cancel)
    }

    fn dispose(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            let _unregister = Unregister {
                registry: &self.registry,
                timer: self,
            };
            self.inner.dispose().await;
        })
    }

    fn snapshot(&self) -> TimerSnapshot {
        self.inner.snapshot()
    }
}

impl<T: ManagedTimer + std::fmt::Debug + 'static> std::fmt::Debug for RegisteredTimer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RegisteredTimer").field(&self.inner).finish()
    }
}

impl<T: ManagedTimer + 'static> Drop for RegisteredTimer<T> {
    fn drop(&mut self) {
        self.registry.unregister(&*self);
    }
}
