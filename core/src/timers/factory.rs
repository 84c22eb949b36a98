//! Construction path for registered timers

use std::sync::Arc;
use std::time::Duration;

use super::error::TimerError;
use super::managed::ManagedTimer;
use super::periodic::PeriodicTimer;
use super::registered::RegisteredTimer;
use super::registry::TimerRegistry;
use super::wait::{TokioWaitSource, WaitSource};

/// Builds timers that are registered for their whole lifetime.
///
/// Every timer the factory hands out is already in its registry and leaves
/// it when disposed or dropped.
#[derive(Clone)]
pub struct TimerFactory {
    registry: Arc<TimerRegistry>,
    wait_source: Arc<dyn WaitSource>,
}

impl TimerFactory {
    pub fn new(registry: Arc<TimerRegistry>) -> Self {
        Self::with_wait_source(registry, Arc::new(TokioWaitSource))
    }

    pub fn with_wait_source(
        registry: Arc<TimerRegistry>,
        wait_source: Arc<dyn WaitSource>,
    ) -> Self {
        Self {
            registry,
            wait_source,
        }
    }

    pub fn registry(&self) -> &Arc<TimerRegistry> {
        &self.registry
    }

    pub fn create(
        &self,
        name: impl Into<String>,
        interval: Duration,
    ) -> Result<Arc<RegisteredTimer>, TimerError> {
        let timer = PeriodicTimer::with_wait_source(name, interval, Arc::clone(&self.wait_source))?;
        let registered = Arc::new(RegisteredTimer::new(timer, Arc::clone(&self.registry)));

        let handle: Arc<dyn ManagedTimer> = registered.clone();
        self.registry.register(&handle);
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::{TickResult, tick_handler};
    use std::collections::HashSet;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn zero_interval_is_rejected_and_not_registered() {
        let factory = TimerFactory::new(Arc::new(TimerRegistry::new()));

        let err = factory.create("bad", Duration::ZERO).unwrap_err();
        assert_eq!(err, TimerError::InvalidInterval);
        assert!(factory.registry().is_empty());
    }

    #[tokio::test]
    async fn disposing_m_of_n_leaves_n_minus_m() {
        let factory = TimerFactory::new(Arc::new(TimerRegistry::new()));
        let timers: Vec<_> = (0..5)
            .map(|i| factory.create(format!("poll-{i}"), Duration::from_millis(100)).unwrap())
            .collect();
        assert_eq!(factory.registry().len(), 5);

        for timer in &timers[..2] {
            timer.dispose().await;
        }
        // Disposing twice must not disturb anything
        timers[0].dispose().await;

        let names: Vec<String> = factory
            .registry()
            .timers()
            .iter()
            .map(|t| t.name().to_string())
            .collect();
        let unique: HashSet<_> = names.iter().collect();
        assert_eq!(names.len(), 3);
        assert_eq!(unique.len(), 3);
        assert!(!names.contains(&"poll-0".to_string()));
        assert!(!names.contains(&"poll-1".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn disposing_a_running_timer_stops_it() {
        let factory = TimerFactory::new(Arc::new(TimerRegistry::new()));
        let timer = factory.create("torrents", Duration::from_millis(100)).unwrap();

        let started = timer
            .start(
                tick_handler(|_| async { Ok(TickResult::CONTINUE) }),
                CancellationToken::new(),
            )
            .unwrap();
        assert!(started);

        timer.dispose().await;
        assert_eq!(timer.state(), pollkeeper_types::TimerState::Stopped);
        assert!(factory.registry().is_empty());

        let restarted = timer
            .start(
                tick_handler(|_| async { Ok(TickResult::CONTINUE) }),
                CancellationToken::new(),
            )
            .unwrap();
        assert!(!restarted);
    }
}
