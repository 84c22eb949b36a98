//! Registry of live timers, for diagnostics
//!
//! The registry only observes: entries are weak, so a timer dropped without
//! being disposed simply stops showing up. Identity is the timer's address,
//! which a weak entry keeps from being reused.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use pollkeeper_types::TimerSnapshot;

use super::managed::ManagedTimer;

struct Entry {
    addr: usize,
    timer: Weak<dyn ManagedTimer>,
}

fn addr_of(timer: &dyn ManagedTimer) -> usize {
    timer as *const dyn ManagedTimer as *const () as usize
}

#[derive(Default)]
pub struct TimerRegistry {
    entries: Mutex<Vec<Entry>>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a timer. Registering the same instance again is a no-op and
    /// returns false.
    pub fn register(&self, timer: &Arc<dyn ManagedTimer>) -> bool {
        let addr = addr_of(timer.as_ref());
        let mut entries = self.entries.lock();
        entries.retain(|e| e.timer.strong_count() > 0);
        if entries.iter().any(|e| e.addr == addr) {
            return false;
        }
        entries.push(Entry {
            addr,
            timer: Arc::downgrade(timer),
        });
        tracing::debug!(timer = timer.name(), live = entries.len(), "timer registered");
        true
    }

    pub fn unregister(&self, timer: &dyn ManagedTimer) -> bool {
        let addr = addr_of(timer);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.addr != addr && e.timer.strong_count() > 0);
        let removed = entries.len() < before;
        if removed {
            tracing::debug!(timer = timer.name(), live = entries.len(), "timer unregistered");
        }
        removed
    }

    /// Point-in-time copy of the live timers
    pub fn timers(&self) -> Vec<Arc<dyn ManagedTimer>> {
        self.entries
            .lock()
            .iter()
            .filter_map(|e| e.timer.upgrade())
            .collect()
    }

    pub fn snapshots(&self) -> Vec<TimerSnapshot> {
        // Read timer state outside the registry lock
        self.timers().iter().map(|t| t.snapshot()).collect()
    }

    pub fn find(&self, name: &str) -> Option<Arc<dyn ManagedTimer>> {
        self.timers().into_iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|e| e.timer.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timers::PeriodicTimer;
    use pollkeeper_types::TimerState;
    use std::time::Duration;

    fn timer(name: &str) -> Arc<dyn ManagedTimer> {
        Arc::new(PeriodicTimer::new(name, Duration::from_secs(1)).unwrap())
    }

    #[test]
    fn register_is_idempotent() {
        let registry = TimerRegistry::new();
        let poll = timer("poll");

        assert!(registry.register(&poll));
        assert!(!registry.register(&poll));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_removes_only_that_instance() {
        let registry = TimerRegistry::new();
        let a = timer("same-name");
        let b = timer("same-name");
        registry.register(&a);
        registry.register(&b);

        assert!(registry.unregister(a.as_ref()));
        assert!(!registry.unregister(a.as_ref()));

        let left = registry.timers();
        assert_eq!(left.len(), 1);
        assert!(Arc::ptr_eq(&left[0], &b));
    }

    #[test]
    fn snapshot_is_a_copy() {
        let registry = TimerRegistry::new();
        let a = timer("a");
        registry.register(&a);

        let snapshot = registry.timers();
        registry.unregister(a.as_ref());

        assert_eq!(snapshot.len(), 1);
        assert!(registry.timers().is_empty());
    }

    #[test]
    fn dropped_timers_disappear() {
        let registry = TimerRegistry::new();
        let kept = timer("kept");
        registry.register(&kept);
        registry.register(&timer("dropped"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find("kept").map(|t| t.name().to_string()), Some("kept".to_string()));
        assert!(registry.find("dropped").is_none());
    }

    #[test]
    fn snapshots_read_timer_state() {
        let registry = TimerRegistry::new();
        let a = timer("rss");
        registry.register(&a);

        let snapshots = registry.snapshots();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].name, "rss");
        assert_eq!(snapshots[0].state, TimerState::Stopped);
        assert_eq!(snapshots[0].interval_ms, 1000);
        assert!(snapshots[0].next_tick_utc.is_none());
    }
}
