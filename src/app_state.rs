use std::collections::HashMap;
use std::sync::Arc;

use pollkeeper_core::{PollConfig, RegisteredTimer, TimerFactory, TimerRegistry};
use tokio_util::sync::CancellationToken;

/// A poll loop created from the REPL or from a config preset
pub struct PollLoop {
    pub timer: Arc<RegisteredTimer>,
    pub fail_after_ticks: Option<u64>,
}

pub struct AppState {
    pub config: PollConfig,
    pub factory: TimerFactory,
    pub loops: HashMap<String, PollLoop>,
    /// Parent of every run token handed to a timer. Cancelled on exit.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: PollConfig) -> Self {
        Self {
            config,
            factory: TimerFactory::new(Arc::new(TimerRegistry::new())),
            loops: HashMap::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &Arc<TimerRegistry> {
        self.factory.registry()
    }

    pub fn timer(&self, name: &str) -> Result<Arc<RegisteredTimer>, String> {
        self.loops
            .get(name)
            .map(|l| Arc::clone(&l.timer))
            .ok_or_else(|| format!("no poll loop named '{name}'"))
    }
}
