pub mod context;
pub mod timers;

// Re-exports for convenience
pub use context::{ConfigError, PollConfig, PollConfigExt, PollLoopSpec};
pub use pollkeeper_types::{TimerSnapshot, TimerState};
pub use timers::{
    ManagedTimer, PeriodicTimer, RegisteredTimer, TickAction, TickError, TickHandler, TickResult,
    TimerError, TimerFactory, TimerFault, TimerRegistry, tick_handler,
};
