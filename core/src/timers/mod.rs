//! Managed periodic timers
//!
//! This module provides:
//! - **PeriodicTimer**: the timer state machine and its tick loop
//! - **TimerRegistry**: the set of live timers, for diagnostics
//! - **RegisteredTimer**: decorator that keeps a timer in the registry for
//!   its lifetime
//! - **TimerFactory**: the construction path that wires the three together
//!
//! # Lifecycle
//!
//! ```text
//!            start                pause
//! Stopped ──────────► Running ◄──────────► Paused
//!    ▲                  │        resume       │
//!    │   stop / Stop    │                     │
//!    └──────────────────┤◄────────────────────┘
//!                       │ handler error / panic
//!                       ▼
//!                    Faulted ──── start ───► Running
//! ```
//!
//! Poll loops (torrent list refresh, search jobs, RSS) get a timer from the
//! factory, start it with a tick handler, and steer it with the
//! [`TickResult`] the handler returns after every tick.

mod error;
mod factory;
mod handler;
mod managed;
mod periodic;
mod registered;
mod registry;
mod result;
mod wait;


pub use error::{TickError, TimerError, TimerFault};
pub use factory::TimerFactory;
pub use handler::{TickHandler, tick_handler};
pub use managed::ManagedTimer;
pub use periodic::PeriodicTimer;
pub use registered::RegisteredTimer;
pub use registry::TimerRegistry;
pub use result::{TickAction, TickResult};
pub use wait::{BoxFuture, MAX_PERIOD, PeriodicWait, TokioWaitSource, WaitSource};
