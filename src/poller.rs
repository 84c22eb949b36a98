//! Demo poll loop used by the REPL
//!
//! Stands in for a real API refresh: it counts ticks, logs them, and can be
//! told to fail after a number of ticks to exercise the fault path.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use pollkeeper_core::{TickError, TickHandler, TickResult, tick_handler};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PollError {
    #[error("simulated poll failure after {ticks} ticks")]
    Simulated { ticks: u64 },
}

pub fn poll_handler(name: String, fail_after_ticks: Option<u64>) -> Arc<dyn TickHandler> {
    let ticks = Arc::new(AtomicU64::new(0));
    let name: Arc<str> = name.into();

    tick_handler(move |cancel| {
        let ticks = Arc::clone(&ticks);
        let name = Arc::clone(&name);
        async move {
            if cancel.is_cancelled() {
                return Ok(TickResult::STOP);
            }
            let tick = ticks.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(timer = %name, tick, "poll");

            if let Some(limit) = fail_after_ticks
                && tick >= limit
            {
                let err: TickError = PollError::Simulated { ticks: tick }.into();
                return Err(err);
            }
            Ok(TickResult::CONTINUE)
        }
    })
}
