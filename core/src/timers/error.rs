//! Error types for timer operations

use std::error::Error;
use std::sync::Arc;
use thiserror::Error;

/// Error returned by a tick handler. Any error type can be boxed into it.
pub type TickError = Box<dyn Error + Send + Sync + 'static>;

/// Errors from direct API misuse or a cancelled call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimerError {
    #[error("timer interval must be greater than zero")]
    InvalidInterval,

    #[error("timer operation was cancelled")]
    Cancelled,
}

/// Why a timer ended up `Faulted`. Stored as the timer's last fault.
#[derive(Debug, Clone, Error)]
pub enum TimerFault {
    #[error("tick handler failed: {0}")]
    Handler(#[source] Arc<dyn Error + Send + Sync + 'static>),

    /// The handler panicked instead of producing a tick result
    #[error("tick handler panicked: {message}")]
    Panicked { message: String },

    #[error("timer loop invariant violated: {reason}")]
    Invariant { reason: String },
}

impl TimerFault {
    pub(crate) fn from_handler(err: TickError) -> Self {
        TimerFault::Handler(Arc::from(err))
    }

    /// The error the handler returned, if this fault came from one.
    ///
    /// Downcast it to recover the exact error instance:
    /// `fault.handler_error().and_then(|e| e.downcast_ref::<MyError>())`
    pub fn handler_error(&self) -> Option<&(dyn Error + Send + Sync + 'static)> {
        match self {
            TimerFault::Handler(err) => Some(err.as_ref()),
            _ => None,
        }
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TimerFault::Panicked { .. })
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "<unknown-panic-message-type>".to_string()
    }
}
