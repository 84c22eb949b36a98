//! Post-tick decision returned by a tick handler

use std::time::Duration;

use super::error::TimerError;

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickAction {
    Continue,
    Pause,
    Stop,
}

/// Immutable result of one tick.
///
/// Use the [`CONTINUE`](Self::CONTINUE), [`PAUSE`](Self::PAUSE) and
/// [`STOP`](Self::STOP) constants for the common cases, or
/// [`continue_with`](Self::continue_with) to change the interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickResult {
    action: TickAction,
    updated_interval: Option<Duration>,
}

impl TickResult {
    pub const CONTINUE: TickResult = TickResult::of(TickAction::Continue);
    pub const PAUSE: TickResult = TickResult::of(TickAction::Pause);
    pub const STOP: TickResult = TickResult::of(TickAction::Stop);

    const fn of(action: TickAction) -> Self {
        Self {
            action,
            updated_interval: None,
        }
    }

    /// Keep ticking, at a new interval from the next wait on
    pub fn continue_with(interval: Duration) -> Result<Self, TimerError> {
        if interval.is_zero() {
            return Err(TimerError::InvalidInterval);
        }
        Ok(Self {
            action: TickAction::Continue,
            updated_interval: Some(interval),
        })
    }

    pub fn action(&self) -> TickAction {
        self.action
    }

    pub fn updated_interval(&self) -> Option<Duration> {
        self.updated_interval
    }
}

impl Default for TickResult {
    fn default() -> Self {
        Self::CONTINUE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_results_carry_no_interval() {
        assert_eq!(TickResult::CONTINUE.action(), TickAction::Continue);
        assert_eq!(TickResult::PAUSE.action(), TickAction::Pause);
        assert_eq!(TickResult::STOP.action(), TickAction::Stop);
        assert!(TickResult::STOP.updated_interval().is_none());
    }

    #[test]
    fn continue_with_interval() {
        let result = TickResult::continue_with(Duration::from_millis(250)).unwrap();
        assert_eq!(result.action(), TickAction::Continue);
        assert_eq!(result.updated_interval(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn continue_with_zero_is_rejected() {
        assert_eq!(
            TickResult::continue_with(Duration::ZERO),
            Err(TimerError::InvalidInterval)
        );
    }
}
