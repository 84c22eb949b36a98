//! Shared timer and configuration types for pollkeeper
//!
//! This crate contains serializable types that are shared between the
//! scheduling core (pollkeeper-core) and whatever renders timer health
//! (the REPL host, or a diagnostics view).

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Timer State
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle state of a managed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TimerState {
    /// Not running. Initial state, and the state after `stop`.
    #[default]
    Stopped,
    /// Loop is active and counting down to the next tick
    Running,
    /// Loop is parked on its resume gate
    Paused,
    /// The tick handler failed; the loop has exited
    Faulted,
}

impl TimerState {
    /// Returns true if a run loop exists for this state (Running or Paused)
    pub fn is_active(&self) -> bool {
        matches!(self, TimerState::Running | TimerState::Paused)
    }

    /// Returns true if `start` is permitted from this state
    pub fn can_start(&self) -> bool {
        matches!(self, TimerState::Stopped | TimerState::Faulted)
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Faulted => "faulted",
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Diagnostics
// ─────────────────────────────────────────────────────────────────────────────

/// Point-in-time readout of a single timer, as shown in a diagnostics panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerSnapshot {
    pub name: String,
    pub state: TimerState,
    pub interval_ms: u64,
    pub last_tick_utc: Option<DateTime<Utc>>,
    /// Only present while the timer is counting down
    pub next_tick_utc: Option<DateTime<Utc>>,
    /// Rendered message of the fault that stopped the timer
    pub last_fault: Option<String>,
}

impl TimerSnapshot {
    pub fn is_healthy(&self) -> bool {
        self.state != TimerState::Faulted
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Poll Config
// ─────────────────────────────────────────────────────────────────────────────

/// A named poll loop that the host creates at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollLoopPreset {
    pub name: String,
    pub interval_ms: u64,
    /// Make the demo handler fail after this many ticks (fault drill)
    #[serde(default)]
    pub fail_after_ticks: Option<u64>,
}

impl PollLoopPreset {
    pub fn new(name: impl Into<String>, interval_ms: u64) -> Self {
        Self {
            name: name.into(),
            interval_ms,
            fail_after_ticks: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Interval used when a command does not give one
    #[serde(default = "default_interval_ms")]
    pub default_interval_ms: u64,
    /// How long the host waits for a draining stop/dispose
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
    #[serde(default)]
    pub poll_loops: Vec<PollLoopPreset>,
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_stop_timeout_ms() -> u64 {
    5000
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: default_interval_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
            poll_loops: vec![
                PollLoopPreset::new("torrents", 1500),
                PollLoopPreset::new("rss", 30_000),
            ],
        }
    }
}

impl PollConfig {
    /// Find a preset by name
    pub fn preset(&self, name: &str) -> Option<&PollLoopPreset> {
        self.poll_loops.iter().find(|p| p.name == name)
    }

    /// Names of presets whose interval is zero (rejected at load time)
    pub fn invalid_presets(&self) -> Vec<&str> {
        self.poll_loops
            .iter()
            .filter(|p| p.interval_ms == 0)
            .map(|p| p.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn active_states() {
        assert!(TimerState::Running.is_active());
        assert!(TimerState::Paused.is_active());
        assert!(!TimerState::Stopped.is_active());
        assert!(!TimerState::Faulted.is_active());
    }

    #[test]
    fn startable_states() {
        assert!(TimerState::Stopped.can_start());
        assert!(TimerState::Faulted.can_start());
        assert!(!TimerState::Running.can_start());
        assert!(!TimerState::Paused.can_start());
    }

    #[test]
    fn state_display() {
        assert_eq!(TimerState::Faulted.to_string(), "faulted");
        assert_eq!(TimerState::default(), TimerState::Stopped);
    }

    #[test]
    fn config_missing_fields_use_defaults() {
        let config: PollConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_interval_ms, 1000);
        assert_eq!(config.stop_timeout_ms, 5000);
        assert!(config.poll_loops.is_empty());
    }

    #[test]
    fn config_preset_lookup() {
        let config: PollConfig = toml::from_str(
            r#"
            [[poll_loops]]
            name = "search"
            interval_ms = 500
            fail_after_ticks = 3

            [[poll_loops]]
            name = "broken"
            interval_ms = 0
            "#,
        )
        .unwrap();

        let search = config.preset("search").unwrap();
        assert_eq!(search.interval_ms, 500);
        assert_eq!(search.fail_after_ticks, Some(3));
        assert!(config.preset("rss").is_none());
        assert_eq!(config.invalid_presets(), vec!["broken"]);
    }
}
