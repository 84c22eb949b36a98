//! Poll configuration
//!
//! Re-exports the shared config types from pollkeeper-types and adds
//! persistence (confy, TOML) plus conversion into timer parameters.

use std::time::Duration;

pub use pollkeeper_types::{PollConfig, PollLoopPreset};

use super::error::ConfigError;

const APP_NAME: &str = "pollkeeper";
const CONFIG_NAME: &str = "config";

/// A preset that passed validation, ready for `TimerFactory::create`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollLoopSpec {
    pub name: String,
    pub interval: Duration,
    pub fail_after_ticks: Option<u64>,
}

/// Extension trait for PollConfig persistence and validation
pub trait PollConfigExt: Sized {
    /// Load from disk, falling back to defaults on any error
    fn load() -> Self;
    fn try_load() -> Result<Self, ConfigError>;
    fn save(&self) -> Result<(), ConfigError>;
    fn default_interval(&self) -> Result<Duration, ConfigError>;
    fn stop_timeout(&self) -> Duration;
    fn poll_loop_specs(&self) -> Result<Vec<PollLoopSpec>, ConfigError>;
}

impl PollConfigExt for PollConfig {
    fn load() -> Self {
        match Self::try_load() {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "using default poll configuration");
                Self::default()
            }
        }
    }

    fn try_load() -> Result<Self, ConfigError> {
        Ok(confy::load(APP_NAME, CONFIG_NAME)?)
    }

    fn save(&self) -> Result<(), ConfigError> {
        confy::store(APP_NAME, CONFIG_NAME, self).map_err(ConfigError::Save)
    }

    fn default_interval(&self) -> Result<Duration, ConfigError> {
        if self.default_interval_ms == 0 {
            return Err(ConfigError::InvalidDefaultInterval);
        }
        Ok(Duration::from_millis(self.default_interval_ms))
    }

    fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    fn poll_loop_specs(&self) -> Result<Vec<PollLoopSpec>, ConfigError> {
        if let Some(name) = self.invalid_presets().first() {
            return Err(ConfigError::InvalidPreset {
                name: name.to_string(),
            });
        }

        Ok(self
            .poll_loops
            .iter()
            .map(|preset| PollLoopSpec {
                name: preset.name.clone(),
                interval: Duration::from_millis(preset.interval_ms),
                fail_after_ticks: preset.fail_after_ticks,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_converts_to_specs() {
        let config = PollConfig::default();
        let specs = config.poll_loop_specs().unwrap();

        assert_eq!(specs.len(), 2);
        assert_eq!(specs[0].name, "torrents");
        assert_eq!(specs[0].interval, Duration::from_millis(1500));
        assert_eq!(config.default_interval().unwrap(), Duration::from_secs(1));
        assert_eq!(config.stop_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn zero_interval_preset_is_rejected() {
        let mut config = PollConfig::default();
        config.poll_loops.push(PollLoopPreset::new("search", 0));

        match config.poll_loop_specs() {
            Err(ConfigError::InvalidPreset { name }) => assert_eq!(name, "search"),
            other => panic!("expected InvalidPreset, got {other:?}"),
        }
    }

    #[test]
    fn zero_default_interval_is_rejected() {
        let config = PollConfig {
            default_interval_ms: 0,
            ..PollConfig::default()
        };
        assert!(matches!(
            config.default_interval(),
            Err(ConfigError::InvalidDefaultInterval)
        ));
    }
}
