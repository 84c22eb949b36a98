mod config;
mod error;

pub use config::{PollConfig, PollConfigExt, PollLoopPreset, PollLoopSpec};
pub use error::ConfigError;
