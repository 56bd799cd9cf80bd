//! Configuration management.
//!
//! Settings live in a TOML file split into sections that can be
//! updated independently. The manager handles atomic writes and
//! load-or-create semantics.

mod manager;
mod settings;

pub use manager::{ConfigError, ConfigManager, ConfigResult};
pub use settings::{
    AdvancedSettings, AudioSettings, ConfigSection, LoggingSettings, PathSettings, Settings,
    VideoSettings,
};
