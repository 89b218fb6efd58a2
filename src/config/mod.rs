//! Layered configuration
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. User config (`$XDG_CONFIG_HOME/assetkit/config.toml`)
//! 3. Project config (`./assetkit.toml`)
//! 4. CLI flags

mod defaults;
mod effective;
mod merge;

pub use defaults::{ComposeSettings, ExcludeSettings, InstallSettings, ResolveSettings, Settings};
pub use effective::{user_config_path, ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig, PROJECT_CONFIG_FILE};
pub use merge::{deep_merge, merge_layers};
