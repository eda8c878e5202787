//! Config loading and persistence.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::{Effect, Transience};

mod load;
mod merge;
mod schema;

pub use load::{
    LOCAL_CONFIG_FILE, atomic_write, config_path, load, load_for_dir, load_local_config,
    load_or_default, load_user_config, local_config_path, write_config,
};
pub use merge::{apply_env_overrides, apply_overrides_from, merge_layers};
pub use schema::{
    AdminConfig, AdminConfigOverride, Config, ConfigLayer, FileLoggingConfig,
    FileLoggingConfigOverride, LimitsOverride, LogFormat, LogRotation, LoggingConfig,
    LoggingConfigOverride, NodeConfig, NodeConfigOverride,
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to render config: {0}")]
    Render(#[from] toml::ser::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl ConfigError {
    pub fn transience(&self) -> Transience {
        match self {
            ConfigError::Read { .. } | ConfigError::Write { .. } => Transience::Unknown,
            ConfigError::Parse { .. } | ConfigError::Render(_) => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            ConfigError::Write { .. } => Effect::Unknown,
            _ => Effect::None,
        }
    }
}
