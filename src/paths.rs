//! XDG directory helpers for config, data and log locations.

use std::path::PathBuf;

const APP_DIR: &str = "clustermeta";

fn xdg_base(var: &str, fallback: &[&str]) -> PathBuf {
    std::env::var(var)
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            let mut base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
            for part in fallback {
                base.push(part);
            }
            base
        })
}

/// Base directory for configuration files.
///
/// Uses `CMETA_CONFIG_DIR` if set, otherwise `$XDG_CONFIG_HOME/clustermeta`
/// or `~/.config/clustermeta`.
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CMETA_CONFIG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    xdg_base("XDG_CONFIG_HOME", &[".config"]).join(APP_DIR)
}

/// Base directory for persistent data (metadata files).
///
/// Uses `CMETA_DATA_DIR` if set, otherwise `$XDG_DATA_HOME/clustermeta` or
/// `~/.local/share/clustermeta`.
pub fn data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CMETA_DATA_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    xdg_base("XDG_DATA_HOME", &[".local", "share"]).join(APP_DIR)
}

/// Default cluster metadata file.
pub fn metadata_path() -> PathBuf {
    data_dir().join("cluster.meta")
}

pub fn log_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CMETA_LOG_DIR")
        && !dir.trim().is_empty()
    {
        return PathBuf::from(dir);
    }
    xdg_base("XDG_STATE_HOME", &[".local", "state"])
        .join(APP_DIR)
        .join("logs")
}
