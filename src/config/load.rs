use std::fs;
use std::path::{Path, PathBuf};

use super::merge::{apply_env_overrides, merge_layers};
use super::{Config, ConfigError, ConfigLayer};

/// Name of the per-cluster layer kept next to a metadata file.
pub const LOCAL_CONFIG_FILE: &str = "clustermeta.toml";

pub fn config_path() -> PathBuf {
    crate::paths::config_dir().join("config.toml")
}

pub fn local_config_path(dir: &Path) -> PathBuf {
    dir.join(LOCAL_CONFIG_FILE)
}

fn read_layer(path: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub fn load_user_config() -> Result<Option<ConfigLayer>, ConfigError> {
    read_layer(&config_path())
}

pub fn load_local_config(dir: &Path) -> Result<Option<ConfigLayer>, ConfigError> {
    read_layer(&local_config_path(dir))
}

pub fn load() -> Result<Config, ConfigError> {
    load_for_dir(None)
}

/// User layer, then the layer in `dir` (if any), then env overrides.
pub fn load_for_dir(dir: Option<&Path>) -> Result<Config, ConfigError> {
    let user = load_user_config()?;
    let local = match dir {
        Some(dir) => load_local_config(dir)?,
        None => None,
    };
    let mut config = merge_layers(user, local);
    apply_env_overrides(&mut config);
    Ok(config)
}

/// Like [`load_for_dir`], but falls back to defaults on a broken file.
pub fn load_or_default(dir: Option<&Path>) -> Config {
    match load_for_dir(dir) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("config load failed, using defaults: {e}");
            let mut cfg = Config::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    }
}

pub fn write_config(path: &Path, cfg: &Config) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    let contents = toml::to_string_pretty(cfg)?;
    atomic_write(path, contents.as_bytes())
}

/// Write through a temp file in the same directory, then rename over `path`.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<(), ConfigError> {
    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let write_err = |source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };
    let temp = tempfile::NamedTempFile::new_in(dir).map_err(write_err)?;
    fs::write(temp.path(), data).map_err(write_err)?;
    temp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::admin::IdentifierFormat;
    use crate::config::{LogFormat, LogRotation};
    use crate::core::{NameString, PeerId};

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.node.peer_id = Some(PeerId::generate());
        cfg.node.server_name = Some(NameString::parse("alpha").unwrap());
        cfg.admin.identifier_format = IdentifierFormat::Uuid;
        cfg.logging.stdout = false;
        cfg.logging.file.enabled = true;
        cfg.logging.file.dir = Some(PathBuf::from("/tmp/cmeta-test-logs"));
        cfg.logging.file.rotation = LogRotation::Hourly;
        cfg.limits.max_metadata_bytes = 1234;

        write_config(&path, &cfg).expect("write config");
        let contents = fs::read_to_string(&path).expect("read config");
        let loaded: Config = toml::from_str(&contents).expect("parse config");

        assert_eq!(loaded.node.peer_id, cfg.node.peer_id);
        assert_eq!(loaded.node.server_name, cfg.node.server_name);
        assert_eq!(loaded.admin.identifier_format, IdentifierFormat::Uuid);
        assert!(!loaded.logging.stdout);
        assert_eq!(loaded.logging.file.format, LogFormat::Json);
        assert_eq!(loaded.logging.file.rotation, LogRotation::Hourly);
        assert_eq!(loaded.limits.max_metadata_bytes, 1234);
    }

    #[test]
    fn local_layer_is_read_from_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(
            local_config_path(dir.path()),
            "[admin]\nidentifier_format = \"uuid\"\n",
        )
        .unwrap();
        let layer = load_local_config(dir.path()).unwrap().unwrap();
        assert_eq!(layer.admin.identifier_format, Some(IdentifierFormat::Uuid));
        assert!(load_local_config(&dir.path().join("missing")).unwrap().is_none());
    }

    #[test]
    fn broken_layer_reports_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = local_config_path(dir.path());
        fs::write(&path, "admin = [").unwrap();
        let err = load_local_config(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(LOCAL_CONFIG_FILE));
    }
}
