use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::admin::IdentifierFormat;
use crate::core::{Limits, NameString, PeerId};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub admin: AdminConfig,
    pub logging: LoggingConfig,
    pub limits: Limits,
}

/// Identity of this process in the cluster.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed peer id; a fresh one is minted per process when unset.
    pub peer_id: Option<PeerId>,
    pub server_name: Option<NameString>,
    /// Metadata file used when a command is given no path.
    pub metadata_path: Option<PathBuf>,
}

impl NodeConfig {
    pub fn peer_id_or_generate(&self) -> PeerId {
        self.peer_id.unwrap_or_else(PeerId::generate)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub identifier_format: IdentifierFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Tree,
    Pretty,
    Compact,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogRotation {
    Daily,
    Hourly,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub stdout: bool,
    pub stdout_format: LogFormat,
    pub filter: Option<String>,
    pub file: FileLoggingConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            stdout: true,
            stdout_format: LogFormat::Compact,
            filter: None,
            file: FileLoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLoggingConfig {
    pub enabled: bool,
    pub dir: Option<PathBuf>,
    pub format: LogFormat,
    pub rotation: LogRotation,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl Default for FileLoggingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            dir: None,
            format: LogFormat::Json,
            rotation: LogRotation::Daily,
            retention_max_age_days: Some(7),
            retention_max_files: Some(10),
        }
    }
}

/// One config file's worth of settings; unset fields leave the base alone.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ConfigLayer {
    pub node: NodeConfigOverride,
    pub admin: AdminConfigOverride,
    pub logging: LoggingConfigOverride,
    pub limits: LimitsOverride,
}

impl ConfigLayer {
    pub fn apply_to(&self, base: &mut Config) {
        self.node.apply_to(&mut base.node);
        self.admin.apply_to(&mut base.admin);
        self.logging.apply_to(&mut base.logging);
        self.limits.apply_to(&mut base.limits);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct NodeConfigOverride {
    pub peer_id: Option<PeerId>,
    pub server_name: Option<NameString>,
    pub metadata_path: Option<PathBuf>,
}

impl NodeConfigOverride {
    pub fn apply_to(&self, target: &mut NodeConfig) {
        keep_some(&mut target.peer_id, &self.peer_id);
        keep_some(&mut target.server_name, &self.server_name);
        keep_some(&mut target.metadata_path, &self.metadata_path);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AdminConfigOverride {
    pub identifier_format: Option<IdentifierFormat>,
}

impl AdminConfigOverride {
    pub fn apply_to(&self, target: &mut AdminConfig) {
        set(&mut target.identifier_format, &self.identifier_format);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfigOverride {
    pub stdout: Option<bool>,
    pub stdout_format: Option<LogFormat>,
    pub filter: Option<String>,
    pub file: Option<FileLoggingConfigOverride>,
}

impl LoggingConfigOverride {
    pub fn apply_to(&self, target: &mut LoggingConfig) {
        set(&mut target.stdout, &self.stdout);
        set(&mut target.stdout_format, &self.stdout_format);
        keep_some(&mut target.filter, &self.filter);
        if let Some(file) = &self.file {
            file.apply_to(&mut target.file);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileLoggingConfigOverride {
    pub enabled: Option<bool>,
    pub dir: Option<PathBuf>,
    pub format: Option<LogFormat>,
    pub rotation: Option<LogRotation>,
    pub retention_max_age_days: Option<u64>,
    pub retention_max_files: Option<usize>,
}

impl FileLoggingConfigOverride {
    pub fn apply_to(&self, target: &mut FileLoggingConfig) {
        set(&mut target.enabled, &self.enabled);
        keep_some(&mut target.dir, &self.dir);
        set(&mut target.format, &self.format);
        set(&mut target.rotation, &self.rotation);
        keep_some(&mut target.retention_max_age_days, &self.retention_max_age_days);
        keep_some(&mut target.retention_max_files, &self.retention_max_files);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LimitsOverride {
    pub max_metadata_bytes: Option<usize>,
    pub max_cbor_map_entries: Option<usize>,
    pub max_cbor_text_string_len: Option<usize>,
}

impl LimitsOverride {
    pub fn apply_to(&self, limits: &mut Limits) {
        set(&mut limits.max_metadata_bytes, &self.max_metadata_bytes);
        set(&mut limits.max_cbor_map_entries, &self.max_cbor_map_entries);
        set(&mut limits.max_cbor_text_string_len, &self.max_cbor_text_string_len);
    }
}

fn set<T: Clone>(target: &mut T, layer: &Option<T>) {
    if let Some(value) = layer {
        *target = value.clone();
    }
}

/// Like [`set`] for optional settings: a layer can fill one in but never clears it.
fn keep_some<T: Clone>(target: &mut Option<T>, layer: &Option<T>) {
    if layer.is_some() {
        target.clone_from(layer);
    }
}
