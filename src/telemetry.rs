//! `tracing` subscriber for the `cmeta` binary.
//!
//! Events go to stderr (so stdout stays clean for `--json`) and optionally
//! to a rolling file under the log dir. Old log files are pruned at startup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::metadata::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{FileLoggingConfig, LogFormat, LogRotation, LoggingConfig};
use crate::paths;

const LOG_FILE_PREFIX: &str = "cmeta.log";
const FILTER_ENV: &str = "CMETA_LOG";

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

#[derive(Clone, Debug)]
pub struct TelemetryConfig {
    pub verbosity: u8,
    pub logging: LoggingConfig,
}

impl TelemetryConfig {
    pub fn new(verbosity: u8, logging: LoggingConfig) -> Self {
        Self { verbosity, logging }
    }
}

/// Flushes the file writer on drop.
pub struct TelemetryGuard {
    _file: Option<WorkerGuard>,
}

/// What happened while preparing the file sink. Reported once the
/// subscriber is live.
enum FileSetup {
    Disabled,
    Ready { dir: PathBuf, pruned: Vec<PathBuf> },
    Failed(String),
}

/// Install the global subscriber. Keep the guard alive until exit.
pub fn init(config: TelemetryConfig) -> TelemetryGuard {
    let logging = &config.logging;
    let mut layers: Vec<BoxedLayer> = Vec::new();
    if logging.stdout {
        layers.push(format_layer(logging.stdout_format, std::io::stderr, true));
    }

    let (setup, guard) = match file_layer(&logging.file) {
        Ok(Some((layer, guard, dir, pruned))) => {
            layers.push(layer);
            (FileSetup::Ready { dir, pruned }, Some(guard))
        }
        Ok(None) => (FileSetup::Disabled, None),
        Err(reason) => (FileSetup::Failed(reason), None),
    };

    layers.push(Box::new(env_filter(config.verbosity, logging.filter.as_deref())));
    // A second init (tests, embedding) keeps the first subscriber.
    let _ = Registry::default().with(layers).try_init();

    match setup {
        FileSetup::Disabled => {}
        FileSetup::Ready { dir, pruned } => {
            tracing::debug!(dir = %dir.display(), pruned = pruned.len(), "file logging enabled");
        }
        FileSetup::Failed(reason) => tracing::warn!("file logging disabled: {reason}"),
    }

    TelemetryGuard { _file: guard }
}

type FileLayer = (BoxedLayer, WorkerGuard, PathBuf, Vec<PathBuf>);

fn file_layer(file: &FileLoggingConfig) -> Result<Option<FileLayer>, String> {
    if !file.enabled {
        return Ok(None);
    }
    let dir = file.dir.clone().unwrap_or_else(paths::log_dir);
    fs::create_dir_all(&dir).map_err(|err| format!("cannot create {}: {err}", dir.display()))?;

    let retention = Retention::from(file);
    let pruned = if retention.is_unbounded() {
        Vec::new()
    } else {
        retention
            .prune_dir(&dir, SystemTime::now())
            .map_err(|err| format!("cannot prune {}: {err}", dir.display()))?
    };

    let appender = RollingFileAppender::new(rotation(file.rotation), &dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok(Some((format_layer(file.format, writer, false), guard, dir, pruned)))
}

/// `CMETA_LOG`, then the configured filter, then `-v` count.
fn env_filter(verbosity: u8, configured: Option<&str>) -> EnvFilter {
    let builder = EnvFilter::builder().with_default_directive(verbosity_level(verbosity).into());
    if std::env::var_os(FILTER_ENV).is_some() {
        builder.with_env_var(FILTER_ENV).from_env_lossy()
    } else {
        builder.parse_lossy(configured.unwrap_or_default())
    }
}

fn format_layer<W>(format: LogFormat, writer: W, ansi: bool) -> BoxedLayer
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    if format == LogFormat::Tree {
        return Box::new(
            tracing_tree::HierarchicalLayer::new(2)
                .with_ansi(ansi)
                .with_targets(true)
                .with_writer(writer),
        );
    }
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_thread_names(true);
    match format {
        LogFormat::Pretty => Box::new(fmt.pretty().with_ansi(ansi)),
        LogFormat::Json => Box::new(fmt.json().with_current_span(true)),
        LogFormat::Compact | LogFormat::Tree => Box::new(fmt.compact().with_ansi(ansi)),
    }
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
        LogRotation::Never => Rotation::NEVER,
    }
}

fn verbosity_level(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// How many rotated log files to keep, and for how long.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Retention {
    max_age: Option<Duration>,
    max_files: Option<usize>,
}

impl From<&FileLoggingConfig> for Retention {
    fn from(file: &FileLoggingConfig) -> Self {
        Self {
            max_age: file
                .retention_max_age_days
                .map(|days| Duration::from_secs(days.saturating_mul(86_400))),
            max_files: file.retention_max_files,
        }
    }
}

impl Retention {
    fn is_unbounded(&self) -> bool {
        self.max_age.is_none() && self.max_files.is_none()
    }

    /// Files from `logs` (path, mtime) that fall outside the limits. Expired
    /// files go first, then the oldest survivors beyond `max_files`.
    fn expired(&self, mut logs: Vec<(PathBuf, SystemTime)>, now: SystemTime) -> Vec<PathBuf> {
        logs.sort_by_key(|(_, modified)| *modified);
        let age = |modified: SystemTime| now.duration_since(modified).unwrap_or_default();
        let (mut doomed, kept): (Vec<_>, Vec<_>) = logs
            .into_iter()
            .partition(|(_, modified)| self.max_age.is_some_and(|max| age(*modified) > max));
        if let Some(max_files) = self.max_files {
            let excess = kept.len().saturating_sub(max_files);
            doomed.extend(kept.into_iter().take(excess));
        }
        doomed.into_iter().map(|(path, _)| path).collect()
    }

    /// Removes expired `cmeta.log*` files in `dir`; returns what was removed.
    fn prune_dir(&self, dir: &Path, now: SystemTime) -> std::io::Result<Vec<PathBuf>> {
        let mut logs = Vec::new();
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let is_log = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX));
            let meta = entry.metadata()?;
            if is_log && meta.is_file() {
                logs.push((entry.path(), meta.modified().unwrap_or(now)));
            }
        }
        let removed = self
            .expired(logs, now)
            .into_iter()
            .filter(|path| fs::remove_file(path).is_ok())
            .collect();
        Ok(removed)
    }
}
