//! CLI surface for clustermeta.
//!
//! `cmeta` works offline on a versioned metadata file: it loads the file
//! into a node-local replica, runs one edit or query, and writes the result
//! back atomically.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::{ArgAction, Args, Parser, Subcommand, builder::BoolishValueParser};
use thiserror::Error;

use crate::admin::IdentifierFormat;
use crate::config::{self, Config};
use crate::core::{
    ClusterMetadata, ClusterVersion, DatabaseId, NameString, OpError, PeerId, SemilatticeView,
    TableId, deserialize_versioned, serialize_versioned,
};
use crate::error::{Effect, Transience};
use crate::{Error, Result};

mod commands;
mod render;

// =============================================================================
// Entry + global options
// =============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "cmeta",
    version,
    about = "Inspect and edit cluster metadata files",
    infer_subcommands = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Machine-readable JSON output.
    #[arg(
        long,
        global = true,
        default_value_t = false,
        num_args = 0..=1,
        value_parser = BoolishValueParser::new()
    )]
    pub json: bool,

    /// Metadata file (default: `node.metadata_path`, then the data dir).
    #[arg(long, short = 'f', global = true, value_name = "PATH")]
    pub file: Option<PathBuf>,

    /// Debug output (repeat for more).
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty metadata file.
    Init(InitArgs),

    /// Summarize the metadata file.
    #[command(alias = "show")]
    Inspect,

    /// Join other metadata files into this one.
    Join(JoinArgs),

    /// Database operations.
    #[command(alias = "database")]
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Table operations.
    Table {
        #[command(subcommand)]
        cmd: TableCmd,
    },

    /// Server operations.
    #[command(alias = "machine")]
    Server {
        #[command(subcommand)]
        cmd: ServerCmd,
    },

    /// Print the directory document a server would publish.
    Directory(DirectoryArgs),

    /// Push writes through a replicating in-memory shard and show what the
    /// master receives.
    Demo(DemoArgs),
}

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Files to join in.
    #[arg(required = true, value_name = "PATH")]
    pub others: Vec<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum DbCmd {
    /// Create a database.
    Create { name: String },
    /// Drop a database and its tables.
    Drop { name: String },
    /// Rename a database.
    Rename { from: String, to: String },
    /// List live databases.
    #[command(alias = "ls")]
    List,
}

#[derive(Subcommand, Debug)]
pub enum TableCmd {
    /// Create a table.
    Create(TableCreateArgs),
    /// Drop a table.
    Drop { db: String, name: String },
    /// Rename a table.
    Rename { db: String, from: String, to: String },
    /// Replace a table's shard layout.
    Reconfigure(TableReconfigureArgs),
    /// List `table_config` rows.
    #[command(alias = "ls")]
    List(TableListArgs),
    /// Show one `table_config` row by id.
    Get(TableGetArgs),
}

#[derive(Args, Debug)]
pub struct ShardArgs {
    /// Replica server (repeatable).
    #[arg(long = "replica", required = true, value_name = "SERVER")]
    pub replicas: Vec<String>,

    /// Director server (repeatable; must also be a replica).
    #[arg(long = "director", required = true, value_name = "SERVER")]
    pub directors: Vec<String>,

    /// Split point between shards (repeatable, increasing).
    #[arg(long = "split-point", value_name = "KEY")]
    pub split_points: Vec<String>,
}

#[derive(Args, Debug)]
pub struct TableCreateArgs {
    pub db: String,
    pub name: String,

    /// Primary key field (default: id).
    #[arg(long, value_name = "FIELD")]
    pub primary_key: Option<String>,

    #[command(flatten)]
    pub shards: ShardArgs,
}

#[derive(Args, Debug)]
pub struct TableReconfigureArgs {
    pub db: String,
    pub name: String,

    #[command(flatten)]
    pub shards: ShardArgs,
}

#[derive(Args, Debug)]
pub struct TableListArgs {
    /// How rows refer to databases (name or uuid).
    #[arg(long, value_name = "FORMAT")]
    pub identifier_format: Option<IdentifierFormat>,
}

#[derive(Args, Debug)]
pub struct TableGetArgs {
    /// Table id.
    pub id: String,

    #[arg(long, value_name = "FORMAT")]
    pub identifier_format: Option<IdentifierFormat>,
}

#[derive(Subcommand, Debug)]
pub enum ServerCmd {
    /// Add a server.
    Add { name: String },
    /// Remove a server.
    #[command(alias = "rm")]
    Remove { name: String },
    /// Rename a server.
    Rename { from: String, to: String },
    /// Replace a server's tags.
    Tag {
        name: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// List live servers.
    #[command(alias = "ls")]
    List,
}

#[derive(Args, Debug)]
pub struct DirectoryArgs {
    /// Server name (default: `node.server_name`).
    pub server: Option<String>,

    /// Address to advertise (repeatable).
    #[arg(long = "ip", value_name = "ADDR")]
    pub ips: Vec<String>,

    /// Publish as a proxy instead of a server.
    #[arg(long)]
    pub proxy: bool,
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of keys to write.
    #[arg(long, default_value_t = 3)]
    pub writes: usize,

    /// Run without a master (writes are applied but not forwarded).
    #[arg(long)]
    pub no_master: bool,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} already exists (use --force to overwrite)", path.display())]
    AlreadyExists { path: PathBuf },
    #[error("no metadata at {}; run `cmeta init` first", path.display())]
    Missing { path: PathBuf },
    #[error("invalid {field}: {reason}")]
    InvalidArgument { field: &'static str, reason: String },
    #[error("failed to write output: {0}")]
    Output(#[source] std::io::Error),
}

impl CliError {
    pub fn transience(&self) -> Transience {
        match self {
            CliError::Read { .. } | CliError::Output(_) => Transience::Unknown,
            _ => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            CliError::Output(_) => Effect::Unknown,
            _ => Effect::None,
        }
    }
}

// =============================================================================
// Dispatch
// =============================================================================

pub fn parse_from<I, T>(args: I) -> Cli
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::parse_from(args)
}

/// Run the CLI (used by bin).
pub fn run(cli: Cli) -> Result<()> {
    let (path, config) = resolve_file(cli.file)?;
    let ctx = Ctx {
        path,
        config,
        json: cli.json,
    };

    match cli.command {
        Commands::Init(args) => commands::init::handle(&ctx, args),
        Commands::Inspect => commands::inspect::handle(&ctx),
        Commands::Join(args) => commands::join::handle(&ctx, args),
        Commands::Db { cmd } => commands::db::handle(&ctx, cmd),
        Commands::Table { cmd } => commands::table::handle(&ctx, cmd),
        Commands::Server { cmd } => commands::server::handle(&ctx, cmd),
        Commands::Directory(args) => commands::directory::handle(&ctx, args),
        Commands::Demo(args) => commands::demo::handle(&ctx, args),
    }
}

pub(crate) struct Ctx {
    path: PathBuf,
    config: Config,
    json: bool,
}

impl Ctx {
    fn peer_id(&self) -> PeerId {
        self.config.node.peer_id_or_generate()
    }

    /// Load the metadata file into a fresh node-local replica.
    fn open(&self) -> Result<SemilatticeView<ClusterMetadata>> {
        let md = read_metadata(&self.path, &self.config)?;
        Ok(SemilatticeView::new(md, self.peer_id()))
    }

    fn save(&self, view: &SemilatticeView<ClusterMetadata>) -> Result<()> {
        write_metadata(&self.path, &view.get())
    }

    fn identifier_format(&self, flag: Option<IdentifierFormat>) -> IdentifierFormat {
        flag.unwrap_or(self.config.admin.identifier_format)
    }
}

/// `--file` wins; its directory may carry a cluster-local config layer.
fn resolve_file(file: Option<PathBuf>) -> Result<(PathBuf, Config)> {
    match file {
        Some(path) => {
            let config = config::load_for_dir(path.parent())?;
            Ok((path, config))
        }
        None => {
            let config = config::load()?;
            let path = config
                .node
                .metadata_path
                .clone()
                .unwrap_or_else(crate::paths::metadata_path);
            Ok((path, config))
        }
    }
}

fn read_metadata(path: &Path, config: &Config) -> Result<ClusterMetadata> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CliError::Missing {
                path: path.to_path_buf(),
            }
            .into());
        }
        Err(source) => {
            return Err(CliError::Read {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };
    let md = deserialize_versioned(&bytes, &config.limits)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "loaded metadata");
    Ok(md)
}

fn write_metadata(path: &Path, md: &ClusterMetadata) -> Result<()> {
    let bytes = serialize_versioned(md, ClusterVersion::LATEST)?;
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
    {
        std::fs::create_dir_all(dir).map_err(|source| config::ConfigError::Write {
            path: dir.to_path_buf(),
            source,
        })?;
    }
    config::atomic_write(path, &bytes)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote metadata");
    Ok(())
}

fn parse_name(field: &'static str, raw: &str) -> Result<NameString> {
    NameString::parse(raw.trim()).map_err(|err| {
        CliError::InvalidArgument {
            field,
            reason: err.to_string(),
        }
        .into()
    })
}

fn database_named(md: &ClusterMetadata, raw: &str) -> Result<DatabaseId> {
    let name = parse_name("database", raw)?;
    md.live_database_named(&name).ok_or_else(|| {
        Error::from(OpError::NotFound {
            kind: "database",
            id: name.to_string(),
        })
    })
}

fn table_named(md: &ClusterMetadata, db: &str, raw: &str) -> Result<TableId> {
    let db = database_named(md, db)?;
    let name = parse_name("table", raw)?;
    md.live_table_named(db, &name).ok_or_else(|| {
        Error::from(OpError::NotFound {
            kind: "table",
            id: name.to_string(),
        })
    })
}

/// Print `value` as JSON, or `human` otherwise. A closed stdout is not an error.
fn print_out(json: bool, value: &serde_json::Value, human: impl FnOnce() -> String) -> Result<()> {
    let s = if json {
        serde_json::to_string_pretty(value).map_err(crate::core::EncodeError::from)?
    } else {
        human()
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{s}")
        && e.kind() != std::io::ErrorKind::BrokenPipe
    {
        return Err(CliError::Output(e).into());
    }
    Ok(())
}
