use thiserror::Error;

use crate::admin::AdminError;
use crate::cli::CliError;
use crate::config::ConfigError;
use crate::core::{CoreError, DecodeError, DirectoryError, EncodeError, OpError};
use crate::replication::ReplError;

/// Whether retrying this operation may succeed.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Transience {
    /// Retry will never help without changing inputs/state.
    Permanent,
    /// Retry may help (transient contention/outage).
    Retryable,
    /// Unknown if retry will help.
    Unknown,
}

impl Transience {
    pub fn is_retryable(self) -> bool {
        matches!(self, Transience::Retryable)
    }
}

/// What we know about side effects when an error is returned.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Effect {
    /// Definitely no side effects occurred.
    None,
    /// Side effects definitely occurred (locally or remotely).
    Some,
    /// We don't know if side effects occurred.
    Unknown,
}

impl Effect {
    pub fn as_str(self) -> &'static str {
        match self {
            Effect::None => "none",
            Effect::Some => "some",
            Effect::Unknown => "unknown",
        }
    }
}

/// Crate-level convenience error.
///
/// Not a "god error": it is a thin wrapper over canonical capability errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Op(#[from] OpError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Repl(#[from] ReplError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Cli(#[from] CliError),
}

impl Error {
    pub fn transience(&self) -> Transience {
        match self {
            Error::Core(e) => e.transience(),
            Error::Encode(e) => e.transience(),
            Error::Decode(e) => e.transience(),
            Error::Op(e) => e.transience(),
            Error::Directory(e) => e.transience(),
            Error::Admin(e) => e.transience(),
            Error::Repl(e) => e.transience(),
            Error::Config(e) => e.transience(),
            Error::Cli(e) => e.transience(),
        }
    }

    pub fn effect(&self) -> Effect {
        match self {
            Error::Core(e) => e.effect(),
            Error::Encode(e) => e.effect(),
            Error::Decode(e) => e.effect(),
            Error::Op(e) => e.effect(),
            Error::Directory(e) => e.effect(),
            Error::Admin(e) => e.effect(),
            Error::Repl(e) => e.effect(),
            Error::Config(e) => e.effect(),
            Error::Cli(e) => e.effect(),
        }
    }
}
