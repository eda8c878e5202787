//! Core capability errors (parsing, validation, versioned codec).
//!
//! These are bounded and stable: core errors represent domain/refusal states,
//! not library implementation details.

use std::convert::Infallible;

use thiserror::Error;

use crate::error::{Effect, Transience};

use super::identity::PeerId;
use super::meta::ClusterVersion;

/// Invalid identifier string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InvalidId {
    #[error("database id `{raw}` is invalid: {reason}")]
    Database { raw: String, reason: String },
    #[error("machine id `{raw}` is invalid: {reason}")]
    Machine { raw: String, reason: String },
    #[error("table id `{raw}` is invalid: {reason}")]
    Table { raw: String, reason: String },
    #[error("peer id `{raw}` is invalid: {reason}")]
    Peer { raw: String, reason: String },
    #[error("content digest `{raw}` is invalid: {reason}")]
    Digest { raw: String, reason: String },
}

/// Invalid user-facing name (database, table, server, tag).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} `{raw}` is invalid: {reason}")]
pub struct InvalidName {
    pub kind: &'static str,
    pub raw: String,
    pub reason: String,
}

/// Table sharding configuration that cannot be served.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid table config: {reason}")]
pub struct InvalidConfig {
    pub reason: String,
}

/// Canonical error enum for core capability.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CoreError {
    #[error(transparent)]
    InvalidId(#[from] InvalidId),
    #[error(transparent)]
    InvalidName(#[from] InvalidName),
    #[error(transparent)]
    InvalidConfig(#[from] InvalidConfig),
}

impl CoreError {
    pub fn transience(&self) -> Transience {
        // Core errors are pure domain/input failures.
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Failure to write a versioned envelope.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EncodeError {
    #[error("{kind} cannot be written at {requested}; oldest writable version is {min}")]
    UnsupportedVersion {
        kind: &'static str,
        requested: ClusterVersion,
        min: ClusterVersion,
    },
    #[error("json encode: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cbor encode: {0}")]
    Cbor(#[from] minicbor::encode::Error<Infallible>),
}

impl EncodeError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Failure to read a versioned envelope.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    #[error("{kind} with version tag {found} predates the oldest supported version {min}")]
    UnsupportedVersion {
        kind: &'static str,
        found: u32,
        min: ClusterVersion,
    },
    #[error("unknown protocol version tag {0}")]
    UnknownVersion(u32),
    #[error("indefinite-length CBOR is not accepted")]
    IndefiniteLength,
    #[error("expected {expected} envelope, found {found}")]
    WrongKind { expected: &'static str, found: String },
    #[error("decode limit exceeded: {0}")]
    DecodeLimit(&'static str),
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("trailing bytes after envelope")]
    TrailingBytes,
    #[error("json decode: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cbor decode: {0}")]
    Cbor(#[from] minicbor::decode::Error),
}

impl DecodeError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }

    /// Whether this failure is a deliberate refusal of pre-release metadata.
    pub fn is_unsupported_version(&self) -> bool {
        matches!(self, DecodeError::UnsupportedVersion { .. })
    }
}

/// Refused directory publication.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DirectoryError {
    #[error("peer {origin} cannot publish the directory of peer {claimed}")]
    OriginMismatch { origin: PeerId, claimed: PeerId },
}

impl DirectoryError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Refused administrative edit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OpError {
    #[error("{kind} `{id}` does not exist")]
    NotFound { kind: &'static str, id: String },
    #[error("{kind} `{id}` was deleted")]
    Deleted { kind: &'static str, id: String },
    #[error("{kind} name `{name}` is already in use")]
    NameInUse { kind: &'static str, name: String },
    #[error(transparent)]
    InvalidConfig(#[from] CoreError),
}

impl OpError {
    pub fn transience(&self) -> Transience {
        Transience::Permanent
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}
