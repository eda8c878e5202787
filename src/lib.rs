#![forbid(unsafe_code)]

pub mod admin;
pub mod cli;
pub mod clock;
pub mod config;
pub mod core;
pub mod error;
pub mod paths;
pub mod replication;
pub mod telemetry;

pub use error::{Effect, Error, Transience};
pub type Result<T> = std::result::Result<T, Error>;

// Re-export core types at crate root for convenience
pub use crate::core::{
    AckExpectation, AuthMetadata, ClusterDirectoryMetadata, ClusterMetadata, ClusterVersion,
    Crdt, DatabaseId, DatabaseMetadata, Deletable, EntityMap, Lww, MachineId, MachineMetadata,
    NameString, PeerId, SemilatticeView, Stamp, TableConfig, TableId, TableMetadata, WriteStamp,
};
