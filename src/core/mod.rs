//! Cluster metadata semilattice (Layers 0-7)
//!
//! Module hierarchy follows type dependency order:
//! - time: HLC primitives (Layer 0)
//! - identity: DatabaseId, MachineId, TableId, PeerId, NameString (Layer 1)
//! - crdt: Crdt, Lww<T> (Layer 2)
//! - deletable: Deletable<T> (Layer 3)
//! - entity_map: EntityMap<K, T> (Layer 4)
//! - database, machine, table, auth: entity payloads (Layer 5)
//! - cluster: ClusterMetadata (Layer 6)
//! - ops, view: local edits and the node replica (Layer 7)
//!
//! meta and directory sit beside the layers: the versioned envelope and the
//! per-peer state that is published rather than joined.

pub mod auth;
pub mod cluster;
pub mod crdt;
pub mod database;
pub mod deletable;
pub mod directory;
pub mod entity_map;
pub mod error;
pub mod identity;
pub mod limits;
pub mod machine;
pub mod meta;
pub mod ops;
pub mod table;
pub mod time;
pub mod view;

pub use auth::{AuthKey, AuthMetadata};
pub use cluster::ClusterMetadata;
pub use crdt::{Crdt, Lww};
pub use database::{DatabaseMetadata, DatabasesMetadata};
pub use deletable::Deletable;
pub use directory::{
    ClusterDirectoryMetadata, DirectoryView, PeerType, ShardActivity, TableDirectoryEntry,
};
pub use entity_map::EntityMap;
pub use error::{
    CoreError, DecodeError, DirectoryError, EncodeError, InvalidConfig, InvalidId, InvalidName,
    OpError,
};
pub use identity::{ContentDigest, DatabaseId, MachineId, NameString, PeerId, ServerTag, TableId};
pub use limits::Limits;
pub use machine::{MachineMetadata, MachinesMetadata};
pub use meta::{ClusterVersion, Envelope, Versioned, deserialize_versioned, serialize_versioned};
pub use ops::{DEFAULT_PRIMARY_KEY, MetadataEditor};
pub use table::{
    AckExpectation, Shard, TableConfig, TableMetadata, TableReplicationInfo, TablesMetadata,
};
pub use time::{Stamp, WallClock, WriteStamp};
pub use view::SemilatticeView;
