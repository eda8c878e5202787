//! Per-peer directory metadata.
//!
//! Unlike `ClusterMetadata`, directory values are never joined: each peer
//! publishes its own value and everyone else keeps the latest copy per origin.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::DirectoryError;
use super::identity::{MachineId, PeerId, TableId};
use super::meta::{ClusterVersion, Versioned};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerType {
    Server,
    Proxy,
}

impl PeerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerType::Server => "server",
            PeerType::Proxy => "proxy",
        }
    }
}

impl fmt::Display for PeerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a peer is doing for one shard of a table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShardActivity {
    Director,
    Replica,
    Backfilling,
    Nothing,
}

/// A peer's self-reported state for one table, keyed by shard index.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDirectoryEntry {
    pub shards: BTreeMap<usize, ShardActivity>,
}

impl Versioned for TableDirectoryEntry {
    const KIND: &'static str = "table_directory";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_13;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterDirectoryMetadata {
    pub rdb_namespaces: BTreeMap<TableId, TableDirectoryEntry>,
    pub machine_id: MachineId,
    pub peer_id: PeerId,
    pub cache_size: u64,
    pub ips: Vec<String>,
    /// Named mailbox addresses this peer accepts messages on.
    #[serde(default)]
    pub mailboxes: BTreeMap<String, String>,
    #[serde(default)]
    pub local_issues: Vec<String>,
    pub peer_type: PeerType,
}

impl ClusterDirectoryMetadata {
    pub fn new(machine_id: MachineId, peer_id: PeerId, peer_type: PeerType) -> Self {
        Self {
            rdb_namespaces: BTreeMap::new(),
            machine_id,
            peer_id,
            cache_size: 0,
            ips: Vec::new(),
            mailboxes: BTreeMap::new(),
            local_issues: Vec::new(),
            peer_type,
        }
    }

    /// Document form published to other peers.
    pub fn to_document(&self) -> Value {
        let namespaces: serde_json::Map<String, Value> = self
            .rdb_namespaces
            .iter()
            .map(|(table, entry)| {
                let shards: serde_json::Map<String, Value> = entry
                    .shards
                    .iter()
                    .map(|(idx, activity)| (idx.to_string(), json!(activity)))
                    .collect();
                (table.to_string(), Value::Object(shards))
            })
            .collect();
        json!({
            "rdb_namespaces": namespaces,
            "machine_id": self.machine_id.to_string(),
            "peer_id": self.peer_id.to_string(),
            "cache_size": self.cache_size,
            "ips": self.ips,
            "peer_type": self.peer_type.as_str(),
        })
    }
}

impl Versioned for ClusterDirectoryMetadata {
    const KIND: &'static str = "directory";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

#[derive(Clone, Debug)]
struct Published {
    version: u64,
    value: ClusterDirectoryMetadata,
}

/// Latest directory value seen from every connected peer.
#[derive(Clone, Debug, Default)]
pub struct DirectoryView {
    peers: BTreeMap<PeerId, Published>,
}

impl DirectoryView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `value` as published by `origin`.
    ///
    /// Returns `Ok(false)` when an equal or newer version from the same
    /// origin is already held.
    pub fn publish(
        &mut self,
        origin: PeerId,
        version: u64,
        value: ClusterDirectoryMetadata,
    ) -> Result<bool, DirectoryError> {
        if value.peer_id != origin {
            return Err(DirectoryError::OriginMismatch {
                origin,
                claimed: value.peer_id,
            });
        }
        if let Some(current) = self.peers.get(&origin)
            && current.version >= version
        {
            tracing::trace!(peer = %origin, version, held = current.version, "stale directory update");
            return Ok(false);
        }
        self.peers.insert(origin, Published { version, value });
        Ok(true)
    }

    /// Drop a disconnected peer.
    pub fn remove(&mut self, peer: &PeerId) -> Option<ClusterDirectoryMetadata> {
        self.peers.remove(peer).map(|p| p.value)
    }

    pub fn get(&self, peer: &PeerId) -> Option<&ClusterDirectoryMetadata> {
        self.peers.get(peer).map(|p| &p.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&PeerId, &ClusterDirectoryMetadata)> {
        self.peers.iter().map(|(id, p)| (id, &p.value))
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn peers_on_machine(&self, machine: MachineId) -> impl Iterator<Item = &PeerId> {
        self.peers
            .iter()
            .filter(move |(_, p)| p.value.machine_id == machine)
            .map(|(id, _)| id)
    }
}
