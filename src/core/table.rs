//! Layer 5: Table entity and its sharding configuration
//!
//! TableConfig: ordered shards, each with replica and director names
//! TableReplicationInfo: config + directors chosen for it + write acks
//! TableMetadata: the joinable table entity

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::crdt::{Crdt, Lww};
use super::entity_map::EntityMap;
use super::error::{CoreError, InvalidConfig};
use super::identity::{DatabaseId, MachineId, NameString, TableId};
use super::meta::{ClusterVersion, Versioned};

/// One contiguous key range of a table.
///
/// The shard covers keys from the previous shard's split point (inclusive)
/// up to its own split point (exclusive). The last shard has no split point.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Shard {
    pub split_point: Option<String>,
    pub replica_names: BTreeSet<NameString>,
    pub director_names: BTreeSet<NameString>,
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableConfig {
    pub shards: Vec<Shard>,
}

impl TableConfig {
    /// A single shard covering the whole key space.
    pub fn single_shard(replicas: BTreeSet<NameString>, director: NameString) -> Self {
        Self {
            shards: vec![Shard {
                split_point: None,
                replica_names: replicas,
                director_names: BTreeSet::from([director]),
            }],
        }
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        let invalid = |reason: String| -> CoreError { InvalidConfig { reason }.into() };

        if self.shards.is_empty() {
            return Err(invalid("table must have at least one shard".into()));
        }
        let last = self.shards.len() - 1;
        let mut prev_split: Option<&str> = None;
        for (idx, shard) in self.shards.iter().enumerate() {
            match (&shard.split_point, idx == last) {
                (Some(_), true) => {
                    return Err(invalid("last shard must not have a split point".into()));
                }
                (None, false) => {
                    return Err(invalid(format!("shard {idx} is missing its split point")));
                }
                (Some(split), false) => {
                    if let Some(prev) = prev_split
                        && split.as_str() <= prev
                    {
                        return Err(invalid(format!(
                            "split point `{split}` of shard {idx} does not follow `{prev}`"
                        )));
                    }
                    prev_split = Some(split);
                }
                (None, true) => {}
            }
            if shard.replica_names.is_empty() {
                return Err(invalid(format!("shard {idx} has no replicas")));
            }
            if shard.director_names.is_empty() {
                return Err(invalid(format!("shard {idx} has no director")));
            }
            if let Some(stray) = shard.director_names.difference(&shard.replica_names).next() {
                return Err(invalid(format!(
                    "director `{stray}` of shard {idx} is not one of its replicas"
                )));
            }
        }
        Ok(())
    }

    /// Index of the shard whose range holds `key`.
    pub fn shard_index_for_key(&self, key: &str) -> usize {
        self.shards
            .iter()
            .position(|shard| match &shard.split_point {
                Some(split) => key < split.as_str(),
                None => true,
            })
            .unwrap_or(self.shards.len().saturating_sub(1))
    }
}

/// How many acknowledgements a write waits for, and whether they must be
/// on disk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AckExpectation {
    expectation: u32,
    hard_durability: bool,
}

impl AckExpectation {
    pub fn new(expectation: u32, hard_durability: bool) -> Self {
        Self {
            expectation,
            hard_durability,
        }
    }

    pub fn expectation(&self) -> u32 {
        self.expectation
    }

    pub fn is_hardly_durable(&self) -> bool {
        self.hard_durability
    }
}

impl Default for AckExpectation {
    fn default() -> Self {
        Self::new(1, true)
    }
}

impl fmt::Display for AckExpectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ack_expectation{{durability={}, acks={}}}",
            if self.hard_durability { "hard" } else { "soft" },
            self.expectation
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TableReplicationInfo {
    pub config: TableConfig,
    /// One director per shard, resolved from `director_names`.
    pub chosen_directors: Vec<MachineId>,
    #[serde(default)]
    pub write_ack: AckExpectation,
}

impl TableReplicationInfo {
    pub fn new(config: TableConfig, chosen_directors: Vec<MachineId>) -> Self {
        Self {
            config,
            chosen_directors,
            write_ack: AckExpectation::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMetadata {
    pub name: Lww<NameString>,
    pub database: Lww<DatabaseId>,
    pub primary_key: Lww<String>,
    pub replication_info: Lww<TableReplicationInfo>,
}

impl Crdt for TableMetadata {
    fn join(&self, other: &Self) -> Self {
        Self {
            name: self.name.join(&other.name),
            database: self.database.join(&other.database),
            primary_key: self.primary_key.join(&other.primary_key),
            replication_info: self.replication_info.join(&other.replication_info),
        }
    }
}

pub type TablesMetadata = EntityMap<TableId, TableMetadata>;

impl Versioned for TableConfig {
    const KIND: &'static str = "table_config";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

impl Versioned for TableReplicationInfo {
    const KIND: &'static str = "table_replication_info";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

impl Versioned for TableMetadata {
    const KIND: &'static str = "table";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

impl Versioned for TablesMetadata {
    const KIND: &'static str = "tables";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

impl Versioned for AckExpectation {
    const KIND: &'static str = "ack_expectation";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_13;
}
