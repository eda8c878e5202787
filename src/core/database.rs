//! Layer 5: Database entity

use serde::{Deserialize, Serialize};

use super::crdt::{Crdt, Lww};
use super::entity_map::EntityMap;
use super::identity::{DatabaseId, NameString};
use super::meta::{ClusterVersion, Versioned};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseMetadata {
    pub name: Lww<NameString>,
}

impl DatabaseMetadata {
    pub fn new(name: Lww<NameString>) -> Self {
        Self { name }
    }
}

impl Crdt for DatabaseMetadata {
    fn join(&self, other: &Self) -> Self {
        Self {
            name: self.name.join(&other.name),
        }
    }
}

pub type DatabasesMetadata = EntityMap<DatabaseId, DatabaseMetadata>;

impl Versioned for DatabaseMetadata {
    const KIND: &'static str = "database";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_13;
}

impl Versioned for DatabasesMetadata {
    const KIND: &'static str = "databases";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_13;
}
