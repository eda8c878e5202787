//! Layer 6: Cluster metadata aggregate
//!
//! The join is the field-wise join of the three entity maps. Nothing couples
//! one map to another during a join; a table whose database was dropped
//! elsewhere keeps its dangling reference until an admin op tombstones it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::crdt::Crdt;
use super::database::DatabasesMetadata;
use super::error::EncodeError;
use super::identity::{ContentDigest, DatabaseId, MachineId, NameString, TableId};
use super::machine::{MachineMetadata, MachinesMetadata};
use super::meta::{ClusterVersion, Versioned};
use super::table::{TableMetadata, TablesMetadata};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    #[serde(rename = "rdb_namespaces")]
    pub tables: TablesMetadata,
    pub machines: MachinesMetadata,
    pub databases: DatabasesMetadata,
}

impl ClusterMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// SHA-256 over the key-sorted JSON encoding.
    ///
    /// Equal metadata always yields equal digests, so peers can compare
    /// digests before shipping a full value.
    pub fn digest(&self) -> Result<ContentDigest, EncodeError> {
        let canon = serde_json::to_vec(&serde_json::to_value(self)?)?;
        let hash = Sha256::digest(&canon);
        Ok(ContentDigest::from_bytes(hash.into()))
    }

    pub fn live_database_named(&self, name: &NameString) -> Option<DatabaseId> {
        self.databases
            .iter_live()
            .find(|(_, db)| &db.name.value == name)
            .map(|(id, _)| *id)
    }

    pub fn live_table_named(&self, db: DatabaseId, name: &NameString) -> Option<TableId> {
        self.tables
            .iter_live()
            .find(|(_, table)| table.database.value == db && &table.name.value == name)
            .map(|(id, _)| *id)
    }

    pub fn live_tables_in(&self, db: DatabaseId) -> impl Iterator<Item = (&TableId, &TableMetadata)> {
        self.tables
            .iter_live()
            .filter(move |(_, table)| table.database.value == db)
    }

    pub fn live_machine_named(&self, name: &NameString) -> Option<(MachineId, &MachineMetadata)> {
        self.machines
            .iter_live()
            .find(|(_, machine)| &machine.name.value == name)
            .map(|(id, machine)| (*id, machine))
    }
}

impl Crdt for ClusterMetadata {
    fn join(&self, other: &Self) -> Self {
        Self {
            tables: self.tables.join(&other.tables),
            machines: self.machines.join(&other.machines),
            databases: self.databases.join(&other.databases),
        }
    }
}

impl Versioned for ClusterMetadata {
    const KIND: &'static str = "cluster";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crdt::{Lww, laws};
    use crate::core::database::DatabaseMetadata;
    use crate::core::deletable::Deletable;
    use crate::core::identity::PeerId;
    use crate::core::time::{Stamp, WriteStamp};

    fn stamp(wall_ms: u64) -> Stamp {
        Stamp::new(WriteStamp::new(wall_ms, 0), PeerId::nil())
    }

    fn with_db(name: &str, wall_ms: u64) -> (DatabaseId, ClusterMetadata) {
        let id = DatabaseId::generate();
        let mut md = ClusterMetadata::new();
        md.databases.upsert(
            id,
            Deletable::Live(DatabaseMetadata::new(Lww::new(
                NameString::parse(name).unwrap(),
                stamp(wall_ms),
            ))),
        );
        (id, md)
    }

    #[test]
    fn join_is_field_wise() {
        let (a_id, a) = with_db("a", 1);
        let (b_id, b) = with_db("b", 2);
        let joined = a.join(&b);
        assert_eq!(joined.databases.len(), 2);
        assert_eq!(joined.databases.get(&a_id), a.databases.get(&a_id));
        assert_eq!(joined.databases.get(&b_id), b.databases.get(&b_id));
        assert!(joined.tables.is_empty());
        assert!(joined.machines.is_empty());
    }

    #[test]
    fn cluster_obeys_laws() {
        let (_, a) = with_db("a", 1);
        let (b_id, b) = with_db("b", 2);
        let mut c = ClusterMetadata::new();
        c.databases.tombstone(b_id);
        laws::check_crdt_laws(a, b, c);
    }

    #[test]
    fn digest_tracks_content() {
        let (_, a) = with_db("a", 1);
        let (_, b) = with_db("b", 2);
        assert_eq!(a.digest().unwrap(), a.clone().digest().unwrap());
        assert_ne!(a.digest().unwrap(), b.digest().unwrap());
        let ab = a.join(&b);
        assert_eq!(ab.digest().unwrap(), b.join(&a).digest().unwrap());
    }

    #[test]
    fn lookups_skip_tombstones() {
        let (id, mut md) = with_db("app", 1);
        let name = NameString::parse("app").unwrap();
        assert_eq!(md.live_database_named(&name), Some(id));
        md.databases.tombstone(id);
        assert_eq!(md.live_database_named(&name), None);
    }
}
