//! Layer 5: Machine (server) entity

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::crdt::{Crdt, Lww};
use super::entity_map::EntityMap;
use super::identity::{MachineId, NameString, ServerTag};
use super::meta::{ClusterVersion, Versioned};

/// A server's configurable identity.
///
/// Tags are a single register, not a set CRDT: a retag replaces the whole
/// set, and concurrent retags resolve by stamp.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineMetadata {
    pub name: Lww<NameString>,
    pub tags: Lww<BTreeSet<ServerTag>>,
}

impl MachineMetadata {
    pub fn new(name: Lww<NameString>, tags: Lww<BTreeSet<ServerTag>>) -> Self {
        Self { name, tags }
    }

    pub fn has_tag(&self, tag: &ServerTag) -> bool {
        self.tags.value.contains(tag)
    }
}

impl Crdt for MachineMetadata {
    fn join(&self, other: &Self) -> Self {
        Self {
            name: self.name.join(&other.name),
            tags: self.tags.join(&other.tags),
        }
    }
}

pub type MachinesMetadata = EntityMap<MachineId, MachineMetadata>;

impl Versioned for MachineMetadata {
    const KIND: &'static str = "machine";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

impl Versioned for MachinesMetadata {
    const KIND: &'static str = "machines";
    const MIN_VERSION: ClusterVersion = ClusterVersion::V1_15;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PeerId;
    use crate::core::time::{Stamp, WriteStamp};

    fn stamp(wall_ms: u64) -> Stamp {
        Stamp::new(WriteStamp::new(wall_ms, 0), PeerId::nil())
    }

    #[test]
    fn rename_and_retag_both_survive_join() {
        let base = MachineMetadata::new(
            Lww::new(NameString::parse("alpha").unwrap(), stamp(1)),
            Lww::new(BTreeSet::from([ServerTag::default_tag()]), stamp(1)),
        );
        let mut renamed = base.clone();
        renamed
            .name
            .set(NameString::parse("beta").unwrap(), stamp(2));
        let mut retagged = base.clone();
        retagged.tags.set(
            BTreeSet::from([ServerTag::parse("ssd").unwrap()]),
            stamp(3),
        );

        let joined = renamed.join(&retagged);
        assert_eq!(joined.name.value.as_str(), "beta");
        assert!(joined.has_tag(&ServerTag::parse("ssd").unwrap()));
        assert!(!joined.has_tag(&ServerTag::default_tag()));
    }
}
