//! Layer 4: Entity maps
//!
//! id -> Deletable<payload>, with upsert that auto-joins. The map join is the
//! key union with per-key joins, so a key seen by only one side is carried
//! through unchanged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::crdt::Crdt;
use super::deletable::Deletable;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
#[serde(bound(
    serialize = "K: Serialize + Ord, T: Serialize",
    deserialize = "K: Deserialize<'de> + Ord, T: Deserialize<'de>"
))]
pub struct EntityMap<K, T> {
    entries: BTreeMap<K, Deletable<T>>,
}

impl<K, T> Default for EntityMap<K, T> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone, T: Crdt + Clone> EntityMap<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge - auto-joins if the id exists.
    pub fn upsert(&mut self, id: K, entry: Deletable<T>) {
        match self.entries.get_mut(&id) {
            Some(existing) => existing.join_assign(&entry),
            None => {
                self.entries.insert(id, entry);
            }
        }
    }

    /// Record a tombstone for `id`, even if this replica never saw it live.
    pub fn tombstone(&mut self, id: K) {
        self.upsert(id, Deletable::Deleted);
    }

    pub fn get(&self, id: &K) -> Option<&Deletable<T>> {
        self.entries.get(id)
    }

    pub fn get_live(&self, id: &K) -> Option<&T> {
        self.entries.get(id).and_then(Deletable::as_live)
    }

    pub fn get_live_mut(&mut self, id: &K) -> Option<&mut T> {
        self.entries.get_mut(id).and_then(Deletable::as_live_mut)
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries, tombstones included.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &Deletable<T>)> {
        self.entries.iter()
    }

    pub fn iter_live(&self) -> impl Iterator<Item = (&K, &T)> {
        self.entries
            .iter()
            .filter_map(|(id, entry)| entry.as_live().map(|live| (id, live)))
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }
}

impl<K: Ord + Clone, T: Crdt + Clone> Crdt for EntityMap<K, T> {
    fn join(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (id, entry) in &other.entries {
            result.upsert(id.clone(), entry.clone());
        }
        result
    }
}
