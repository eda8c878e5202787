//! Layer 3: Deletable
//!
//! Tombstone wrapper for entity payloads. Deletion is sticky: once any
//! replica has observed `Deleted`, every join that includes it is `Deleted`.

use serde::{Deserialize, Serialize};

use super::crdt::Crdt;

/// An entity that is either live or tombstoned.
///
/// Tombstones are never removed from their map, so a deletion converges on
/// peers that still hold the live value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum Deletable<T> {
    Live(T),
    Deleted,
}

impl<T> Deletable<T> {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }

    pub fn as_live(&self) -> Option<&T> {
        match self {
            Self::Live(value) => Some(value),
            Self::Deleted => None,
        }
    }

    pub fn as_live_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Live(value) => Some(value),
            Self::Deleted => None,
        }
    }

    pub fn map<U, F: FnOnce(&T) -> U>(&self, f: F) -> Deletable<U> {
        match self {
            Self::Live(value) => Deletable::Live(f(value)),
            Self::Deleted => Deletable::Deleted,
        }
    }

    /// Total eliminator: one branch per state.
    pub fn fold<U>(&self, on_live: impl FnOnce(&T) -> U, on_deleted: impl FnOnce() -> U) -> U {
        match self {
            Self::Live(value) => on_live(value),
            Self::Deleted => on_deleted(),
        }
    }

    /// Tombstone this entry in place.
    pub fn delete(&mut self) {
        *self = Self::Deleted;
    }
}

impl<T: Crdt + Clone> Crdt for Deletable<T> {
    fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Live(a), Self::Live(b)) => Self::Live(a.join(b)),
            _ => Self::Deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::crdt::{Lww, laws};
    use crate::core::identity::PeerId;
    use crate::core::time::{Stamp, WriteStamp};

    fn live(v: &'static str, wall_ms: u64) -> Deletable<Lww<&'static str>> {
        Deletable::Live(Lww::new(
            v,
            Stamp::new(WriteStamp::new(wall_ms, 0), PeerId::nil()),
        ))
    }

    #[test]
    fn tombstone_wins_either_side() {
        let a = live("a", 1);
        assert!(a.join(&Deletable::Deleted).is_deleted());
        assert!(Deletable::Deleted.join(&a).is_deleted());
    }

    #[test]
    fn live_values_join_inner() {
        let joined = live("a", 1).join(&live("b", 2));
        assert_eq!(joined.as_live().map(|r| r.value), Some("b"));
    }

    #[test]
    fn deletable_obeys_laws() {
        laws::check_crdt_laws(live("a", 1), Deletable::Deleted, live("c", 3));
        laws::check_crdt_laws(live("a", 1), live("b", 2), live("c", 3));
    }

    #[test]
    fn fold_is_total() {
        let n = live("abc", 1).fold(|r| r.value.len(), || 0);
        assert_eq!(n, 3);
        let n = Deletable::<Lww<&str>>::Deleted.fold(|r| r.value.len(), || 0);
        assert_eq!(n, 0);
    }
}
