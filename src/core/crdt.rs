//! Layer 2: CRDT Traits and Primitives
//!
//! The fundamental merge primitive for scalar/atomic fields.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use super::time::Stamp;

/// A join-semilattice: replicas converge by exchanging state and joining.
///
/// Properties:
/// - Commutative: join(a, b) == join(b, a)
/// - Associative: join(join(a, b), c) == join(a, join(b, c))
/// - Idempotent: join(a, a) == a
pub trait Crdt: Sized {
    /// Merge two states into a new state that includes information from both.
    fn join(&self, other: &Self) -> Self;

    /// Join `other` into `self` in place.
    fn join_assign(&mut self, other: &Self) {
        *self = self.join(other);
    }
}

/// Last-Writer-Wins register.
///
/// This is the versioned record for scalar entity fields.
/// Higher stamp wins; deterministic (stamp includes peer for tiebreak).
/// Equal stamps with different values (a reused peer id, a hand-edited
/// file) fall back to the greater value so every replica picks the same one.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Lww<T> {
    pub value: T,
    pub stamp: Stamp,
}

impl<T> Lww<T> {
    pub fn new(value: T, stamp: Stamp) -> Self {
        Self { value, stamp }
    }

    /// Overwrite locally if `stamp` is newer than the current one.
    pub fn set(&mut self, value: T, stamp: Stamp) {
        if stamp > self.stamp {
            self.value = value;
            self.stamp = stamp;
        }
    }
}

impl<T: Clone + Ord> Crdt for Lww<T> {
    fn join(&self, other: &Self) -> Self {
        let ours = (&self.stamp, &self.value);
        let theirs = (&other.stamp, &other.value);
        if ours >= theirs {
            self.clone()
        } else {
            other.clone()
        }
    }
}

impl<T: PartialEq> PartialEq for Lww<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value && self.stamp == other.stamp
    }
}

impl<T: Eq> Eq for Lww<T> {}

#[cfg(test)]
pub mod laws {
    use super::*;

    /// verify CRDT laws: associativity, commutativity, idempotence.
    pub fn check_crdt_laws<T: Crdt + PartialEq + Clone + Debug>(a: T, b: T, c: T) {
        // Idempotence
        assert_eq!(a.join(&a), a, "idempotence failed for {a:?}");

        // Commutativity
        assert_eq!(
            a.join(&b),
            b.join(&a),
            "commutativity failed for {a:?} and {b:?}"
        );

        // Associativity
        assert_eq!(
            a.join(&b).join(&c),
            a.join(&b.join(&c)),
            "associativity failed for {a:?}, {b:?}, {c:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::identity::PeerId;
    use crate::core::time::WriteStamp;
    use uuid::Uuid;

    fn stamp(wall_ms: u64, peer: u128) -> Stamp {
        Stamp::new(WriteStamp::new(wall_ms, 0), PeerId::new(Uuid::from_u128(peer)))
    }

    #[test]
    fn lww_higher_stamp_wins() {
        let old = Lww::new("old", stamp(1, 1));
        let new = Lww::new("new", stamp(2, 1));
        assert_eq!(old.join(&new).value, "new");
        assert_eq!(new.join(&old).value, "new");
    }

    #[test]
    fn lww_set_ignores_stale_writes() {
        let mut reg = Lww::new(1, stamp(5, 1));
        reg.set(2, stamp(4, 9));
        assert_eq!(reg.value, 1);
        reg.set(3, stamp(6, 0));
        assert_eq!(reg.value, 3);
    }

    #[test]
    fn lww_obeys_laws() {
        laws::check_crdt_laws(
            Lww::new("a", stamp(1, 2)),
            Lww::new("b", stamp(1, 3)),
            Lww::new("c", stamp(0, 9)),
        );
    }

    #[test]
    fn lww_equal_stamps_pick_the_same_value_both_ways() {
        let a = Lww::new("a", stamp(4, 1));
        let b = Lww::new("b", stamp(4, 1));
        assert_eq!(a.join(&b).value, "b");
        assert_eq!(b.join(&a).value, "b");
        laws::check_crdt_laws(a, b, Lww::new("c", stamp(4, 1)));
    }
}
