//! Layer 0: Time primitives
//!
//! HLC (Hybrid Logical Clock) for causal ordering of metadata edits.
//! WallClock for display only (not ordering).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::identity::PeerId;

/// HLC timestamp - the ordering primitive.
///
/// (wall_ms, counter) forms total order within a peer.
/// !Copy intentional - forces explicit .clone() to think about causality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WriteStamp {
    pub wall_ms: u64,
    pub counter: u32,
}

impl WriteStamp {
    pub fn new(wall_ms: u64, counter: u32) -> Self {
        Self { wall_ms, counter }
    }
}

impl PartialOrd for WriteStamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for WriteStamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.wall_ms
            .cmp(&other.wall_ms)
            .then_with(|| self.counter.cmp(&other.counter))
    }
}

/// Wall clock reading in milliseconds - NOT for causal ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WallClock(pub u64);

impl WallClock {
    pub fn now() -> Self {
        use std::time::{SystemTime, UNIX_EPOCH};
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self(ms)
    }
}

/// Stamp = WriteStamp + attribution.
///
/// This is what registers compare on join - includes the writing peer for
/// deterministic tiebreak between concurrent edits.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Stamp {
    pub at: WriteStamp,
    pub by: PeerId,
}

impl Stamp {
    pub fn new(at: WriteStamp, by: PeerId) -> Self {
        Self { at, by }
    }
}

impl PartialOrd for Stamp {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Stamp {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.by.cmp(&other.by)) // deterministic tiebreak
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn stamp_orders_by_time_then_peer() {
        let low = PeerId::new(Uuid::from_u128(1));
        let high = PeerId::new(Uuid::from_u128(2));

        let a = Stamp::new(WriteStamp::new(10, 0), high);
        let b = Stamp::new(WriteStamp::new(10, 1), low);
        assert!(b > a);

        let c = Stamp::new(WriteStamp::new(10, 1), high);
        assert!(c > b);
    }
}
