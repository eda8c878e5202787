//! HLC (Hybrid Logical Clock) for metadata edits.
//!
//! Every administrative edit is stamped by the node clock. Stamps from one
//! clock strictly increase, and `stamp_after` lets an edit supersede a value
//! that arrived from a peer whose wall clock runs ahead.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::core::{PeerId, Stamp, WriteStamp};

pub struct Clock {
    wall_ms: u64,
    counter: u32,
    peer: PeerId,
}

impl Clock {
    pub fn new(peer: PeerId) -> Self {
        Self {
            wall_ms: Self::now_ms(),
            counter: 0,
            peer,
        }
    }

    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Next write stamp, strictly greater than any earlier one from this clock.
    ///
    /// A saturated counter carries into the millisecond.
    pub fn tick(&mut self) -> WriteStamp {
        let now = Self::now_ms();
        if now > self.wall_ms {
            self.wall_ms = now;
            self.counter = 0;
        } else if let Some(counter) = self.counter.checked_add(1) {
            self.counter = counter;
        } else {
            self.wall_ms = self.wall_ms.saturating_add(1);
            self.counter = 0;
        }
        WriteStamp::new(self.wall_ms, self.counter)
    }

    pub fn stamp(&mut self) -> Stamp {
        Stamp::new(self.tick(), self.peer)
    }

    /// A stamp that orders after `seen`, whoever minted it.
    pub fn stamp_after(&mut self, seen: &Stamp) -> Stamp {
        self.receive(&seen.at);
        self.stamp()
    }

    /// Fold in a remote stamp so the next tick orders after it.
    pub fn receive(&mut self, remote: &WriteStamp) {
        let now = Self::now_ms();
        if remote.wall_ms > self.wall_ms {
            self.wall_ms = remote.wall_ms;
            self.counter = remote.counter;
        } else if remote.wall_ms == self.wall_ms && remote.counter > self.counter {
            self.counter = remote.counter;
        }
        if now > self.wall_ms {
            self.wall_ms = now;
            self.counter = 0;
        }
    }

    pub fn wall_ms(&self) -> u64 {
        self.wall_ms
    }

    fn now_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_is_monotonic() {
        let mut clock = Clock::new(PeerId::generate());
        let s1 = clock.tick();
        let s2 = clock.tick();
        let s3 = clock.tick();
        assert!(s2 > s1);
        assert!(s3 > s2);
    }

    #[test]
    fn stamp_after_beats_future_remote() {
        let mut clock = Clock::new(PeerId::nil());
        let local = clock.tick();
        let remote = Stamp::new(
            WriteStamp::new(local.wall_ms + 60_000, 7),
            PeerId::generate(),
        );
        let next = clock.stamp_after(&remote);
        assert!(next > remote);
        assert_eq!(next.by, PeerId::nil());
    }

    #[test]
    fn saturated_counter_carries_into_wall_clock() {
        let mut clock = Clock::new(PeerId::generate());
        let remote = Stamp::new(WriteStamp::new(u64::MAX / 2, u32::MAX), PeerId::generate());
        let next = clock.stamp_after(&remote);
        assert!(next > remote);
        assert_eq!(next.at, WriteStamp::new(u64::MAX / 2 + 1, 0));
        assert!(clock.tick() > next.at);
    }

    #[test]
    fn receive_with_older_stamp_is_noop() {
        let mut clock = Clock::new(PeerId::generate());
        let s1 = clock.tick();
        let s2 = clock.tick();
        clock.receive(&WriteStamp::new(s1.wall_ms, s1.counter));
        assert!(clock.tick() > s2);
    }
}
