//! Backfill: replaying a shard's changes since a timestamp.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{Receiver, Sender};

use super::mutation::{CasId, ReplTimestamp, StoreKey};

/// One live key-value emitted by a backfill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackfillAtom {
    pub key: StoreKey,
    pub value: Bytes,
    pub flags: u32,
    pub exptime: u32,
    pub cas: CasId,
    pub recency: ReplTimestamp,
}

/// Receives a backfill stream.
///
/// A receiver fed by more than one producer takes a hold per producer via
/// [`add_dual_backfiller_hold`](BackfillCallback::add_dual_backfiller_hold);
/// each producer calls [`done`](BackfillCallback::done) once when finished.
pub trait BackfillCallback: Send + Sync {
    fn add_dual_backfiller_hold(&self);
    fn on_deletion(&self, key: &StoreKey, timestamp: ReplTimestamp);
    fn on_keyvalue(&self, atom: BackfillAtom);
    fn done(&self);
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BackfillLog {
    pub deletions: Vec<(StoreKey, ReplTimestamp)>,
    pub atoms: Vec<BackfillAtom>,
}

/// Collects a backfill into memory and signals once every hold is released.
pub struct BackfillCollector {
    holds: AtomicUsize,
    log: Mutex<BackfillLog>,
    finished_tx: Sender<()>,
    finished_rx: Receiver<()>,
}

impl BackfillCollector {
    pub fn new() -> Self {
        let (finished_tx, finished_rx) = crossbeam::channel::bounded(1);
        Self {
            holds: AtomicUsize::new(0),
            log: Mutex::new(BackfillLog::default()),
            finished_tx,
            finished_rx,
        }
    }

    pub fn holds(&self) -> usize {
        self.holds.load(Ordering::Acquire)
    }

    /// Wait for the last hold to be released. `None` on timeout.
    pub fn wait(&self, timeout: Duration) -> Option<BackfillLog> {
        self.finished_rx.recv_timeout(timeout).ok()?;
        Some(self.snapshot())
    }

    pub fn snapshot(&self) -> BackfillLog {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for BackfillCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl BackfillCallback for BackfillCollector {
    fn add_dual_backfiller_hold(&self) {
        self.holds.fetch_add(1, Ordering::AcqRel);
    }

    fn on_deletion(&self, key: &StoreKey, timestamp: ReplTimestamp) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .deletions
            .push((key.clone(), timestamp));
    }

    fn on_keyvalue(&self, atom: BackfillAtom) {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .atoms
            .push(atom);
    }

    fn done(&self) {
        let released = self
            .holds
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |holds| {
                holds.checked_sub(1)
            });
        match released {
            Ok(1) => {
                let _ = self.finished_tx.try_send(());
            }
            Ok(_) => {}
            Err(_) => tracing::warn!("backfill done() without a matching hold"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completes_only_after_every_hold_is_released() {
        let collector = BackfillCollector::new();
        collector.add_dual_backfiller_hold();
        collector.add_dual_backfiller_hold();
        collector.on_deletion(&StoreKey::new("gone").unwrap(), ReplTimestamp(4));

        collector.done();
        assert_eq!(collector.wait(Duration::from_millis(20)), None);

        collector.done();
        let log = collector.wait(Duration::from_secs(1)).unwrap();
        assert_eq!(log.deletions.len(), 1);
        assert_eq!(collector.holds(), 0);
    }

    #[test]
    fn unmatched_done_is_ignored() {
        let collector = BackfillCollector::new();
        collector.done();
        assert_eq!(collector.holds(), 0);
    }
}
