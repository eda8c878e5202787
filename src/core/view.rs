//! Node-local replica of a semilattice value.
//!
//! Readers take cheap `Arc` snapshots. Joins and local edits are serialized
//! behind one lock, so a node never races itself.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::clock::Clock;

use super::cluster::ClusterMetadata;
use super::crdt::Crdt;
use super::error::OpError;
use super::identity::PeerId;
use super::ops::MetadataEditor;

struct ViewState<T> {
    value: Arc<T>,
    clock: Clock,
}

pub struct SemilatticeView<T> {
    state: Mutex<ViewState<T>>,
}

impl<T> SemilatticeView<T>
where
    T: Crdt + Clone + PartialEq,
{
    pub fn new(initial: T, peer: PeerId) -> Self {
        Self {
            state: Mutex::new(ViewState {
                value: Arc::new(initial),
                clock: Clock::new(peer),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the current value.
    pub fn get(&self) -> Arc<T> {
        Arc::clone(&self.lock().value)
    }

    /// Join a value received from a peer. Returns whether anything changed.
    pub fn join(&self, remote: &T) -> bool {
        let mut state = self.lock();
        let joined = state.value.join(remote);
        if joined == *state.value {
            return false;
        }
        state.value = Arc::new(joined);
        tracing::debug!("joined remote metadata");
        true
    }

    /// Run a local edit against a copy; the copy replaces the current value
    /// only if the edit succeeds.
    pub fn apply_with<R, E>(
        &self,
        edit: impl FnOnce(&mut T, &mut Clock) -> Result<R, E>,
    ) -> Result<R, E> {
        let mut state = self.lock();
        let mut draft = T::clone(&state.value);
        let out = edit(&mut draft, &mut state.clock)?;
        if draft != *state.value {
            state.value = Arc::new(draft);
        }
        Ok(out)
    }
}

impl SemilatticeView<ClusterMetadata> {
    /// Run administrative ops as one atomic local edit.
    pub fn apply<R>(
        &self,
        ops: impl FnOnce(&mut MetadataEditor<'_>) -> Result<R, OpError>,
    ) -> Result<R, OpError> {
        self.apply_with(|md, clock| ops(&mut MetadataEditor::new(md, clock)))
    }
}
