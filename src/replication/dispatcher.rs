//! Mutation dispatch to the replication master.

use std::sync::{Arc, Mutex, PoisonError};

use super::context::ContextId;
use super::master::Master;
use super::mutation::{AppendPrependMutation, Castime, Mutation, SarcMutation};
use super::provider::DataProvider;

/// Forwards writes before they are applied locally.
///
/// Returns the mutation the caller should apply, which may carry a shared
/// payload in place of the original one.
pub trait MutationDispatcher: Send + Sync {
    fn dispatch(&self, mutation: Mutation, castime: Castime) -> Mutation;

    /// Run `then` once every forward queued by earlier `dispatch` calls has
    /// been delivered. Call on the shard's home context.
    fn after_forwards(&self, then: Box<dyn FnOnce() + Send>) {
        then();
    }
}

/// Dispatcher for shards with no master. Forwards nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullDispatcher;

impl MutationDispatcher for NullDispatcher {
    fn dispatch(&self, mutation: Mutation, _castime: Castime) -> Mutation {
        mutation
    }
}

/// Dispatcher that copies every write to a [`Master`].
///
/// Must be called on the shard's home context; forwards are queued on the
/// master's context in call order and never awaited.
pub struct MasterDispatcher {
    slice_home: ContextId,
    master: Arc<dyn Master>,
}

impl MasterDispatcher {
    pub fn new(slice_home: ContextId, master: Arc<dyn Master>) -> Self {
        Self { slice_home, master }
    }

    fn forward<F>(&self, kind: &'static str, call: F)
    where
        F: FnOnce(&dyn Master) + Send + 'static,
    {
        let master = Arc::clone(&self.master);
        let queued = self.master.home().spawn(move || call(master.as_ref()));
        if let Err(err) = queued {
            tracing::warn!(kind, error = %err, "master unavailable; write not forwarded");
        }
    }
}

type Barrier = Arc<Mutex<Option<Box<dyn FnOnce() + Send>>>>;

fn take(slot: &Barrier) -> Option<Box<dyn FnOnce() + Send>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

impl MutationDispatcher for MasterDispatcher {
    fn after_forwards(&self, then: Box<dyn FnOnce() + Send>) {
        let slot = Arc::new(Mutex::new(Some(then)));
        let queued = Arc::clone(&slot);
        let spawned = self.master.home().spawn(move || {
            if let Some(then) = take(&queued) {
                then();
            }
        });
        // A stopped master delivers nothing more.
        if spawned.is_err()
            && let Some(then) = take(&slot)
        {
            then();
        }
    }

    fn dispatch(&self, mutation: Mutation, castime: Castime) -> Mutation {
        debug_assert_eq!(
            ContextId::current(),
            Some(self.slice_home),
            "dispatch called off the shard's home context"
        );
        tracing::trace!(kind = mutation.kind_name(), key = %mutation.key(), "dispatching");
        match mutation {
            Mutation::GetCas(m) => {
                let key = m.key.clone();
                self.forward("get_cas", move |master| master.get_cas(key, castime));
                Mutation::GetCas(m)
            }
            Mutation::Sarc(m) => {
                let shared = m.data.into_borrowed();
                let side = shared.side_provider();
                let key = m.key.clone();
                let params = m.params;
                self.forward("sarc", move |master| {
                    master.sarc(key, side, params, castime)
                });
                Mutation::Sarc(SarcMutation {
                    data: DataProvider::Borrowed(shared),
                    ..m
                })
            }
            Mutation::IncrDecr(m) => {
                let (kind, key, amount) = (m.kind, m.key.clone(), m.amount);
                self.forward("incr_decr", move |master| {
                    master.incr_decr(kind, key, amount, castime)
                });
                Mutation::IncrDecr(m)
            }
            Mutation::AppendPrepend(m) => {
                let shared = m.data.into_borrowed();
                let side = shared.side_provider();
                let (kind, key) = (m.kind, m.key.clone());
                self.forward("append_prepend", move |master| {
                    master.append_prepend(kind, key, side, castime)
                });
                Mutation::AppendPrepend(AppendPrependMutation {
                    data: DataProvider::Borrowed(shared),
                    ..m
                })
            }
            Mutation::Delete(m) => {
                let key = m.key.clone();
                let timestamp = castime.timestamp;
                self.forward("delete", move |master| master.delete_key(key, timestamp));
                Mutation::Delete(m)
            }
        }
    }
}
