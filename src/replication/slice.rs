//! Local shards and the replicating wrapper around them.

use std::sync::Arc;

use super::ReplError;
use super::backfill::BackfillCallback;
use super::context::ExecutionContext;
use super::dispatcher::{MasterDispatcher, MutationDispatcher, NullDispatcher};
use super::master::Master;
use super::mutation::{Castime, Mutation, MutationResult, ReplTimestamp};

/// A local storage shard. Only ever called on its [`home`](Slice::home).
pub trait Slice: Send + Sync {
    fn home(&self) -> &ExecutionContext;
    fn change(&self, mutation: Mutation, castime: Castime) -> MutationResult;
    /// Stream everything changed after `since` into `callback`, then call
    /// `done()` once.
    fn backfill(&self, since: ReplTimestamp, callback: Arc<dyn BackfillCallback>);
}

/// A shard whose writes are dispatched to a master before being applied.
pub struct DispatchingSlice {
    slice: Arc<dyn Slice>,
    dispatcher: Arc<dyn MutationDispatcher>,
}

impl DispatchingSlice {
    /// Without a master every write goes through [`NullDispatcher`].
    pub fn new(slice: Arc<dyn Slice>, master: Option<Arc<dyn Master>>) -> Self {
        let dispatcher: Arc<dyn MutationDispatcher> = match master {
            Some(master) => Arc::new(MasterDispatcher::new(slice.home().id(), master)),
            None => Arc::new(NullDispatcher),
        };
        Self::with_dispatcher(slice, dispatcher)
    }

    pub fn with_dispatcher(slice: Arc<dyn Slice>, dispatcher: Arc<dyn MutationDispatcher>) -> Self {
        Self { slice, dispatcher }
    }

    pub fn home(&self) -> &ExecutionContext {
        self.slice.home()
    }

    /// Dispatch then apply, both on the shard's home context.
    pub fn apply(&self, mutation: Mutation, castime: Castime) -> Result<MutationResult, ReplError> {
        let slice = Arc::clone(&self.slice);
        let dispatcher = Arc::clone(&self.dispatcher);
        self.slice.home().run(move || {
            let mutation = dispatcher.dispatch(mutation, castime);
            slice.change(mutation, castime)
        })
    }

    /// Starts the backfill on the home context without waiting for it.
    ///
    /// `callback` gets two holds: one released by the local backfill, the
    /// other once every write dispatched before this call has reached the
    /// master.
    pub fn spawn_backfill(
        &self,
        since: ReplTimestamp,
        callback: Arc<dyn BackfillCallback>,
    ) -> Result<(), ReplError> {
        callback.add_dual_backfiller_hold();
        callback.add_dual_backfiller_hold();
        let slice = Arc::clone(&self.slice);
        let dispatcher = Arc::clone(&self.dispatcher);
        let for_task = Arc::clone(&callback);
        let spawned = self.slice.home().spawn(move || {
            let forwarded = Arc::clone(&for_task);
            dispatcher.after_forwards(Box::new(move || forwarded.done()));
            slice.backfill(since, for_task);
        });
        if let Err(err) = spawned {
            callback.done();
            callback.done();
            return Err(err);
        }
        Ok(())
    }
}
