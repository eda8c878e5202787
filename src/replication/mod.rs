//! Replication data plane.
//!
//! Writes to a shard go through a [`DispatchingSlice`], which copies each one
//! to the shard's replication master (if any) and then applies it locally.
//! Shards and masters each live on their own [`ExecutionContext`].

use thiserror::Error;

use crate::error::{Effect, Transience};

mod backfill;
mod context;
mod dispatcher;
mod master;
mod memory_slice;
mod mutation;
mod provider;
mod slice;

pub use backfill::{BackfillAtom, BackfillCallback, BackfillCollector, BackfillLog};
pub use context::{ContextId, ExecutionContext};
pub use dispatcher::{MasterDispatcher, MutationDispatcher, NullDispatcher};
pub use master::{ChannelMaster, Master, ReplicationMessage};
pub use memory_slice::{DEFAULT_DELETE_QUEUE_LIMIT, MAX_VALUE_SIZE, MemorySlice};
pub use mutation::{
    AddPolicy, AppendPrependKind, AppendPrependMutation, AppendPrependResult, CasId, Castime,
    CastimeSource, DeleteMutation, DeleteResult, GetCasMutation, GetCasValue, IncrDecrKind,
    IncrDecrMutation, IncrDecrResult, MAX_KEY_SIZE, Mutation, MutationResult, ReplTimestamp,
    ReplacePolicy, SarcMutation, SarcParams, SetResult, StoreKey,
};
pub use provider::{BorrowedProvider, DataProvider, DataProviderError, DataSource, StreamedProvider};
pub use slice::{DispatchingSlice, Slice};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReplError {
    #[error("invalid key of {len} bytes (must be 1..={max})", max = MAX_KEY_SIZE)]
    InvalidKey { len: usize },
    #[error(transparent)]
    DataProvider(#[from] DataProviderError),
    #[error("execution context `{name}` has stopped")]
    ContextStopped { name: String },
    #[error("task on execution context `{name}` panicked")]
    TaskPanicked { name: String },
    #[error("failed to start execution context: {0}")]
    Spawn(#[source] std::io::Error),
}

impl ReplError {
    pub fn transience(&self) -> Transience {
        match self {
            ReplError::InvalidKey { .. } => Transience::Permanent,
            ReplError::DataProvider(_) => Transience::Permanent,
            ReplError::ContextStopped { .. } => Transience::Permanent,
            ReplError::TaskPanicked { .. } => Transience::Permanent,
            ReplError::Spawn(_) => Transience::Retryable,
        }
    }

    /// A stopped context may have run the task before the reply was lost,
    /// and a panicking task may have done part of its work.
    pub fn effect(&self) -> Effect {
        match self {
            ReplError::ContextStopped { .. } | ReplError::TaskPanicked { .. } => Effect::Unknown,
            _ => Effect::None,
        }
    }
}
