//! In-memory shard with memcached write semantics.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Bytes, BytesMut};

use super::backfill::{BackfillAtom, BackfillCallback};
use super::context::ExecutionContext;
use super::mutation::{
    AddPolicy, AppendPrependKind, AppendPrependMutation, AppendPrependResult, CasId, Castime,
    DeleteMutation, DeleteResult, GetCasMutation, GetCasValue, IncrDecrKind, IncrDecrMutation,
    IncrDecrResult, Mutation, MutationResult, ReplTimestamp, ReplacePolicy, SarcMutation,
    SetResult, StoreKey,
};
use super::slice::Slice;

pub const MAX_VALUE_SIZE: usize = 1024 * 1024;
pub const DEFAULT_DELETE_QUEUE_LIMIT: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq)]
struct Entry {
    value: Bytes,
    flags: u32,
    exptime: u32,
    cas: Option<CasId>,
    recency: ReplTimestamp,
}

#[derive(Debug, Default)]
struct SliceState {
    entries: BTreeMap<StoreKey, Entry>,
    deletes: VecDeque<(StoreKey, ReplTimestamp)>,
}

pub struct MemorySlice {
    home: ExecutionContext,
    delete_queue_limit: usize,
    state: Mutex<SliceState>,
}

impl MemorySlice {
    pub fn new(home: ExecutionContext) -> Self {
        Self::with_delete_queue_limit(home, DEFAULT_DELETE_QUEUE_LIMIT)
    }

    /// Only the most recent `limit` deletions are kept for backfill.
    pub fn with_delete_queue_limit(home: ExecutionContext, limit: usize) -> Self {
        Self {
            home,
            delete_queue_limit: limit,
            state: Mutex::new(SliceState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of `key`, for inspection.
    pub fn peek(&self, key: &StoreKey) -> Option<Bytes> {
        self.lock().entries.get(key).map(|entry| entry.value.clone())
    }

    fn lock(&self) -> MutexGuard<'_, SliceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get_cas(&self, m: GetCasMutation, castime: Castime) -> Option<GetCasValue> {
        let mut state = self.lock();
        let entry = state.entries.get_mut(&m.key)?;
        let cas = match entry.cas {
            Some(cas) => cas,
            None => {
                entry.cas = Some(castime.proposed_cas);
                entry.recency = castime.timestamp;
                castime.proposed_cas
            }
        };
        Some(GetCasValue {
            value: entry.value.clone(),
            flags: entry.flags,
            cas,
        })
    }

    fn sarc(&self, m: SarcMutation, castime: Castime) -> SetResult {
        if m.data.size() > MAX_VALUE_SIZE {
            return SetResult::TooLarge;
        }
        let mut state = self.lock();
        match state.entries.get(&m.key) {
            None if m.params.add_policy == AddPolicy::No => {
                return match m.params.replace_policy {
                    ReplacePolicy::IfCasMatches => SetResult::NotFound,
                    _ => SetResult::NotStored,
                };
            }
            Some(_) if m.params.replace_policy == ReplacePolicy::No => {
                return SetResult::NotStored;
            }
            Some(entry)
                if m.params.replace_policy == ReplacePolicy::IfCasMatches
                    && entry.cas != m.params.old_cas =>
            {
                return SetResult::Exists;
            }
            _ => {}
        }
        let value = match m.data.read() {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(key = %m.key, error = %err, "set payload unreadable");
                return SetResult::DataProviderFailed;
            }
        };
        state.entries.insert(
            m.key,
            Entry {
                value,
                flags: m.params.flags,
                exptime: m.params.exptime,
                cas: Some(castime.proposed_cas),
                recency: castime.timestamp,
            },
        );
        SetResult::Stored
    }

    fn incr_decr(&self, m: IncrDecrMutation, castime: Castime) -> IncrDecrResult {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(&m.key) else {
            return IncrDecrResult::NotFound;
        };
        let Some(current) = std::str::from_utf8(&entry.value)
            .ok()
            .and_then(|text| text.trim().parse::<u64>().ok())
        else {
            return IncrDecrResult::NotNumeric;
        };
        let next = match m.kind {
            IncrDecrKind::Incr => current.wrapping_add(m.amount),
            IncrDecrKind::Decr => current.saturating_sub(m.amount),
        };
        entry.value = Bytes::from(next.to_string());
        entry.cas = Some(castime.proposed_cas);
        entry.recency = castime.timestamp;
        IncrDecrResult::Ok(next)
    }

    fn append_prepend(&self, m: AppendPrependMutation, castime: Castime) -> AppendPrependResult {
        let mut state = self.lock();
        let Some(entry) = state.entries.get_mut(&m.key) else {
            return AppendPrependResult::NotFound;
        };
        if entry.value.len() + m.data.size() > MAX_VALUE_SIZE {
            return AppendPrependResult::TooLarge;
        }
        let data = match m.data.read() {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(key = %m.key, error = %err, "append payload unreadable");
                return AppendPrependResult::DataProviderFailed;
            }
        };
        let mut joined = BytesMut::with_capacity(entry.value.len() + data.len());
        match m.kind {
            AppendPrependKind::Append => {
                joined.extend_from_slice(&entry.value);
                joined.extend_from_slice(&data);
            }
            AppendPrependKind::Prepend => {
                joined.extend_from_slice(&data);
                joined.extend_from_slice(&entry.value);
            }
        }
        entry.value = joined.freeze();
        entry.cas = Some(castime.proposed_cas);
        entry.recency = castime.timestamp;
        AppendPrependResult::Success
    }

    fn delete(&self, m: DeleteMutation, castime: Castime) -> DeleteResult {
        let mut state = self.lock();
        if state.entries.remove(&m.key).is_none() {
            return DeleteResult::NotFound;
        }
        state.deletes.push_back((m.key, castime.timestamp));
        while state.deletes.len() > self.delete_queue_limit {
            state.deletes.pop_front();
        }
        DeleteResult::Deleted
    }
}

impl Slice for MemorySlice {
    fn home(&self) -> &ExecutionContext {
        &self.home
    }

    fn change(&self, mutation: Mutation, castime: Castime) -> MutationResult {
        debug_assert!(self.home.is_current(), "slice changed off its home context");
        match mutation {
            Mutation::GetCas(m) => MutationResult::GetCas(self.get_cas(m, castime)),
            Mutation::Sarc(m) => MutationResult::Sarc(self.sarc(m, castime)),
            Mutation::IncrDecr(m) => MutationResult::IncrDecr(self.incr_decr(m, castime)),
            Mutation::AppendPrepend(m) => {
                MutationResult::AppendPrepend(self.append_prepend(m, castime))
            }
            Mutation::Delete(m) => MutationResult::Delete(self.delete(m, castime)),
        }
    }

    /// `since` is inclusive.
    fn backfill(&self, since: ReplTimestamp, callback: Arc<dyn BackfillCallback>) {
        let (deletes, atoms) = {
            let state = self.lock();
            let deletes: Vec<_> = state
                .deletes
                .iter()
                .filter(|(_, ts)| *ts >= since)
                .cloned()
                .collect();
            let atoms: Vec<_> = state
                .entries
                .iter()
                .filter(|(_, entry)| entry.recency >= since)
                .map(|(key, entry)| BackfillAtom {
                    key: key.clone(),
                    value: entry.value.clone(),
                    flags: entry.flags,
                    exptime: entry.exptime,
                    cas: entry.cas.unwrap_or(CasId(0)),
                    recency: entry.recency,
                })
                .collect();
            (deletes, atoms)
        };
        tracing::debug!(
            since = since.0,
            deletions = deletes.len(),
            values = atoms.len(),
            "backfilling slice"
        );
        for (key, ts) in &deletes {
            callback.on_deletion(key, *ts);
        }
        for atom in atoms {
            callback.on_keyvalue(atom);
        }
        callback.done();
    }
}
