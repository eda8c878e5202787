//! Key-value mutations and the castimes that order them.

use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;

use super::ReplError;
use super::provider::DataProvider;

pub const MAX_KEY_SIZE: usize = 250;

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey(Bytes);

impl StoreKey {
    pub fn new(key: impl Into<Bytes>) -> Result<Self, ReplError> {
        let key = key.into();
        if key.is_empty() || key.len() > MAX_KEY_SIZE {
            return Err(ReplError::InvalidKey { len: key.len() });
        }
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StoreKey({})", self)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CasId(pub u64);

/// Replication timestamp; strictly increasing per source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReplTimestamp(pub u64);

impl ReplTimestamp {
    pub const DISTANT_PAST: ReplTimestamp = ReplTimestamp(0);
}

/// CAS token plus the timestamp a write is ordered by.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Castime {
    pub proposed_cas: CasId,
    pub timestamp: ReplTimestamp,
}

impl Castime {
    pub fn new(proposed_cas: CasId, timestamp: ReplTimestamp) -> Self {
        Self {
            proposed_cas,
            timestamp,
        }
    }
}

/// Issues castimes for one shard.
///
/// Timestamps follow wall-clock milliseconds but never repeat or go
/// backwards. The cas id and timestamp of one castime are drawn together,
/// so ordering by either gives the same order.
#[derive(Debug, Default)]
pub struct CastimeSource {
    issued: Mutex<Issued>,
}

#[derive(Debug, Default)]
struct Issued {
    cas: u64,
    timestamp: u64,
}

impl CastimeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&self) -> Castime {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        let mut issued = self.issued.lock().unwrap_or_else(PoisonError::into_inner);
        issued.cas += 1;
        issued.timestamp = now.max(issued.timestamp + 1);
        Castime::new(CasId(issued.cas), ReplTimestamp(issued.timestamp))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddPolicy {
    Yes,
    No,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplacePolicy {
    Yes,
    No,
    IfCasMatches,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncrDecrKind {
    Incr,
    Decr,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendPrependKind {
    Append,
    Prepend,
}

/// Everything about a set/add/replace besides its key and payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SarcParams {
    pub flags: u32,
    pub exptime: u32,
    pub add_policy: AddPolicy,
    pub replace_policy: ReplacePolicy,
    pub old_cas: Option<CasId>,
}

impl SarcParams {
    /// memcached `set`.
    pub fn set() -> Self {
        Self {
            flags: 0,
            exptime: 0,
            add_policy: AddPolicy::Yes,
            replace_policy: ReplacePolicy::Yes,
            old_cas: None,
        }
    }

    /// memcached `add`.
    pub fn add() -> Self {
        Self {
            replace_policy: ReplacePolicy::No,
            ..Self::set()
        }
    }

    /// memcached `replace`.
    pub fn replace() -> Self {
        Self {
            add_policy: AddPolicy::No,
            ..Self::set()
        }
    }

    /// memcached `cas`.
    pub fn cas(old_cas: CasId) -> Self {
        Self {
            add_policy: AddPolicy::No,
            replace_policy: ReplacePolicy::IfCasMatches,
            old_cas: Some(old_cas),
            ..Self::set()
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct GetCasMutation {
    pub key: StoreKey,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SarcMutation {
    pub key: StoreKey,
    pub data: DataProvider,
    pub params: SarcParams,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IncrDecrMutation {
    pub kind: IncrDecrKind,
    pub key: StoreKey,
    pub amount: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AppendPrependMutation {
    pub kind: AppendPrependKind,
    pub key: StoreKey,
    pub data: DataProvider,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DeleteMutation {
    pub key: StoreKey,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Mutation {
    GetCas(GetCasMutation),
    Sarc(SarcMutation),
    IncrDecr(IncrDecrMutation),
    AppendPrepend(AppendPrependMutation),
    Delete(DeleteMutation),
}

impl Mutation {
    pub fn key(&self) -> &StoreKey {
        match self {
            Mutation::GetCas(m) => &m.key,
            Mutation::Sarc(m) => &m.key,
            Mutation::IncrDecr(m) => &m.key,
            Mutation::AppendPrepend(m) => &m.key,
            Mutation::Delete(m) => &m.key,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Mutation::GetCas(_) => "get_cas",
            Mutation::Sarc(_) => "sarc",
            Mutation::IncrDecr(_) => "incr_decr",
            Mutation::AppendPrepend(_) => "append_prepend",
            Mutation::Delete(_) => "delete",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GetCasValue {
    pub value: Bytes,
    pub flags: u32,
    pub cas: CasId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetResult {
    Stored,
    NotStored,
    Exists,
    NotFound,
    TooLarge,
    DataProviderFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncrDecrResult {
    Ok(u64),
    NotFound,
    NotNumeric,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppendPrependResult {
    Success,
    NotFound,
    TooLarge,
    DataProviderFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteResult {
    Deleted,
    NotFound,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationResult {
    GetCas(Option<GetCasValue>),
    Sarc(SetResult),
    IncrDecr(IncrDecrResult),
    AppendPrepend(AppendPrependResult),
    Delete(DeleteResult),
}
