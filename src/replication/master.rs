//! Replication master endpoint.

use bytes::Bytes;
use crossbeam::channel::Sender;

use super::context::ExecutionContext;
use super::mutation::{
    AppendPrependKind, Castime, IncrDecrKind, ReplTimestamp, SarcParams, StoreKey,
};
use super::provider::DataProvider;

/// Receives a copy of every write for a shard.
///
/// Methods are only called on [`home`](Master::home). None of them report
/// back to the writer: local apply never waits on replication.
pub trait Master: Send + Sync {
    fn home(&self) -> &ExecutionContext;
    fn get_cas(&self, key: StoreKey, castime: Castime);
    fn sarc(&self, key: StoreKey, data: DataProvider, params: SarcParams, castime: Castime);
    fn incr_decr(&self, kind: IncrDecrKind, key: StoreKey, amount: u64, castime: Castime);
    fn append_prepend(
        &self,
        kind: AppendPrependKind,
        key: StoreKey,
        data: DataProvider,
        castime: Castime,
    );
    fn delete_key(&self, key: StoreKey, timestamp: ReplTimestamp);
}

/// A forwarded write, with its payload already read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplicationMessage {
    GetCas {
        key: StoreKey,
        castime: Castime,
    },
    Sarc {
        key: StoreKey,
        value: Bytes,
        params: SarcParams,
        castime: Castime,
    },
    IncrDecr {
        kind: IncrDecrKind,
        key: StoreKey,
        amount: u64,
        castime: Castime,
    },
    AppendPrepend {
        kind: AppendPrependKind,
        key: StoreKey,
        value: Bytes,
        castime: Castime,
    },
    Delete {
        key: StoreKey,
        timestamp: ReplTimestamp,
    },
}

impl ReplicationMessage {
    pub fn key(&self) -> &StoreKey {
        match self {
            ReplicationMessage::GetCas { key, .. }
            | ReplicationMessage::Sarc { key, .. }
            | ReplicationMessage::IncrDecr { key, .. }
            | ReplicationMessage::AppendPrepend { key, .. }
            | ReplicationMessage::Delete { key, .. } => key,
        }
    }
}

/// Master that hands each write to a slave stream as a [`ReplicationMessage`].
pub struct ChannelMaster {
    home: ExecutionContext,
    tx: Sender<ReplicationMessage>,
}

impl ChannelMaster {
    pub fn new(home: ExecutionContext, tx: Sender<ReplicationMessage>) -> Self {
        Self { home, tx }
    }

    fn send(&self, message: ReplicationMessage) {
        debug_assert!(self.home.is_current(), "master called off its home context");
        let key = message.key().clone();
        if self.tx.send(message).is_err() {
            tracing::warn!(key = %key, "replication stream closed; write not forwarded");
        }
    }

    fn read_payload(&self, key: &StoreKey, data: &DataProvider) -> Option<Bytes> {
        match data.read() {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "payload unreadable; write not forwarded");
                None
            }
        }
    }
}

impl Master for ChannelMaster {
    fn home(&self) -> &ExecutionContext {
        &self.home
    }

    fn get_cas(&self, key: StoreKey, castime: Castime) {
        self.send(ReplicationMessage::GetCas { key, castime });
    }

    fn sarc(&self, key: StoreKey, data: DataProvider, params: SarcParams, castime: Castime) {
        if let Some(value) = self.read_payload(&key, &data) {
            self.send(ReplicationMessage::Sarc {
                key,
                value,
                params,
                castime,
            });
        }
    }

    fn incr_decr(&self, kind: IncrDecrKind, key: StoreKey, amount: u64, castime: Castime) {
        self.send(ReplicationMessage::IncrDecr {
            kind,
            key,
            amount,
            castime,
        });
    }

    fn append_prepend(
        &self,
        kind: AppendPrependKind,
        key: StoreKey,
        data: DataProvider,
        castime: Castime,
    ) {
        if let Some(value) = self.read_payload(&key, &data) {
            self.send(ReplicationMessage::AppendPrepend {
                kind,
                key,
                value,
                castime,
            });
        }
    }

    fn delete_key(&self, key: StoreKey, timestamp: ReplTimestamp) {
        self.send(ReplicationMessage::Delete { key, timestamp });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::replication::mutation::CasId;

    #[test]
    fn sarc_is_forwarded_with_payload() {
        let home = ExecutionContext::new("test-master").unwrap();
        let (tx, rx) = crossbeam::channel::unbounded();
        let master = std::sync::Arc::new(ChannelMaster::new(home.clone(), tx));
        let key = StoreKey::new("k").unwrap();
        let castime = Castime::new(CasId(1), ReplTimestamp(10));

        let m = master.clone();
        let k = key.clone();
        home.run(move || {
            m.sarc(k, DataProvider::buffered("v"), SarcParams::set(), castime)
        })
        .unwrap();

        assert_eq!(
            rx.try_recv().unwrap(),
            ReplicationMessage::Sarc {
                key,
                value: Bytes::from_static(b"v"),
                params: SarcParams::set(),
                castime,
            }
        );
    }

    #[test]
    fn closed_stream_is_not_fatal() {
        let home = ExecutionContext::new("test-master-closed").unwrap();
        let (tx, rx) = crossbeam::channel::unbounded();
        drop(rx);
        let master = std::sync::Arc::new(ChannelMaster::new(home.clone(), tx));
        let m = master.clone();
        home.run(move || m.delete_key(StoreKey::new("k").unwrap(), ReplTimestamp(1)))
            .unwrap();
    }
}
