//! Mutation dispatch through a replicating shard.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use clustermeta::replication::{
    AppendPrependKind, AppendPrependMutation, BackfillCallback, BackfillCollector, CasId, Castime,
    CastimeSource, DataProvider, DataProviderError, DataSource, DeleteMutation,
    DispatchingSlice, ExecutionContext, GetCasMutation, IncrDecrKind, IncrDecrMutation, Master,
    MasterDispatcher, MemorySlice, Mutation, MutationDispatcher, MutationResult,
    NullDispatcher, ReplTimestamp, SarcMutation, SarcParams, SetResult, Slice, StoreKey,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Forwarded {
    GetCas(StoreKey),
    Sarc(StoreKey, Bytes),
    IncrDecr(StoreKey, u64),
    AppendPrepend(StoreKey, Bytes),
    Delete(StoreKey, ReplTimestamp),
}

/// Master that records what it receives, in order.
struct RecordingMaster {
    home: ExecutionContext,
    seen: Mutex<Vec<Forwarded>>,
}

impl RecordingMaster {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            home: ExecutionContext::new("test-master").expect("master context"),
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Everything forwarded before this call, once the master has caught up.
    fn drain(&self) -> Vec<Forwarded> {
        self.home.run(|| ()).expect("master running");
        std::mem::take(&mut *self.seen.lock().unwrap())
    }

    fn record(&self, forwarded: Forwarded) {
        assert!(self.home.is_current(), "master called off its home context");
        self.seen.lock().unwrap().push(forwarded);
    }
}

impl Master for RecordingMaster {
    fn home(&self) -> &ExecutionContext {
        &self.home
    }

    fn get_cas(&self, key: StoreKey, _castime: Castime) {
        self.record(Forwarded::GetCas(key));
    }

    fn sarc(&self, key: StoreKey, data: DataProvider, _params: SarcParams, _castime: Castime) {
        let value = data.read().expect("payload");
        self.record(Forwarded::Sarc(key, value));
    }

    fn incr_decr(&self, _kind: IncrDecrKind, key: StoreKey, amount: u64, _castime: Castime) {
        self.record(Forwarded::IncrDecr(key, amount));
    }

    fn append_prepend(
        &self,
        _kind: AppendPrependKind,
        key: StoreKey,
        data: DataProvider,
        _castime: Castime,
    ) {
        let value = data.read().expect("payload");
        self.record(Forwarded::AppendPrepend(key, value));
    }

    fn delete_key(&self, key: StoreKey, timestamp: ReplTimestamp) {
        self.record(Forwarded::Delete(key, timestamp));
    }
}

/// Payload source that counts how often it is drained.
struct CountingSource {
    payload: &'static [u8],
    reads: Arc<AtomicUsize>,
}

impl DataSource for CountingSource {
    fn size(&self) -> usize {
        self.payload.len()
    }

    fn read(self: Box<Self>) -> Result<Bytes, DataProviderError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from_static(self.payload))
    }
}

/// Shard wrapper that records the order writes are applied in.
struct OrderedSlice {
    inner: MemorySlice,
    applied: Mutex<Vec<StoreKey>>,
}

impl Slice for OrderedSlice {
    fn home(&self) -> &ExecutionContext {
        self.inner.home()
    }

    fn change(&self, mutation: Mutation, castime: Castime) -> MutationResult {
        self.applied.lock().unwrap().push(mutation.key().clone());
        self.inner.change(mutation, castime)
    }

    fn backfill(&self, since: ReplTimestamp, callback: Arc<dyn BackfillCallback>) {
        self.inner.backfill(since, callback);
    }
}

fn key(s: &str) -> StoreKey {
    StoreKey::new(s.to_string()).unwrap()
}

fn castime(n: u64) -> Castime {
    Castime::new(CasId(n), ReplTimestamp(n))
}

fn set(k: &str, v: &'static str) -> Mutation {
    Mutation::Sarc(SarcMutation {
        key: key(k),
        data: DataProvider::buffered(v),
        params: SarcParams::set(),
    })
}

fn every_kind() -> Vec<Mutation> {
    vec![
        Mutation::GetCas(GetCasMutation { key: key("a") }),
        set("b", "v"),
        Mutation::IncrDecr(IncrDecrMutation {
            kind: IncrDecrKind::Incr,
            key: key("c"),
            amount: 2,
        }),
        Mutation::AppendPrepend(AppendPrependMutation {
            kind: AppendPrependKind::Append,
            key: key("d"),
            data: DataProvider::buffered("tail"),
        }),
        Mutation::Delete(DeleteMutation { key: key("e") }),
    ]
}

#[test]
fn null_dispatcher_is_identity() {
    for (i, mutation) in every_kind().into_iter().enumerate() {
        let out = NullDispatcher.dispatch(mutation.clone(), castime(i as u64));
        assert_eq!(out, mutation);
    }
}

#[test]
fn shard_without_master_still_applies_writes() {
    let home = ExecutionContext::new("test-slice").unwrap();
    let slice = DispatchingSlice::new(Arc::new(MemorySlice::new(home)), None);
    let result = slice.apply(set("k", "v"), castime(1)).unwrap();
    assert_eq!(result, MutationResult::Sarc(SetResult::Stored));
}

#[test]
fn sarc_payload_is_read_once_and_shared() {
    let master = RecordingMaster::new();
    let slice_home = ExecutionContext::new("test-slice").unwrap();
    let dispatcher = MasterDispatcher::new(slice_home.id(), master.clone());
    let reads = Arc::new(AtomicUsize::new(0));
    let mutation = Mutation::Sarc(SarcMutation {
        key: key("greeting"),
        data: DataProvider::streamed(Box::new(CountingSource {
            payload: b"hello",
            reads: reads.clone(),
        })),
        params: SarcParams::set(),
    });

    let rewritten = slice_home
        .run(move || dispatcher.dispatch(mutation, castime(1)))
        .unwrap();

    let Mutation::Sarc(local) = rewritten else {
        panic!("dispatch changed the mutation kind");
    };
    assert!(matches!(local.data, DataProvider::Borrowed(_)));
    assert_eq!(local.data.read().unwrap(), "hello");
    assert_eq!(
        master.drain(),
        vec![Forwarded::Sarc(key("greeting"), Bytes::from_static(b"hello"))]
    );
    assert_eq!(reads.load(Ordering::SeqCst), 1);
}

#[test]
fn every_kind_is_forwarded_once() {
    let master = RecordingMaster::new();
    let home = ExecutionContext::new("test-slice").unwrap();
    let slice = DispatchingSlice::new(
        Arc::new(MemorySlice::new(home)),
        Some(master.clone() as Arc<dyn Master>),
    );
    for (i, mutation) in every_kind().into_iter().enumerate() {
        slice.apply(mutation, castime(i as u64 + 1)).unwrap();
    }
    assert_eq!(
        master.drain(),
        vec![
            Forwarded::GetCas(key("a")),
            Forwarded::Sarc(key("b"), Bytes::from_static(b"v")),
            Forwarded::IncrDecr(key("c"), 2),
            Forwarded::AppendPrepend(key("d"), Bytes::from_static(b"tail")),
            Forwarded::Delete(key("e"), ReplTimestamp(5)),
        ]
    );
}

#[test]
fn forward_order_matches_local_apply_order() {
    let master = RecordingMaster::new();
    let home = ExecutionContext::new("test-slice").unwrap();
    let shard = Arc::new(OrderedSlice {
        inner: MemorySlice::new(home),
        applied: Mutex::new(Vec::new()),
    });
    let slice = Arc::new(DispatchingSlice::new(
        shard.clone(),
        Some(master.clone() as Arc<dyn Master>),
    ));
    let castimes = Arc::new(CastimeSource::new());

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let slice = slice.clone();
            let castimes = castimes.clone();
            thread::spawn(move || {
                for i in 0..25 {
                    let k = format!("w{w}_{i}");
                    let mutation = Mutation::Sarc(SarcMutation {
                        key: StoreKey::new(k).unwrap(),
                        data: DataProvider::buffered("x"),
                        params: SarcParams::set(),
                    });
                    slice.apply(mutation, castimes.next()).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    let forwarded: Vec<StoreKey> = master
        .drain()
        .into_iter()
        .map(|f| match f {
            Forwarded::Sarc(k, _) => k,
            other => panic!("unexpected forward {other:?}"),
        })
        .collect();
    let applied = shard.applied.lock().unwrap().clone();
    assert_eq!(forwarded.len(), 100);
    assert_eq!(forwarded, applied);
}

#[test]
fn backfill_completes_after_its_hold() {
    let home = ExecutionContext::new("test-slice").unwrap();
    let slice = DispatchingSlice::new(Arc::new(MemorySlice::new(home)), None);
    slice.apply(set("old", "1"), castime(1)).unwrap();
    slice.apply(set("new", "2"), castime(5)).unwrap();
    slice.apply(set("gone", "3"), castime(6)).unwrap();
    slice
        .apply(Mutation::Delete(DeleteMutation { key: key("gone") }), castime(7))
        .unwrap();

    let collector = Arc::new(BackfillCollector::new());
    slice
        .spawn_backfill(ReplTimestamp(5), collector.clone())
        .unwrap();
    let log = collector.wait(Duration::from_secs(5)).expect("backfill finished");

    let keys: Vec<_> = log.atoms.iter().map(|a| a.key.clone()).collect();
    assert_eq!(keys, vec![key("new")]);
    assert_eq!(log.deletions, vec![(key("gone"), ReplTimestamp(7))]);
    assert_eq!(collector.holds(), 0);
}

#[test]
fn backfill_waits_for_forwards_still_queued_on_the_master() {
    let master = RecordingMaster::new();
    let (open_tx, open_rx) = crossbeam::channel::bounded::<()>(0);
    master
        .home
        .spawn(move || {
            let _ = open_rx.recv();
        })
        .unwrap();

    let home = ExecutionContext::new("test-slice").unwrap();
    let slice = DispatchingSlice::new(
        Arc::new(MemorySlice::new(home)),
        Some(master.clone() as Arc<dyn Master>),
    );
    slice.apply(set("k", "v"), castime(3)).unwrap();

    let collector = Arc::new(BackfillCollector::new());
    slice
        .spawn_backfill(ReplTimestamp::DISTANT_PAST, collector.clone())
        .unwrap();
    // The local half finishes; the forward is stuck behind the closed gate.
    slice.home().run(|| ()).unwrap();
    assert_eq!(collector.holds(), 1);
    assert_eq!(collector.wait(Duration::from_millis(50)), None);

    open_tx.send(()).unwrap();
    let log = collector.wait(Duration::from_secs(5)).expect("backfill finished");
    assert_eq!(log.atoms.len(), 1);
    assert_eq!(collector.holds(), 0);
    assert_eq!(master.drain(), vec![Forwarded::Sarc(key("k"), Bytes::from_static(b"v"))]);
}
