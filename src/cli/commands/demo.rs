use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use super::super::{Ctx, DemoArgs, print_out, render};
use crate::replication::{
    BackfillCallback, BackfillCollector, CastimeSource, ChannelMaster, DataProvider,
    DispatchingSlice, ExecutionContext, Master, MemorySlice, Mutation, ReplTimestamp,
    SarcMutation, SarcParams, StoreKey,
};
use crate::Result;

pub(crate) fn handle(ctx: &Ctx, args: DemoArgs) -> Result<()> {
    let slice_home = ExecutionContext::new("cmeta-slice")?;
    let master_home = ExecutionContext::new("cmeta-master")?;
    let (tx, rx) = crossbeam::channel::unbounded();
    let master: Option<Arc<dyn Master>> = if args.no_master {
        None
    } else {
        Some(Arc::new(ChannelMaster::new(master_home.clone(), tx)))
    };
    let slice = DispatchingSlice::new(Arc::new(MemorySlice::new(slice_home)), master);
    let castimes = CastimeSource::new();

    let mut results = Vec::with_capacity(args.writes);
    for i in 0..args.writes {
        let key = StoreKey::new(format!("key-{i}"))?;
        let mutation = Mutation::Sarc(SarcMutation {
            key,
            data: DataProvider::buffered(format!("value-{i}")),
            params: SarcParams::set(),
        });
        let result = slice.apply(mutation, castimes.next())?;
        results.push(format!("{result:?}"));
    }

    // Everything forwarded so far is queued ahead of this.
    master_home.run(|| ())?;
    let forwarded: Vec<Value> = rx
        .try_iter()
        .map(|message| json!(format!("{message:?}")))
        .collect();

    let collector = Arc::new(BackfillCollector::new());
    let callback: Arc<dyn BackfillCallback> = collector.clone();
    slice.spawn_backfill(ReplTimestamp::DISTANT_PAST, callback)?;
    let backfilled = collector
        .wait(Duration::from_secs(5))
        .map(|log| log.atoms.len())
        .unwrap_or(0);

    let value = json!({
        "results": results,
        "forwarded": forwarded,
        "backfilled": backfilled,
    });
    print_out(ctx.json, &value, || render::render_demo(&value))
}
