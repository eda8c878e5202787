use serde_json::json;

use super::super::{Ctx, JoinArgs, print_out, read_metadata};
use crate::Result;

pub(crate) fn handle(ctx: &Ctx, args: JoinArgs) -> Result<()> {
    let view = ctx.open()?;
    let before = view.get().digest()?;
    let mut changed = Vec::new();
    for other in &args.others {
        let remote = read_metadata(other, &ctx.config)?;
        if view.join(&remote) {
            changed.push(other.display().to_string());
        }
    }
    if !changed.is_empty() {
        ctx.save(&view)?;
    }
    let after = view.get().digest()?;
    tracing::info!(
        joined = args.others.len(),
        changed = changed.len(),
        "joined metadata"
    );
    let value = json!({
        "changed": before != after,
        "changed_by": changed,
        "digest": after.to_hex(),
    });
    print_out(ctx.json, &value, || {
        if before == after {
            "already up to date".to_string()
        } else {
            format!("joined {} file(s); digest {}", changed.len(), after.to_hex())
        }
    })
}
