use serde_json::json;

use super::super::{Ctx, print_out, render};
use crate::Result;
use crate::core::ClusterVersion;

pub(crate) fn handle(ctx: &Ctx) -> Result<()> {
    let md = ctx.open()?.get();
    let digest = md.digest()?;
    let summary = render::Summary::of(&md);
    let value = json!({
        "path": ctx.path.display().to_string(),
        "version": ClusterVersion::LATEST.to_string(),
        "digest": digest.to_hex(),
        "databases": summary.databases,
        "tables": summary.tables,
        "servers": summary.servers,
        "tombstones": summary.tombstones,
    });
    print_out(ctx.json, &value, || {
        render::render_summary(&ctx.path, &digest, &summary)
    })
}
