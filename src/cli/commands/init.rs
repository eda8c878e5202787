use serde_json::json;

use super::super::{CliError, Ctx, InitArgs, print_out, write_metadata};
use crate::Result;
use crate::core::ClusterMetadata;

pub(crate) fn handle(ctx: &Ctx, args: InitArgs) -> Result<()> {
    if ctx.path.exists() && !args.force {
        return Err(CliError::AlreadyExists {
            path: ctx.path.clone(),
        }
        .into());
    }
    write_metadata(&ctx.path, &ClusterMetadata::new())?;
    tracing::info!(path = %ctx.path.display(), "initialized metadata");
    let path = ctx.path.display().to_string();
    print_out(ctx.json, &json!({ "path": path }), || {
        format!("initialized {path}")
    })
}
