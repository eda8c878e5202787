use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::{Value, json};

use super::super::{
    CliError, Ctx, ShardArgs, TableCmd, database_named, parse_name, print_out, render,
    table_named,
};
use crate::Result;
use crate::admin::{Interruptor, TableBackend, TableConfigFormatter};
use crate::core::{NameString, Shard, TableConfig};

pub(crate) fn handle(ctx: &Ctx, cmd: TableCmd) -> Result<()> {
    match cmd {
        TableCmd::Create(args) => {
            let name = parse_name("table", &args.name)?;
            let config = shard_config(&args.shards)?;
            let view = ctx.open()?;
            let db = database_named(&view.get(), &args.db)?;
            let id = view.apply(|ops| {
                ops.create_table(db, name.clone(), args.primary_key.clone(), config)
            })?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": name.as_str() }), || {
                format!("created table {}.{name} ({id})", args.db)
            })
        }
        TableCmd::Drop { db, name } => {
            let view = ctx.open()?;
            let id = table_named(&view.get(), &db, &name)?;
            view.apply(|ops| ops.drop_table(id))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string() }), || {
                format!("dropped table {db}.{name}")
            })
        }
        TableCmd::Rename { db, from, to } => {
            let to = parse_name("table", &to)?;
            let view = ctx.open()?;
            let id = table_named(&view.get(), &db, &from)?;
            view.apply(|ops| ops.rename_table(id, to.clone()))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": to.as_str() }), || {
                format!("renamed table {db}.{from} to {to}")
            })
        }
        TableCmd::Reconfigure(args) => {
            let config = shard_config(&args.shards)?;
            let view = ctx.open()?;
            let id = table_named(&view.get(), &args.db, &args.name)?;
            let shards = config.shards.len();
            view.apply(|ops| ops.reconfigure_table(id, config))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "shards": shards }), || {
                format!("reconfigured {}.{} into {shards} shard(s)", args.db, args.name)
            })
        }
        TableCmd::List(args) => {
            let backend = TableBackend::new(
                Arc::new(ctx.open()?),
                ctx.identifier_format(args.identifier_format),
                TableConfigFormatter,
            );
            let rows = backend.list_rows(&Interruptor::new())?;
            print_out(ctx.json, &Value::Array(rows.clone()), || {
                render::render_table_rows(&rows)
            })
        }
        TableCmd::Get(args) => {
            let backend = TableBackend::new(
                Arc::new(ctx.open()?),
                ctx.identifier_format(args.identifier_format),
                TableConfigFormatter,
            );
            let key = Value::String(args.id.clone());
            let row = backend.get_row(&key, &Interruptor::new())?;
            let value = row.clone().unwrap_or(Value::Null);
            print_out(ctx.json, &value, || match &row {
                Some(row) => render::render_table_rows(std::slice::from_ref(row)),
                None => format!("no table with id {}", args.id),
            })
        }
    }
}

/// Same replica and director sets for every shard; `n` split points give
/// `n + 1` shards.
fn shard_config(args: &ShardArgs) -> Result<TableConfig> {
    let names = |field: &'static str, raw: &[String]| -> Result<BTreeSet<NameString>> {
        raw.iter().map(|s| parse_name(field, s)).collect()
    };
    let replicas = names("replica", &args.replicas)?;
    let directors = names("director", &args.directors)?;
    if args.split_points.iter().any(|s| s.is_empty()) {
        return Err(CliError::InvalidArgument {
            field: "split point",
            reason: "must not be empty".into(),
        }
        .into());
    }
    let bounds = args
        .split_points
        .iter()
        .cloned()
        .map(Some)
        .chain(std::iter::once(None));
    let shards = bounds
        .map(|split_point| Shard {
            split_point,
            replica_names: replicas.clone(),
            director_names: directors.clone(),
        })
        .collect();
    Ok(TableConfig { shards })
}
