use std::collections::BTreeSet;

use serde_json::{Value, json};

use super::super::{CliError, Ctx, ServerCmd, parse_name, print_out, render};
use crate::core::{ClusterMetadata, MachineId, OpError, ServerTag};
use crate::{Error, Result};

pub(crate) fn handle(ctx: &Ctx, cmd: ServerCmd) -> Result<()> {
    match cmd {
        ServerCmd::Add { name } => {
            let name = parse_name("server", &name)?;
            let view = ctx.open()?;
            let id = view.apply(|ops| ops.add_machine(name.clone()))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": name.as_str() }), || {
                format!("added server {name} ({id})")
            })
        }
        ServerCmd::Remove { name } => {
            let view = ctx.open()?;
            let id = server_named(&view.get(), &name)?;
            view.apply(|ops| ops.remove_machine(id))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string() }), || {
                format!("removed server {name}")
            })
        }
        ServerCmd::Rename { from, to } => {
            let to = parse_name("server", &to)?;
            let view = ctx.open()?;
            let id = server_named(&view.get(), &from)?;
            view.apply(|ops| ops.rename_machine(id, to.clone()))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": to.as_str() }), || {
                format!("renamed server {from} to {to}")
            })
        }
        ServerCmd::Tag { name, tags } => {
            let tags = tags
                .iter()
                .map(|raw| {
                    ServerTag::parse(raw.trim()).map_err(|err| {
                        Error::from(CliError::InvalidArgument {
                            field: "tag",
                            reason: err.to_string(),
                        })
                    })
                })
                .collect::<Result<BTreeSet<_>>>()?;
            let view = ctx.open()?;
            let id = server_named(&view.get(), &name)?;
            let listed: Vec<String> = tags.iter().map(|t| t.as_str().to_string()).collect();
            view.apply(|ops| ops.set_machine_tags(id, tags))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "tags": listed }), || {
                format!("tagged server {name}: {}", listed.join(", "))
            })
        }
        ServerCmd::List => {
            let md = ctx.open()?.get();
            let rows: Vec<Value> = md
                .machines
                .iter_live()
                .map(|(id, machine)| {
                    let tags: Vec<&str> = machine.tags.value.iter().map(ServerTag::as_str).collect();
                    json!({
                        "id": id.to_string(),
                        "name": machine.name.value.as_str(),
                        "tags": tags,
                    })
                })
                .collect();
            print_out(ctx.json, &Value::Array(rows.clone()), || {
                render::render_named_rows(&rows)
            })
        }
    }
}

pub(super) fn server_named(md: &ClusterMetadata, raw: &str) -> Result<MachineId> {
    let name = parse_name("server", raw)?;
    md.live_machine_named(&name)
        .map(|(id, _)| id)
        .ok_or_else(|| {
            Error::from(OpError::NotFound {
                kind: "server",
                id: name.to_string(),
            })
        })
}
