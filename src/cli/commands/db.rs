use serde_json::{Value, json};

use super::super::{Ctx, DbCmd, database_named, parse_name, print_out, render};
use crate::Result;

pub(crate) fn handle(ctx: &Ctx, cmd: DbCmd) -> Result<()> {
    match cmd {
        DbCmd::Create { name } => {
            let name = parse_name("database", &name)?;
            let view = ctx.open()?;
            let id = view.apply(|ops| ops.create_database(name.clone()))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": name.as_str() }), || {
                format!("created database {name} ({id})")
            })
        }
        DbCmd::Drop { name } => {
            let view = ctx.open()?;
            let id = database_named(&view.get(), &name)?;
            let tables = view.apply(|ops| ops.drop_database(id))?;
            ctx.save(&view)?;
            let value = json!({ "id": id.to_string(), "dropped_tables": tables.len() });
            print_out(ctx.json, &value, || {
                format!("dropped database {name} and {} table(s)", tables.len())
            })
        }
        DbCmd::Rename { from, to } => {
            let to = parse_name("database", &to)?;
            let view = ctx.open()?;
            let id = database_named(&view.get(), &from)?;
            view.apply(|ops| ops.rename_database(id, to.clone()))?;
            ctx.save(&view)?;
            print_out(ctx.json, &json!({ "id": id.to_string(), "name": to.as_str() }), || {
                format!("renamed database {from} to {to}")
            })
        }
        DbCmd::List => {
            let md = ctx.open()?.get();
            let rows: Vec<Value> = md
                .databases
                .iter_live()
                .map(|(id, db)| json!({ "id": id.to_string(), "name": db.name.value.as_str() }))
                .collect();
            print_out(ctx.json, &Value::Array(rows.clone()), || {
                render::render_named_rows(&rows)
            })
        }
    }
}
