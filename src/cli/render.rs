//! Human-readable output.

use std::fmt::Write as _;
use std::path::Path;

use serde_json::Value;

use crate::core::{ClusterMetadata, ContentDigest};

pub(super) struct Summary {
    pub databases: usize,
    pub tables: usize,
    pub servers: usize,
    pub tombstones: usize,
}

impl Summary {
    pub fn of(md: &ClusterMetadata) -> Self {
        let databases = md.databases.iter_live().count();
        let tables = md.tables.iter_live().count();
        let servers = md.machines.iter_live().count();
        let total = md.databases.len() + md.tables.len() + md.machines.len();
        Self {
            databases,
            tables,
            servers,
            tombstones: total - databases - tables - servers,
        }
    }
}

pub(super) fn render_summary(path: &Path, digest: &ContentDigest, summary: &Summary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", path.display());
    let _ = writeln!(out, "  digest:     {}", digest.to_hex());
    let _ = writeln!(out, "  databases:  {}", summary.databases);
    let _ = writeln!(out, "  tables:     {}", summary.tables);
    let _ = writeln!(out, "  servers:    {}", summary.servers);
    let _ = write!(out, "  tombstones: {}", summary.tombstones);
    out
}

/// `name  id  [tags]`, one per line.
pub(super) fn render_named_rows(rows: &[Value]) -> String {
    if rows.is_empty() {
        return "(none)".to_string();
    }
    let width = rows
        .iter()
        .filter_map(|row| row["name"].as_str())
        .map(str::len)
        .max()
        .unwrap_or(0);
    let mut out = String::new();
    for row in rows {
        let name = row["name"].as_str().unwrap_or("?");
        let id = row["id"].as_str().unwrap_or("?");
        let _ = write!(out, "{name:<width$}  {id}");
        if let Some(tags) = row["tags"].as_array() {
            let tags: Vec<&str> = tags.iter().filter_map(Value::as_str).collect();
            let _ = write!(out, "  [{}]", tags.join(", "));
        }
        out.push('\n');
    }
    out.pop();
    out
}

pub(super) fn render_table_rows(rows: &[Value]) -> String {
    if rows.is_empty() {
        return "(no tables)".to_string();
    }
    let mut out = String::new();
    for row in rows {
        let _ = writeln!(
            out,
            "{}.{}  {}  pk={}  acks={} durability={}",
            text(&row["db"]),
            text(&row["name"]),
            text(&row["id"]),
            text(&row["primary_key"]),
            row["write_acks"],
            text(&row["durability"]),
        );
        for (idx, shard) in row["shards"].as_array().into_iter().flatten().enumerate() {
            let _ = writeln!(
                out,
                "  shard {idx} (< {}): replicas {} directors {}",
                shard["split_point"].as_str().unwrap_or("+inf"),
                list(&shard["replicas"]),
                list(&shard["directors"]),
            );
        }
    }
    out.pop();
    out
}

pub(super) fn render_demo(value: &Value) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "local results:");
    for result in value["results"].as_array().into_iter().flatten() {
        let _ = writeln!(out, "  {}", text(result));
    }
    let _ = writeln!(out, "forwarded to master:");
    for message in value["forwarded"].as_array().into_iter().flatten() {
        let _ = writeln!(out, "  {}", text(message));
    }
    let _ = write!(out, "backfilled values: {}", value["backfilled"]);
    out
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn list(value: &Value) -> String {
    let items: Vec<String> = value
        .as_array()
        .into_iter()
        .flatten()
        .map(text)
        .collect();
    items.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn named_rows_align_and_show_tags() {
        let rows = vec![
            json!({"name": "a", "id": "1", "tags": ["default"]}),
            json!({"name": "long", "id": "2", "tags": []}),
        ];
        assert_eq!(render_named_rows(&rows), "a     1  [default]\nlong  2  []");
    }

    #[test]
    fn table_rows_list_shards() {
        let row = json!({
            "id": "t1", "name": "users", "db": "app", "primary_key": "id",
            "write_acks": 1, "durability": "hard",
            "shards": [{"split_point": null, "replicas": ["s1"], "directors": ["s1"]}],
        });
        let out = render_table_rows(&[row]);
        assert!(out.starts_with("app.users  t1  pk=id  acks=1 durability=hard"));
        assert!(out.contains("shard 0 (< +inf): replicas s1 directors s1"));
    }
}
