use std::collections::BTreeSet;

use serde_json::{Value, json};

use crate::core::{NameString, TableId, TableMetadata};

use super::{AdminError, Interruptor, Row, RowFormatter};

/// Rows of the `table_config` admin table.
#[derive(Clone, Copy, Debug, Default)]
pub struct TableConfigFormatter;

impl RowFormatter for TableConfigFormatter {
    fn format_row(
        &self,
        id: TableId,
        name: &NameString,
        db: Value,
        table: &TableMetadata,
        interruptor: &Interruptor,
    ) -> Result<Row, AdminError> {
        let info = &table.replication_info.value;
        let names = |set: &BTreeSet<NameString>| -> Vec<String> {
            set.iter().map(|n| n.as_str().to_string()).collect()
        };
        let mut shards = Vec::with_capacity(info.config.shards.len());
        for shard in &info.config.shards {
            interruptor.check()?;
            shards.push(json!({
                "split_point": shard.split_point,
                "replicas": names(&shard.replica_names),
                "directors": names(&shard.director_names),
            }));
        }
        Ok(json!({
            "id": id.to_string(),
            "name": name.as_str(),
            "db": db,
            "primary_key": table.primary_key.value,
            "shards": shards,
            "write_acks": info.write_ack.expectation(),
            "durability": if info.write_ack.is_hardly_durable() { "hard" } else { "soft" },
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::core::{
        AckExpectation, DatabaseId, Lww, PeerId, Shard, Stamp, TableConfig,
        TableReplicationInfo, WriteStamp,
    };

    #[test]
    fn row_lists_shards_and_acks() {
        let stamp = Stamp::new(WriteStamp::new(1, 0), PeerId::nil());
        let s1 = NameString::parse("s1").unwrap();
        let s2 = NameString::parse("s2").unwrap();
        let config = TableConfig {
            shards: vec![
                Shard {
                    split_point: Some("m".into()),
                    replica_names: BTreeSet::from([s1.clone(), s2.clone()]),
                    director_names: BTreeSet::from([s1.clone()]),
                },
                Shard {
                    split_point: None,
                    replica_names: BTreeSet::from([s2.clone()]),
                    director_names: BTreeSet::from([s2.clone()]),
                },
            ],
        };
        let mut info = TableReplicationInfo::new(config, vec![]);
        info.write_ack = AckExpectation::new(2, false);
        let table = TableMetadata {
            name: Lww::new(NameString::parse("users").unwrap(), stamp.clone()),
            database: Lww::new(DatabaseId::generate(), stamp.clone()),
            primary_key: Lww::new("email".into(), stamp.clone()),
            replication_info: Lww::new(info, stamp),
        };
        let id = TableId::generate();

        let row = TableConfigFormatter
            .format_row(id, &table.name.value, json!("app"), &table, &Interruptor::new())
            .unwrap();

        assert_eq!(row["id"], id.to_string());
        assert_eq!(row["db"], "app");
        assert_eq!(row["primary_key"], "email");
        assert_eq!(row["shards"][0]["replicas"], json!(["s1", "s2"]));
        assert_eq!(row["shards"][0]["split_point"], "m");
        assert_eq!(row["shards"][1]["split_point"], Value::Null);
        assert_eq!(row["write_acks"], 2);
        assert_eq!(row["durability"], "soft");
    }
}
