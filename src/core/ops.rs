//! Administrative edits.
//!
//! Each edit stamps what it touches with the node clock and leaves the
//! result in the local replica; peers learn about it through joins.
//! Dropping anything writes a tombstone, and recreating under the same name
//! always mints a fresh id.

use std::collections::BTreeSet;

use crate::clock::Clock;

use super::cluster::ClusterMetadata;
use super::crdt::{Crdt, Lww};
use super::database::DatabaseMetadata;
use super::deletable::Deletable;
use super::entity_map::EntityMap;
use super::error::{CoreError, InvalidConfig, OpError};
use super::identity::{DatabaseId, MachineId, NameString, ServerTag, TableId};
use super::machine::MachineMetadata;
use super::table::{TableConfig, TableMetadata, TableReplicationInfo};

pub const DEFAULT_PRIMARY_KEY: &str = "id";

/// Borrowed view of a replica plus the clock that stamps edits to it.
pub struct MetadataEditor<'a> {
    md: &'a mut ClusterMetadata,
    clock: &'a mut Clock,
}

fn live_mut<'m, K, T>(
    map: &'m mut EntityMap<K, T>,
    id: &K,
    kind: &'static str,
) -> Result<&'m mut T, OpError>
where
    K: Ord + Clone + ToString,
    T: Crdt + Clone,
{
    match map.get(id) {
        None => Err(OpError::NotFound {
            kind,
            id: id.to_string(),
        }),
        Some(Deletable::Deleted) => Err(OpError::Deleted {
            kind,
            id: id.to_string(),
        }),
        Some(Deletable::Live(_)) => map.get_live_mut(id).ok_or_else(|| OpError::NotFound {
            kind,
            id: id.to_string(),
        }),
    }
}

fn ensure_live<K, T>(map: &EntityMap<K, T>, id: &K, kind: &'static str) -> Result<(), OpError>
where
    K: Ord + Clone + ToString,
    T: Crdt + Clone,
{
    match map.get(id) {
        None => Err(OpError::NotFound {
            kind,
            id: id.to_string(),
        }),
        Some(Deletable::Deleted) => Err(OpError::Deleted {
            kind,
            id: id.to_string(),
        }),
        Some(Deletable::Live(_)) => Ok(()),
    }
}

impl<'a> MetadataEditor<'a> {
    pub fn new(md: &'a mut ClusterMetadata, clock: &'a mut Clock) -> Self {
        Self { md, clock }
    }

    pub fn metadata(&self) -> &ClusterMetadata {
        self.md
    }

    pub fn create_database(&mut self, name: NameString) -> Result<DatabaseId, OpError> {
        if self.md.live_database_named(&name).is_some() {
            return Err(OpError::NameInUse {
                kind: "database",
                name: name.to_string(),
            });
        }
        let id = DatabaseId::generate();
        let stamp = self.clock.stamp();
        self.md
            .databases
            .upsert(id, Deletable::Live(DatabaseMetadata::new(Lww::new(name, stamp))));
        tracing::info!(db = %id, "created database");
        Ok(id)
    }

    /// Tombstones the database and every live table in it.
    pub fn drop_database(&mut self, id: DatabaseId) -> Result<Vec<TableId>, OpError> {
        ensure_live(&self.md.databases, &id, "database")?;
        let tables: Vec<TableId> = self.md.live_tables_in(id).map(|(t, _)| *t).collect();
        for table in &tables {
            self.md.tables.tombstone(*table);
        }
        self.md.databases.tombstone(id);
        tracing::info!(db = %id, tables = tables.len(), "dropped database");
        Ok(tables)
    }

    pub fn rename_database(&mut self, id: DatabaseId, name: NameString) -> Result<(), OpError> {
        ensure_live(&self.md.databases, &id, "database")?;
        if let Some(other) = self.md.live_database_named(&name)
            && other != id
        {
            return Err(OpError::NameInUse {
                kind: "database",
                name: name.to_string(),
            });
        }
        let db = live_mut(&mut self.md.databases, &id, "database")?;
        let stamp = self.clock.stamp_after(&db.name.stamp);
        db.name.set(name, stamp);
        Ok(())
    }

    pub fn create_table(
        &mut self,
        db: DatabaseId,
        name: NameString,
        primary_key: Option<String>,
        config: TableConfig,
    ) -> Result<TableId, OpError> {
        ensure_live(&self.md.databases, &db, "database")?;
        if self.md.live_table_named(db, &name).is_some() {
            return Err(OpError::NameInUse {
                kind: "table",
                name: name.to_string(),
            });
        }
        let info = TableReplicationInfo::new(config.clone(), self.choose_directors(&config)?);
        let id = TableId::generate();
        let stamp = self.clock.stamp();
        self.md.tables.upsert(
            id,
            Deletable::Live(TableMetadata {
                name: Lww::new(name, stamp.clone()),
                database: Lww::new(db, stamp.clone()),
                primary_key: Lww::new(
                    primary_key.unwrap_or_else(|| DEFAULT_PRIMARY_KEY.to_string()),
                    stamp.clone(),
                ),
                replication_info: Lww::new(info, stamp),
            }),
        );
        tracing::info!(db = %db, table = %id, shards = config.shards.len(), "created table");
        Ok(id)
    }

    pub fn drop_table(&mut self, id: TableId) -> Result<(), OpError> {
        ensure_live(&self.md.tables, &id, "table")?;
        self.md.tables.tombstone(id);
        tracing::info!(table = %id, "dropped table");
        Ok(())
    }

    pub fn rename_table(&mut self, id: TableId, name: NameString) -> Result<(), OpError> {
        let db = live_mut(&mut self.md.tables, &id, "table")?.database.value;
        if let Some(other) = self.md.live_table_named(db, &name)
            && other != id
        {
            return Err(OpError::NameInUse {
                kind: "table",
                name: name.to_string(),
            });
        }
        let table = live_mut(&mut self.md.tables, &id, "table")?;
        let stamp = self.clock.stamp_after(&table.name.stamp);
        table.name.set(name, stamp);
        Ok(())
    }

    /// Replace the shard layout, keeping the table's write acks.
    pub fn reconfigure_table(&mut self, id: TableId, config: TableConfig) -> Result<(), OpError> {
        ensure_live(&self.md.tables, &id, "table")?;
        let directors = self.choose_directors(&config)?;
        let table = live_mut(&mut self.md.tables, &id, "table")?;
        let mut info = TableReplicationInfo::new(config, directors);
        info.write_ack = table.replication_info.value.write_ack;
        let stamp = self.clock.stamp_after(&table.replication_info.stamp);
        table.replication_info.set(info, stamp);
        Ok(())
    }

    pub fn add_machine(&mut self, name: NameString) -> Result<MachineId, OpError> {
        if self.md.live_machine_named(&name).is_some() {
            return Err(OpError::NameInUse {
                kind: "server",
                name: name.to_string(),
            });
        }
        let id = MachineId::generate();
        let stamp = self.clock.stamp();
        self.md.machines.upsert(
            id,
            Deletable::Live(MachineMetadata::new(
                Lww::new(name, stamp.clone()),
                Lww::new(BTreeSet::from([ServerTag::default_tag()]), stamp),
            )),
        );
        Ok(id)
    }

    pub fn rename_machine(&mut self, id: MachineId, name: NameString) -> Result<(), OpError> {
        ensure_live(&self.md.machines, &id, "server")?;
        if let Some((other, _)) = self.md.live_machine_named(&name)
            && other != id
        {
            return Err(OpError::NameInUse {
                kind: "server",
                name: name.to_string(),
            });
        }
        let machine = live_mut(&mut self.md.machines, &id, "server")?;
        let stamp = self.clock.stamp_after(&machine.name.stamp);
        machine.name.set(name, stamp);
        Ok(())
    }

    pub fn set_machine_tags(
        &mut self,
        id: MachineId,
        tags: BTreeSet<ServerTag>,
    ) -> Result<(), OpError> {
        let machine = live_mut(&mut self.md.machines, &id, "server")?;
        let stamp = self.clock.stamp_after(&machine.tags.stamp);
        machine.tags.set(tags, stamp);
        Ok(())
    }

    pub fn remove_machine(&mut self, id: MachineId) -> Result<(), OpError> {
        ensure_live(&self.md.machines, &id, "server")?;
        self.md.machines.tombstone(id);
        tracing::info!(machine = %id, "removed server");
        Ok(())
    }

    /// Every replica must name a live server; each shard's director is its
    /// first director name in sort order.
    fn choose_directors(&self, config: &TableConfig) -> Result<Vec<MachineId>, OpError> {
        config.validate()?;
        let mut chosen = Vec::with_capacity(config.shards.len());
        for (idx, shard) in config.shards.iter().enumerate() {
            for replica in &shard.replica_names {
                if self.md.live_machine_named(replica).is_none() {
                    return Err(unknown_server(idx, replica));
                }
            }
            let director = shard
                .director_names
                .iter()
                .next()
                .ok_or_else(|| invalid(format!("shard {idx} has no director")))?;
            let (machine, _) = self
                .md
                .live_machine_named(director)
                .ok_or_else(|| unknown_server(idx, director))?;
            chosen.push(machine);
        }
        Ok(chosen)
    }
}

fn invalid(reason: String) -> OpError {
    OpError::InvalidConfig(CoreError::from(InvalidConfig { reason }))
}

fn unknown_server(shard: usize, name: &NameString) -> OpError {
    invalid(format!("shard {shard} names unknown server `{name}`"))
}
