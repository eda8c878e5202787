//! Administrative table view.
//!
//! Read-only row projections of the cluster metadata. Every read works on a
//! snapshot taken at call time, so a listing never observes a half-applied
//! join. Dangling references (a table whose database was dropped) are shown
//! with a placeholder database name instead of failing the read.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::core::{
    ClusterMetadata, DatabaseId, NameString, SemilatticeView, TableId, TableMetadata,
};
use crate::error::{Effect, Transience};

mod table_config;

pub use table_config::TableConfigFormatter;

/// A structured admin row.
pub type Row = Value;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AdminError {
    #[error("read interrupted")]
    Interrupted,
    #[error("failed to format row for table {table}: {reason}")]
    Format { table: TableId, reason: String },
}

impl AdminError {
    pub fn transience(&self) -> Transience {
        match self {
            AdminError::Interrupted => Transience::Retryable,
            AdminError::Format { .. } => Transience::Permanent,
        }
    }

    pub fn effect(&self) -> Effect {
        Effect::None
    }
}

/// Cloneable cancellation flag for long reads.
#[derive(Clone, Debug, Default)]
pub struct Interruptor(Arc<AtomicBool>);

impl Interruptor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interrupt(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_interrupted(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn check(&self) -> Result<(), AdminError> {
        if self.is_interrupted() {
            Err(AdminError::Interrupted)
        } else {
            Ok(())
        }
    }
}

/// How rows refer to other entities.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierFormat {
    #[default]
    Name,
    Uuid,
}

impl fmt::Display for IdentifierFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IdentifierFormat::Name => "name",
            IdentifierFormat::Uuid => "uuid",
        })
    }
}

impl FromStr for IdentifierFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "name" => Ok(IdentifierFormat::Name),
            "uuid" => Ok(IdentifierFormat::Uuid),
            other => Err(format!("unknown identifier format `{other}` (expected name or uuid)")),
        }
    }
}

/// Builds the row for one live table.
pub trait RowFormatter {
    fn format_row(
        &self,
        id: TableId,
        name: &NameString,
        db: Value,
        table: &TableMetadata,
        interruptor: &Interruptor,
    ) -> Result<Row, AdminError>;
}

pub struct TableBackend<F> {
    view: Arc<SemilatticeView<ClusterMetadata>>,
    identifier_format: IdentifierFormat,
    formatter: F,
}

impl<F: RowFormatter> TableBackend<F> {
    pub fn new(
        view: Arc<SemilatticeView<ClusterMetadata>>,
        identifier_format: IdentifierFormat,
        formatter: F,
    ) -> Self {
        Self {
            view,
            identifier_format,
            formatter,
        }
    }

    pub fn get_primary_key_name(&self) -> &'static str {
        "id"
    }

    /// One row per live table. Checks `interruptor` before every row.
    pub fn list_rows(&self, interruptor: &Interruptor) -> Result<Vec<Row>, AdminError> {
        let md = self.view.get();
        let mut rows = Vec::with_capacity(md.tables.len());
        for (id, table) in md.tables.iter_live() {
            interruptor.check()?;
            rows.push(self.format(&md, *id, table, interruptor)?);
        }
        Ok(rows)
    }

    /// Missing, tombstoned and unparsable keys all read as `None`.
    pub fn get_row(
        &self,
        primary_key: &Value,
        interruptor: &Interruptor,
    ) -> Result<Option<Row>, AdminError> {
        interruptor.check()?;
        let id = primary_key
            .as_str()
            .and_then(|raw| TableId::parse_str(raw).ok())
            .unwrap_or_else(TableId::nil);
        let md = self.view.get();
        match md.tables.get_live(&id) {
            Some(table) => self.format(&md, id, table, interruptor).map(Some),
            None => Ok(None),
        }
    }

    /// Live name of `db`, or the deleted-database placeholder.
    pub fn resolve_database_name(&self, db: DatabaseId) -> NameString {
        resolve_database_name(&self.view.get(), db)
    }

    fn format(
        &self,
        md: &ClusterMetadata,
        id: TableId,
        table: &TableMetadata,
        interruptor: &Interruptor,
    ) -> Result<Row, AdminError> {
        let db = database_field(md, table.database.value, self.identifier_format);
        self.formatter
            .format_row(id, &table.name.value, db, table, interruptor)
    }
}

pub fn resolve_database_name(md: &ClusterMetadata, db: DatabaseId) -> NameString {
    match md.databases.get_live(&db) {
        Some(live) => live.name.value.clone(),
        None => {
            tracing::debug!(db = %db, "table references a missing database");
            NameString::deleted_database()
        }
    }
}

/// A database that is no longer live reads as the placeholder name in
/// either format.
fn database_field(md: &ClusterMetadata, db: DatabaseId, format: IdentifierFormat) -> Value {
    match (format, md.databases.get_live(&db)) {
        (IdentifierFormat::Uuid, Some(_)) => Value::String(db.to_string()),
        _ => Value::String(resolve_database_name(md, db).into()),
    }
}
