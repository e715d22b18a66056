//! crates/arunika_core/src/ports.rs
//!
//! Defines the service contracts (traits) the sync engine depends on: the
//! hosted remote store with its realtime change stream, and the persisted
//! local key/value storage. Concrete implementations live in the service crate.

use async_trait::async_trait;
use futures::Stream;
use serde_json::Value;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::RemoteConfig;

//=========================================================================================
// Port Error and Result Types
//=========================================================================================

/// A typed failure from the remote store.
///
/// The variants are kept distinct so a caller can tell "run the migration"
/// apart from "try again".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// A column or table the client writes does not exist remotely.
    #[error("Remote schema is out of date: {0}")]
    SchemaMismatch(String),
    #[error("Remote store timed out: {0}")]
    Timeout(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// Failure of the persisted local storage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Storage quota exceeded writing {key}: {needed} bytes needed, {limit} allowed")]
    QuotaExceeded {
        key: String,
        needed: usize,
        limit: usize,
    },
    #[error("Storage I/O error: {0}")]
    Io(String),
}

//=========================================================================================
// Tables and change events
//=========================================================================================

/// The remote tables this client reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Branding,
    Mentor,
    Courses,
    Events,
}

impl Table {
    pub const ALL: [Table; 4] = [Table::Branding, Table::Mentor, Table::Courses, Table::Events];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Branding => "branding",
            Table::Mentor => "mentor",
            Table::Courses => "courses",
            Table::Events => "events",
        }
    }

    /// Resolves a table name from a change notification. Unknown names yield `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.name() == name)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One row-level change delivered by the realtime stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Raw table name as sent by the backend; may name a table we do not know.
    pub table: String,
    pub kind: ChangeKind,
    pub record: Option<Value>,
    pub old_record: Option<Value>,
    /// Writer that produced the change, when the backend reports one.
    pub origin: Option<Uuid>,
}

impl ChangeEvent {
    pub fn table(&self) -> Option<Table> {
        Table::from_name(&self.table)
    }

    /// Id of the affected row, taken from the new row or, for deletes, the old one.
    pub fn record_id(&self) -> Option<&str> {
        self.record
            .as_ref()
            .or(self.old_record.as_ref())
            .and_then(|r| r.get("id"))
            .and_then(Value::as_str)
    }
}

/// Items of a realtime subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    Change(ChangeEvent),
    /// The stream lost messages or its connection; callers refetch everything.
    Reconnected,
}

pub type ChangeStream = Pin<Box<dyn Stream<Item = RealtimeEvent> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Inserts `record` or replaces the row sharing its `conflict_key` value.
    async fn upsert(&self, table: Table, record: Value, conflict_key: &str) -> PortResult<()>;

    /// Fetches one row by id. A missing row is `Ok(None)`, not an error.
    async fn select_singleton(&self, table: Table, id: &str) -> PortResult<Option<Value>>;

    async fn select_all(&self, table: Table) -> PortResult<Vec<Value>>;

    async fn delete_by_id(&self, table: Table, id: &str) -> PortResult<()>;

    /// Subscribes to changes of one table, or of every table when `None`.
    async fn subscribe(&self, table: Option<Table>) -> PortResult<ChangeStream>;
}

/// Builds connected remote store handles from credentials.
#[async_trait]
pub trait RemoteStoreFactory: Send + Sync {
    /// `origin` tags every write made through the returned handle.
    async fn connect(&self, config: &RemoteConfig, origin: Uuid) -> PortResult<Arc<dyn RemoteStore>>;
}

/// Synchronous, capacity-limited string storage that survives restarts.
pub trait KeyValueStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}
