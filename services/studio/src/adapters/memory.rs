//! services/studio/src/adapters/memory.rs
//!
//! An in-process implementation of the `RemoteStore` port. Every handle
//! connected to the same `MemoryBackend` sees the same tables and the same
//! change stream, which makes it a stand-in for the hosted backend in tests
//! and in demos that run without a database.

use arunika_core::domain::RemoteConfig;
use arunika_core::ports::{
    ChangeEvent, ChangeKind, ChangeStream, PortError, PortResult, RealtimeEvent, RemoteStore,
    RemoteStoreFactory, Table,
};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::time::{sleep, Duration};
use tracing::debug;
use uuid::Uuid;

const CHANGE_BUFFER: usize = 256;

//=========================================================================================
// The shared backend
//=========================================================================================

#[derive(Default)]
struct Tables {
    /// Rows per table in insertion order.
    rows: HashMap<Table, Vec<Value>>,
    missing_columns: HashMap<Table, HashSet<String>>,
    fail_next: Option<PortError>,
    upsert_delay: Duration,
}

/// The "server side" shared by all handles.
pub struct MemoryBackend {
    tables: Mutex<Tables>,
    changes: broadcast::Sender<ChangeEvent>,
    requests: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Arc::new(Self {
            tables: Mutex::default(),
            changes,
            requests: AtomicUsize::new(0),
        })
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Number of operations served, across all handles.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables().rows.get(&table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: Table, id: &str) -> Option<Value> {
        self.rows(table).into_iter().find(|r| row_id(r) == Some(id))
    }

    /// Simulates an outdated remote schema: writes naming `column` are rejected.
    pub fn drop_column(&self, table: Table, column: &str) {
        self.tables()
            .missing_columns
            .entry(table)
            .or_default()
            .insert(column.to_string());
    }

    /// Makes the next operation fail with `error`.
    pub fn fail_next(&self, error: PortError) {
        self.tables().fail_next = Some(error);
    }

    /// Makes every upsert take `delay` before it lands.
    pub fn set_upsert_delay(&self, delay: Duration) {
        self.tables().upsert_delay = delay;
    }

    /// Delivers a change to every subscriber, as a foreign writer would.
    pub fn broadcast(&self, event: ChangeEvent) {
        // No subscribers is not an error for a broadcast.
        let _ = self.changes.send(event);
    }

    fn begin(&self) -> PortResult<()> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        match self.tables().fail_next.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

//=========================================================================================
// The client handle
//=========================================================================================

/// A connected handle. Writes are tagged with the handle's origin.
#[derive(Clone)]
pub struct MemoryRemoteStore {
    backend: Arc<MemoryBackend>,
    origin: Uuid,
}

impl MemoryRemoteStore {
    pub fn new(backend: Arc<MemoryBackend>, origin: Uuid) -> Self {
        Self { backend, origin }
    }
}

#[async_trait]
impl RemoteStore for MemoryRemoteStore {
    async fn upsert(&self, table: Table, record: Value, conflict_key: &str) -> PortResult<()> {
        self.backend.begin()?;
        let delay = self.backend.tables().upsert_delay;
        if !delay.is_zero() {
            sleep(delay).await;
        }
        let key = record
            .get(conflict_key)
            .cloned()
            .ok_or_else(|| PortError::Unexpected(format!("record has no '{conflict_key}' value")))?;

        let kind = {
            let mut tables = self.backend.tables();
            if let (Some(missing), Some(fields)) =
                (tables.missing_columns.get(&table), record.as_object())
            {
                if let Some(column) = fields.keys().find(|k| missing.contains(k.as_str())) {
                    return Err(PortError::SchemaMismatch(format!(
                        "column \"{column}\" of relation \"{table}\" does not exist"
                    )));
                }
            }
            let rows = tables.rows.entry(table).or_default();
            match rows.iter_mut().find(|r| r.get(conflict_key) == Some(&key)) {
                Some(existing) => {
                    *existing = record.clone();
                    ChangeKind::Update
                }
                None => {
                    rows.push(record.clone());
                    ChangeKind::Insert
                }
            }
        };
        debug!("memory store: {:?} on {}", kind, table);

        self.backend.broadcast(ChangeEvent {
            table: table.name().to_string(),
            kind,
            record: Some(record),
            old_record: None,
            origin: Some(self.origin),
        });
        Ok(())
    }

    async fn select_singleton(&self, table: Table, id: &str) -> PortResult<Option<Value>> {
        self.backend.begin()?;
        Ok(self.backend.row(table, id))
    }

    async fn select_all(&self, table: Table) -> PortResult<Vec<Value>> {
        self.backend.begin()?;
        Ok(self.backend.rows(table))
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> PortResult<()> {
        self.backend.begin()?;
        let removed = {
            let mut tables = self.backend.tables();
            let rows = tables.rows.entry(table).or_default();
            let before = rows.len();
            rows.retain(|r| row_id(r) != Some(id));
            before != rows.len()
        };
        if removed {
            self.backend.broadcast(ChangeEvent {
                table: table.name().to_string(),
                kind: ChangeKind::Delete,
                record: None,
                old_record: Some(serde_json::json!({ "id": id })),
                origin: Some(self.origin),
            });
        }
        Ok(())
    }

    async fn subscribe(&self, table: Option<Table>) -> PortResult<ChangeStream> {
        self.backend.begin()?;
        let mut receiver = self.backend.changes.subscribe();
        let stream = async_stream::stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        if table.map_or(true, |t| event.table == t.name()) {
                            yield RealtimeEvent::Change(event);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!("memory store subscriber lagged by {} events", skipped);
                        yield RealtimeEvent::Reconnected;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

//=========================================================================================
// Factory
//=========================================================================================

/// Connects handles to one shared backend, ignoring the credential values.
pub struct MemoryRemoteStoreFactory {
    backend: Arc<MemoryBackend>,
    connects: AtomicUsize,
}

impl MemoryRemoteStoreFactory {
    pub fn new(backend: Arc<MemoryBackend>) -> Self {
        Self {
            backend,
            connects: AtomicUsize::new(0),
        }
    }

    pub fn backend(&self) -> &Arc<MemoryBackend> {
        &self.backend
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteStoreFactory for MemoryRemoteStoreFactory {
    async fn connect(&self, config: &RemoteConfig, origin: Uuid) -> PortResult<Arc<dyn RemoteStore>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        debug!("memory store: connecting to {}", config.endpoint_url);
        Ok(Arc::new(MemoryRemoteStore::new(self.backend.clone(), origin)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn upsert_is_idempotent_by_conflict_key() {
        let backend = MemoryBackend::new();
        let store = MemoryRemoteStore::new(backend.clone(), Uuid::new_v4());

        let row = json!({ "id": "course-1", "title": "Draft" });
        store.upsert(Table::Courses, row.clone(), "id").await.unwrap();
        store.upsert(Table::Courses, row, "id").await.unwrap();
        store
            .upsert(Table::Courses, json!({ "id": "course-1", "title": "Final" }), "id")
            .await
            .unwrap();

        let rows = backend.rows(Table::Courses);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], "Final");
    }

    #[tokio::test]
    async fn missing_column_is_a_schema_mismatch() {
        let backend = MemoryBackend::new();
        backend.drop_column(Table::Courses, "categories");
        let store = MemoryRemoteStore::new(backend.clone(), Uuid::new_v4());

        let err = store
            .upsert(Table::Courses, json!({ "id": "c", "categories": [] }), "id")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::SchemaMismatch(msg) if msg.contains("categories")));
        assert!(backend.rows(Table::Courses).is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_tagged_changes_for_their_table() {
        let backend = MemoryBackend::new();
        let origin = Uuid::new_v4();
        let store = MemoryRemoteStore::new(backend.clone(), origin);
        let mut courses = store.subscribe(Some(Table::Courses)).await.unwrap();

        store
            .upsert(Table::Branding, json!({ "id": "config" }), "id")
            .await
            .unwrap();
        store
            .upsert(Table::Courses, json!({ "id": "course-1" }), "id")
            .await
            .unwrap();

        match courses.next().await {
            Some(RealtimeEvent::Change(event)) => {
                assert_eq!(event.table, "courses");
                assert_eq!(event.kind, ChangeKind::Insert);
                assert_eq!(event.origin, Some(origin));
            }
            other => panic!("unexpected item: {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_singleton_is_none() {
        let backend = MemoryBackend::new();
        let store = MemoryRemoteStore::new(backend, Uuid::new_v4());
        assert_eq!(store.select_singleton(Table::Mentor, "profile").await, Ok(None));
    }
}
