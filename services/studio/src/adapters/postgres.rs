//! services/studio/src/adapters/postgres.rs
//!
//! The database adapter: the `RemoteStore` port implemented against the
//! hosted Postgres database using `sqlx`. Realtime changes come from a trigger
//! that publishes every row change on the `arunika_changes` channel; writes
//! run in a transaction that tags the session with the writer's origin so the
//! trigger can report who made the change.

use arunika_core::domain::RemoteConfig;
use arunika_core::ports::{
    ChangeEvent, ChangeKind, ChangeStream, PortError, PortResult, RealtimeEvent, RemoteStore,
    RemoteStoreFactory, Table,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgListener, PgPoolOptions};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CHANGES_CHANNEL: &str = "arunika_changes";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct PgRemoteStore {
    pool: PgPool,
    origin: Uuid,
}

impl PgRemoteStore {
    pub fn new(pool: PgPool, origin: Uuid) -> Self {
        Self { pool, origin }
    }

    /// Creates the reference schema and the change trigger.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    async fn fetch_row(pool: &PgPool, table: Table, id: &str) -> PortResult<Option<Value>> {
        let sql = format!(
            "SELECT to_jsonb(t) AS row FROM {} t WHERE t.id::text = $1",
            quote_ident(table.name())
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx_error)?;
        row.map(|r| r.try_get::<Value, _>("row"))
            .transpose()
            .map_err(map_sqlx_error)
    }
}

//=========================================================================================
// Error mapping
//=========================================================================================

/// Maps a driver error onto the typed port failures.
pub fn map_sqlx_error(error: sqlx::Error) -> PortError {
    match &error {
        sqlx::Error::RowNotFound => PortError::NotFound(error.to_string()),
        sqlx::Error::PoolTimedOut => PortError::Timeout(error.to_string()),
        sqlx::Error::Io(io) if io.kind() == std::io::ErrorKind::TimedOut => {
            PortError::Timeout(error.to_string())
        }
        sqlx::Error::Database(db) => match db.code().as_deref() {
            // undefined_column, undefined_table
            Some("42703") | Some("42P01") => PortError::SchemaMismatch(db.message().to_string()),
            // insufficient_privilege, invalid_password, invalid_authorization_specification
            Some("42501") | Some("28P01") | Some("28000") => PortError::Unauthorized,
            // query_canceled (statement_timeout)
            Some("57014") => PortError::Timeout(db.message().to_string()),
            _ => PortError::Unexpected(error.to_string()),
        },
        _ => PortError::Unexpected(error.to_string()),
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn order_column(table: Table) -> &'static str {
    match table {
        Table::Branding | Table::Mentor => "id",
        Table::Courses | Table::Events => "created_at",
    }
}

//=========================================================================================
// `RemoteStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteStore for PgRemoteStore {
    async fn upsert(&self, table: Table, record: Value, conflict_key: &str) -> PortResult<()> {
        let columns: Vec<String> = record
            .as_object()
            .ok_or_else(|| PortError::Unexpected("upsert expects a JSON object".to_string()))?
            .keys()
            .map(|k| quote_ident(k))
            .collect();
        let column_list = columns.join(", ");
        let updates = columns
            .iter()
            .map(|c| format!("{c} = EXCLUDED.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        // Naming the columns explicitly makes a missing column an error
        // instead of a silently dropped field.
        let sql = format!(
            "INSERT INTO {table} ({column_list}) \
             SELECT {column_list} FROM jsonb_populate_record(NULL::{table}, $1) \
             ON CONFLICT ({key}) DO UPDATE SET {updates}",
            table = quote_ident(table.name()),
            key = quote_ident(conflict_key),
        );

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SELECT set_config('arunika.origin', $1, true)")
            .bind(self.origin.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(&sql)
            .bind(sqlx::types::Json(&record))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        debug!("Upserted row into {}", table);
        Ok(())
    }

    async fn select_singleton(&self, table: Table, id: &str) -> PortResult<Option<Value>> {
        Self::fetch_row(&self.pool, table, id).await
    }

    async fn select_all(&self, table: Table) -> PortResult<Vec<Value>> {
        let sql = format!(
            "SELECT to_jsonb(t) AS row FROM {} t ORDER BY t.{} ASC",
            quote_ident(table.name()),
            quote_ident(order_column(table))
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        rows.into_iter()
            .map(|r| r.try_get::<Value, _>("row").map_err(map_sqlx_error))
            .collect()
    }

    async fn delete_by_id(&self, table: Table, id: &str) -> PortResult<()> {
        let sql = format!("DELETE FROM {} WHERE id::text = $1", quote_ident(table.name()));
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("SELECT set_config('arunika.origin', $1, true)")
            .bind(self.origin.to_string())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    async fn subscribe(&self, table: Option<Table>) -> PortResult<ChangeStream> {
        let mut listener = PgListener::connect_with(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        listener
            .listen(CHANGES_CHANNEL)
            .await
            .map_err(map_sqlx_error)?;
        info!("Listening for remote changes on '{}'", CHANGES_CHANNEL);

        let pool = self.pool.clone();
        let stream = async_stream::stream! {
            loop {
                match listener.try_recv().await {
                    Ok(Some(notification)) => {
                        let payload = match serde_json::from_str::<NotifyPayload>(notification.payload()) {
                            Ok(payload) => payload,
                            Err(e) => {
                                warn!("Ignoring malformed change notification: {}", e);
                                continue;
                            }
                        };
                        if table.is_some_and(|t| t.name() != payload.table) {
                            continue;
                        }
                        match payload.into_event(&pool).await {
                            Ok(event) => yield RealtimeEvent::Change(event),
                            Err(e) => warn!("Could not resolve change notification: {}", e),
                        }
                    }
                    // The connection dropped; the listener reconnects on the next call.
                    Ok(None) => yield RealtimeEvent::Reconnected,
                    Err(e) => {
                        warn!("Change listener failed: {}", e);
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}

//=========================================================================================
// Notification payloads
//=========================================================================================

/// The JSON published by the `arunika_notify_change` trigger.
#[derive(Debug, Deserialize)]
struct NotifyPayload {
    table: String,
    #[serde(rename = "type")]
    op: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    record: Option<Value>,
    #[serde(default)]
    old_record: Option<Value>,
    #[serde(default)]
    origin: Option<String>,
}

impl NotifyPayload {
    async fn into_event(self, pool: &PgPool) -> PortResult<ChangeEvent> {
        let kind = match self.op.as_str() {
            "INSERT" => ChangeKind::Insert,
            "UPDATE" => ChangeKind::Update,
            "DELETE" => ChangeKind::Delete,
            other => return Err(PortError::Unexpected(format!("unknown operation {other}"))),
        };
        // Rows too large for a NOTIFY payload arrive as an id only.
        let record = match (self.record, kind, Table::from_name(&self.table), &self.id) {
            (Some(record), _, _, _) => Some(record),
            (None, ChangeKind::Delete, _, _) => None,
            (None, _, Some(table), Some(id)) => PgRemoteStore::fetch_row(pool, table, id).await?,
            (None, _, _, _) => None,
        };
        let old_record = self
            .old_record
            .or_else(|| self.id.map(|id| serde_json::json!({ "id": id })));
        Ok(ChangeEvent {
            table: self.table,
            kind,
            record,
            old_record,
            origin: self.origin.as_deref().and_then(|o| Uuid::parse_str(o).ok()),
        })
    }
}

//=========================================================================================
// Factory
//=========================================================================================

/// Connects to the hosted database. `endpoint_url` is its connection URL and
/// `api_key` the database password.
pub struct PgRemoteStoreFactory {
    acquire_timeout: Duration,
    run_migrations: bool,
}

impl PgRemoteStoreFactory {
    pub fn new(acquire_timeout: Duration, run_migrations: bool) -> Self {
        Self {
            acquire_timeout,
            run_migrations,
        }
    }
}

#[async_trait]
impl RemoteStoreFactory for PgRemoteStoreFactory {
    async fn connect(&self, config: &RemoteConfig, origin: Uuid) -> PortResult<Arc<dyn RemoteStore>> {
        let options = PgConnectOptions::from_str(&config.endpoint_url)
            .map_err(|e| PortError::Unexpected(format!("invalid endpoint URL: {e}")))?
            .password(&config.api_key);
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(self.acquire_timeout)
            .connect_lazy_with(options);
        let store = PgRemoteStore::new(pool, origin);

        if self.run_migrations {
            info!("Running database migrations...");
            store.run_migrations().await.map_err(|e| match e {
                sqlx::Error::Migrate(m) => PortError::Unexpected(m.to_string()),
                other => map_sqlx_error(other),
            })?;
            info!("Database migrations complete.");
        }
        Ok(Arc::new(store))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("courses"), "\"courses\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn pool_timeout_maps_to_timeout() {
        assert!(matches!(map_sqlx_error(sqlx::Error::PoolTimedOut), PortError::Timeout(_)));
        assert!(matches!(
            map_sqlx_error(sqlx::Error::RowNotFound),
            PortError::NotFound(_)
        ));
    }

    #[test]
    fn notify_payload_parses_trigger_output() {
        let raw = r#"{"table":"courses","type":"UPDATE","id":"course-1",
            "record":{"id":"course-1","title":"T"},"old_record":null,
            "origin":"6f1c2a7e-8a8e-4d43-9d6e-0d1b2b3c4d5e"}"#;
        let payload: NotifyPayload = serde_json::from_str(raw).unwrap();
        assert_eq!(payload.table, "courses");
        assert_eq!(payload.op, "UPDATE");
        assert_eq!(payload.record.unwrap()["title"], "T");
    }
}
