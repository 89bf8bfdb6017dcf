use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info};

use super::traits::{CatalogStore, StoreResult};
use crate::domain::{validate_item, Grocer, ItemRecord, StoreRecord, UpsertOutcome};
use crate::error::StoreError;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS stores (
        id          INTEGER PRIMARY KEY AUTOINCREMENT,
        location_id TEXT NOT NULL UNIQUE,
        grocer      TEXT NOT NULL,
        created_at  TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS items (
        id           INTEGER PRIMARY KEY AUTOINCREMENT,
        name         TEXT NOT NULL CHECK (length(trim(name)) > 0),
        manufacturer TEXT NOT NULL,
        price        TEXT NOT NULL CHECK (CAST(price AS REAL) >= 0),
        store_id     INTEGER NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
        created_at   TEXT NOT NULL,
        updated_at   TEXT NOT NULL,
        UNIQUE (name, manufacturer, store_id)
    );
    CREATE INDEX IF NOT EXISTS idx_items_store_id ON items(store_id);
"#;

const STORE_COLUMNS: &str = "id, location_id, grocer, created_at";
const ITEM_COLUMNS: &str = "id, name, manufacturer, price, store_id, created_at, updated_at";

/// SQLite-backed catalog.
///
/// Uniqueness of stores and items is enforced by the schema, so several
/// processes may import into the same database file at once. Every statement
/// runs on Tokio's blocking pool; busy-timeout waits never stall a runtime
/// worker thread.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and apply the schema.
    pub fn open<P: AsRef<Path>>(path: P, busy_timeout: Duration) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        info!("Opened catalog database at {}", path.display());
        Self::with_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        // journal_mode answers with a row, so it cannot go through execute_batch.
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |_| Ok(()))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `op` against the connection on the blocking pool.
    async fn blocking<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> StoreResult<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| StoreError::Poisoned)?;
            op(&mut *guard)
        })
        .await?
    }

    fn select_store(conn: &Connection, location_id: &str) -> StoreResult<Option<StoreRecord>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE location_id = ?1");
        let row = conn
            .query_row(&sql, params![location_id], raw_store)
            .optional()?;
        row.map(RawStore::into_record).transpose()
    }

    fn find_or_create_store_blocking(
        conn: &Connection,
        location_id: &str,
        grocer: Grocer,
    ) -> StoreResult<StoreRecord> {
        if let Some(existing) = Self::select_store(conn, location_id)? {
            return Ok(existing);
        }

        let inserted = conn.execute(
            "INSERT INTO stores (location_id, grocer, created_at) VALUES (?1, ?2, ?3)",
            params![location_id, grocer.tag(), Utc::now().to_rfc3339()],
        );
        match inserted.map_err(StoreError::from_sqlite) {
            Ok(_) => debug!("Created store: {} ({})", location_id, grocer),
            // Another importer created it between our read and insert.
            Err(StoreError::UniqueViolation(msg)) => {
                debug!("Store {} created concurrently ({}); reading it back", location_id, msg)
            }
            Err(e) => return Err(e),
        }

        Self::select_store(conn, location_id)?.ok_or_else(|| {
            StoreError::InvalidRecord(format!("store '{}' vanished after creation", location_id))
        })
    }

    /// Read the current row, then INSERT or UPDATE, all inside one IMMEDIATE
    /// transaction. The write lock is held from the read on, so no other
    /// writer can slip in between, and the read tells the outcome apart.
    fn upsert_item_blocking(
        conn: &mut Connection,
        name: &str,
        manufacturer: &str,
        price: Decimal,
        store_id: i64,
    ) -> StoreResult<UpsertOutcome> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let existing: Option<(i64, String)> = tx
            .query_row(
                "SELECT id, price FROM items WHERE name = ?1 AND manufacturer = ?2 AND store_id = ?3",
                params![name, manufacturer, store_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let now = Utc::now().to_rfc3339();
        let outcome = match existing {
            Some((id, stored_price)) => {
                if parse_price(&stored_price)? == price {
                    UpsertOutcome::Unchanged
                } else {
                    tx.execute(
                        "UPDATE items SET price = ?1, updated_at = ?2 WHERE id = ?3",
                        params![price.to_string(), now, id],
                    )?;
                    UpsertOutcome::Updated
                }
            }
            None => {
                tx.execute(
                    "INSERT INTO items (name, manufacturer, price, store_id, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![name, manufacturer, price.to_string(), store_id, now],
                )
                .map_err(|e| match StoreError::from_sqlite(e) {
                    StoreError::Database(rusqlite::Error::SqliteFailure(f, _))
                        if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
                    {
                        StoreError::StoreNotFound(store_id)
                    }
                    other => other,
                })?;
                UpsertOutcome::Created
            }
        };

        tx.commit()?;
        Ok(outcome)
    }
}

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn find_or_create_store(
        &self,
        location_id: &str,
        grocer: Grocer,
    ) -> StoreResult<StoreRecord> {
        let location_id = location_id.to_string();
        self.blocking(move |conn| Self::find_or_create_store_blocking(conn, &location_id, grocer))
            .await
    }

    async fn upsert_item(
        &self,
        name: &str,
        manufacturer: &str,
        price: Decimal,
        store_id: i64,
    ) -> StoreResult<UpsertOutcome> {
        validate_item(name, price).map_err(StoreError::InvalidRecord)?;

        let (name, manufacturer) = (name.to_string(), manufacturer.to_string());
        self.blocking(move |conn| {
            Self::upsert_item_blocking(conn, &name, &manufacturer, price, store_id)
        })
        .await
    }

    async fn find_store(&self, location_id: &str) -> StoreResult<Option<StoreRecord>> {
        let location_id = location_id.to_string();
        self.blocking(move |conn| Self::select_store(conn, &location_id))
            .await
    }

    async fn list_stores(&self) -> StoreResult<Vec<StoreRecord>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare(&format!("SELECT {STORE_COLUMNS} FROM stores ORDER BY id"))?;
            let rows = stmt
                .query_map([], raw_store)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawStore::into_record).collect()
        })
        .await
    }

    async fn list_items(&self, store_id: i64) -> StoreResult<Vec<ItemRecord>> {
        self.blocking(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE store_id = ?1 ORDER BY id"
            ))?;
            let rows = stmt
                .query_map(params![store_id], raw_item)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows.into_iter().map(RawItem::into_record).collect()
        })
        .await
    }

    async fn count_items(&self) -> StoreResult<usize> {
        self.blocking(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))?;
            Ok(count as usize)
        })
        .await
    }
}

// Rows are read as plain strings first and converted afterwards, so a bad
// value surfaces as StoreError::CorruptValue instead of a rusqlite type error.
struct RawStore {
    id: i64,
    location_id: String,
    grocer: String,
    created_at: String,
}

impl RawStore {
    fn into_record(self) -> StoreResult<StoreRecord> {
        let grocer = Grocer::from_tag(&self.grocer).ok_or_else(|| StoreError::CorruptValue {
            column: "stores.grocer".to_string(),
            message: format!("unknown grocer '{}'", self.grocer),
        })?;
        Ok(StoreRecord {
            id: self.id,
            location_id: self.location_id,
            grocer,
            created_at: parse_timestamp("stores.created_at", &self.created_at)?,
        })
    }
}

fn raw_store(row: &Row<'_>) -> rusqlite::Result<RawStore> {
    Ok(RawStore {
        id: row.get(0)?,
        location_id: row.get(1)?,
        grocer: row.get(2)?,
        created_at: row.get(3)?,
    })
}

struct RawItem {
    id: i64,
    name: String,
    manufacturer: String,
    price: String,
    store_id: i64,
    created_at: String,
    updated_at: String,
}

impl RawItem {
    fn into_record(self) -> StoreResult<ItemRecord> {
        Ok(ItemRecord {
            id: self.id,
            price: parse_price(&self.price)?,
            created_at: parse_timestamp("items.created_at", &self.created_at)?,
            updated_at: parse_timestamp("items.updated_at", &self.updated_at)?,
            name: self.name,
            manufacturer: self.manufacturer,
            store_id: self.store_id,
        })
    }
}

fn raw_item(row: &Row<'_>) -> rusqlite::Result<RawItem> {
    Ok(RawItem {
        id: row.get(0)?,
        name: row.get(1)?,
        manufacturer: row.get(2)?,
        price: row.get(3)?,
        store_id: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn parse_price(value: &str) -> StoreResult<Decimal> {
    Decimal::from_str(value).map_err(|e| StoreError::CorruptValue {
        column: "items.price".to_string(),
        message: format!("'{}': {}", value, e),
    })
}

fn parse_timestamp(column: &str, value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::CorruptValue {
            column: column.to_string(),
            message: format!("'{}': {}", value, e),
        })
}
