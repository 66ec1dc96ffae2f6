// 🗄️ SQLite persistence (rusqlite + WAL)
// Rows are versions keyed by (uuid, version). Partial unique indexes on
// current rows are the real guarantee behind "one live version per uuid" and
// "one live record per code"; the service-level checks only fail early.

use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

use crate::entities::{Item, MedicalRecord, PriceListDetail, RecordKind, Service};
use crate::error::{StoreError, StoreResult};
use crate::signals::{Listener, Outcome, Phase, Signal};
use crate::store::{PriceListDetailStore, RecordStore};
use crate::temporal::Validity;

/// Columns shared by every versioned record table, in select order
const VERSION_COLUMNS: [&str; 5] = ["uuid", "version", "validity_from", "validity_to", "audit_user_id"];

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> StoreResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Medical items
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS items (
            uuid TEXT NOT NULL,
            version INTEGER NOT NULL,
            validity_from TEXT NOT NULL,
            validity_to TEXT,
            audit_user_id INTEGER NOT NULL,
            code TEXT,
            name TEXT,
            item_type TEXT,
            price REAL,
            care_type TEXT,
            patient_category INTEGER,
            package TEXT,
            quantity REAL,
            frequency INTEGER,
            PRIMARY KEY (uuid, version)
        )",
        [],
    )?;

    // ==========================================================================
    // Medical services
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS services (
            uuid TEXT NOT NULL,
            version INTEGER NOT NULL,
            validity_from TEXT NOT NULL,
            validity_to TEXT,
            audit_user_id INTEGER NOT NULL,
            code TEXT,
            name TEXT,
            category TEXT,
            service_type TEXT,
            level TEXT,
            price REAL,
            care_type TEXT,
            patient_category INTEGER,
            frequency INTEGER,
            maximum_amount REAL,
            PRIMARY KEY (uuid, version)
        )",
        [],
    )?;

    // ==========================================================================
    // Price list details (children of items and services)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS pricelist_details (
            uuid TEXT NOT NULL,
            version INTEGER NOT NULL,
            kind TEXT NOT NULL,
            parent_uuid TEXT NOT NULL,
            pricelist TEXT NOT NULL,
            price_overrule REAL,
            audit_user_id INTEGER NOT NULL,
            validity_from TEXT NOT NULL,
            validity_to TEXT,
            PRIMARY KEY (uuid, version)
        )",
        [],
    )?;

    // ==========================================================================
    // Events Table (audit trail)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    for table in ["items", "services"] {
        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_current_code
                 ON {table}(code) WHERE validity_to IS NULL"
            ),
            [],
        )?;
        conn.execute(
            &format!(
                "CREATE UNIQUE INDEX IF NOT EXISTS idx_{table}_current_uuid
                 ON {table}(uuid) WHERE validity_to IS NULL"
            ),
            [],
        )?;
    }

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_pricelist_details_parent
         ON pricelist_details(kind, parent_uuid)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

// ============================================================================
// ROW MAPPING
// ============================================================================

/// Table layout of a versioned record.
///
/// Rows are selected as `VERSION_COLUMNS` followed by `BUSINESS_COLUMNS`, so
/// `from_row` reads business fields from index 5 onwards.
pub trait SqlRecord: MedicalRecord {
    const TABLE: &'static str;
    const BUSINESS_COLUMNS: &'static [&'static str];

    /// Values for `BUSINESS_COLUMNS`, same order
    fn business_values(&self) -> Vec<Value>;

    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

impl SqlRecord for Item {
    const TABLE: &'static str = "items";
    const BUSINESS_COLUMNS: &'static [&'static str] = &[
        "code",
        "name",
        "item_type",
        "price",
        "care_type",
        "patient_category",
        "package",
        "quantity",
        "frequency",
    ];

    fn business_values(&self) -> Vec<Value> {
        vec![
            self.code.clone().into(),
            self.name.clone().into(),
            self.item_type.clone().into(),
            self.price.into(),
            self.care_type.clone().into(),
            self.patient_category.into(),
            self.package.clone().into(),
            self.quantity.into(),
            self.frequency.into(),
        ]
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Item {
            uuid: row.get(0)?,
            validity: read_validity(row, 1)?,
            audit_user_id: row.get(4)?,
            code: row.get(5)?,
            name: row.get(6)?,
            item_type: row.get(7)?,
            price: row.get(8)?,
            care_type: row.get(9)?,
            patient_category: row.get(10)?,
            package: row.get(11)?,
            quantity: row.get(12)?,
            frequency: row.get(13)?,
        })
    }
}

impl SqlRecord for Service {
    const TABLE: &'static str = "services";
    const BUSINESS_COLUMNS: &'static [&'static str] = &[
        "code",
        "name",
        "category",
        "service_type",
        "level",
        "price",
        "care_type",
        "patient_category",
        "frequency",
        "maximum_amount",
    ];

    fn business_values(&self) -> Vec<Value> {
        vec![
            self.code.clone().into(),
            self.name.clone().into(),
            self.category.clone().into(),
            self.service_type.clone().into(),
            self.level.clone().into(),
            self.price.into(),
            self.care_type.clone().into(),
            self.patient_category.into(),
            self.frequency.into(),
            self.maximum_amount.into(),
        ]
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Service {
            uuid: row.get(0)?,
            validity: read_validity(row, 1)?,
            audit_user_id: row.get(4)?,
            code: row.get(5)?,
            name: row.get(6)?,
            category: row.get(7)?,
            service_type: row.get(8)?,
            level: row.get(9)?,
            price: row.get(10)?,
            care_type: row.get(11)?,
            patient_category: row.get(12)?,
            frequency: row.get(13)?,
            maximum_amount: row.get(14)?,
        })
    }
}

fn parse_time(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Read `version, validity_from, validity_to` starting at column `first`
fn read_validity(row: &Row, first: usize) -> rusqlite::Result<Validity> {
    let from: String = row.get(first + 1)?;
    let to: Option<String> = row.get(first + 2)?;

    Ok(Validity {
        version: row.get(first)?,
        validity_from: parse_time(first + 1, &from)?,
        validity_to: to.map(|s| parse_time(first + 2, &s)).transpose()?,
    })
}

fn all_columns<R: SqlRecord>() -> Vec<&'static str> {
    VERSION_COLUMNS
        .iter()
        .chain(R::BUSINESS_COLUMNS.iter())
        .copied()
        .collect()
}

fn select_sql<R: SqlRecord>(filter: &str) -> String {
    format!(
        "SELECT {} FROM {} WHERE {}",
        all_columns::<R>().join(", "),
        R::TABLE,
        filter
    )
}

fn row_values<R: SqlRecord>(record: &R) -> Vec<Value> {
    let validity = record.validity();
    let mut values: Vec<Value> = vec![
        record.uuid().to_string().into(),
        validity.version.into(),
        validity.validity_from.to_rfc3339().into(),
        validity.validity_to.map(|t| t.to_rfc3339()).into(),
        record.audit_user_id().into(),
    ];
    values.extend(record.business_values());
    values
}

/// INSERT for a full row; `upsert` replaces an existing `(uuid, version)` row
fn insert_sql<R: SqlRecord>(upsert: bool) -> String {
    let columns = all_columns::<R>();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{}", i)).collect();

    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        R::TABLE,
        columns.join(", "),
        placeholders.join(", ")
    );

    if upsert {
        let assignments: Vec<String> = columns
            .iter()
            .skip(2)
            .map(|c| format!("{c} = excluded.{c}"))
            .collect();
        sql.push_str(&format!(
            " ON CONFLICT(uuid, version) DO UPDATE SET {}",
            assignments.join(", ")
        ));
    }

    sql
}

/// Turn a unique-index failure into `StoreError::UniqueViolation`
fn map_write_error<R: SqlRecord>(err: rusqlite::Error, record: &R) -> StoreError {
    if let rusqlite::Error::SqliteFailure(ref failure, Some(ref message)) = err {
        if failure.code == ErrorCode::ConstraintViolation && message.contains("UNIQUE") {
            let (column, value) = if message.contains(".code") {
                ("code", record.code().unwrap_or_default().to_string())
            } else {
                ("uuid", record.uuid().to_string())
            };
            return StoreError::UniqueViolation {
                table: R::TABLE,
                column,
                value,
            };
        }
    }
    StoreError::Sqlite(err)
}

// ============================================================================
// EVENTS (audit trail)
// ============================================================================

/// Event for audit trail: one row per completed mutation
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    pub fn new(
        event_type: &str,
        entity_type: &str,
        entity_id: &str,
        data: serde_json::Value,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: actor.to_string(),
        }
    }
}

/// Insert event into audit trail
pub fn insert_event(conn: &Connection, event: &Event) -> StoreResult<()> {
    let data_json = serde_json::to_string(&event.data)?;

    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            data_json,
            event.actor,
        ],
    )?;

    Ok(())
}

/// Get events for a specific entity, newest first
pub fn get_events_for_entity(
    conn: &Connection,
    entity_type: &str,
    entity_id: &str,
) -> StoreResult<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = ?1 AND entity_id = ?2
         ORDER BY timestamp DESC",
    )?;

    let rows = stmt
        .query_map(params![entity_type, entity_id], |row| {
            let timestamp: String = row.get(1)?;
            let data_json: String = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                parse_time(1, &timestamp)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                data_json,
                row.get::<_, String>(6)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut events = Vec::with_capacity(rows.len());
    for (event_id, timestamp, event_type, entity_type, entity_id, data_json, actor) in rows {
        events.push(Event {
            event_id,
            timestamp,
            event_type,
            entity_type,
            entity_id,
            data: serde_json::from_str(&data_json)?,
            actor,
        });
    }

    Ok(events)
}

// ============================================================================
// SQLITE STORE
// ============================================================================

/// rusqlite-backed store for items, services and price-list details
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) the database file and make sure the schema exists
    pub fn open(path: &Path) -> StoreResult<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    pub fn from_connection(conn: Connection) -> StoreResult<Self> {
        setup_database(&conn)?;
        Ok(SqliteStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    pub fn record_event(&self, event: &Event) -> StoreResult<()> {
        let conn = self.conn()?;
        insert_event(&conn, event)
    }

    pub fn events_for(&self, entity_type: &str, entity_id: &str) -> StoreResult<Vec<Event>> {
        let conn = self.conn()?;
        get_events_for_entity(&conn, entity_type, entity_id)
    }

    /// Signal listener writing one `events` row per completed create-or-update
    pub fn event_listener(&self) -> Listener {
        let store = self.clone();
        Arc::new(move |signal: &Signal| -> anyhow::Result<()> {
            if signal.phase != Phase::After {
                return Ok(());
            }
            if let Some(Outcome::Saved { uuid, version }) = &signal.outcome {
                let event = Event::new(
                    signal.name,
                    signal.kind.as_str(),
                    uuid,
                    serde_json::json!({
                        "version": version,
                        "data": signal.data,
                    }),
                    &signal.audit_user_id.to_string(),
                );
                store.record_event(&event)?;
            }
            Ok(())
        })
    }
}

impl<R: SqlRecord> RecordStore<R> for SqliteStore {
    fn create(&self, record: &R) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(&insert_sql::<R>(false), params_from_iter(row_values(record)))
            .map_err(|e| map_write_error(e, record))?;
        debug!(table = R::TABLE, uuid = record.uuid(), "inserted version 1");
        Ok(())
    }

    fn find_current_by_uuid(&self, uuid: &str) -> StoreResult<Option<R>> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &select_sql::<R>("uuid = ?1 AND validity_to IS NULL"),
                params![uuid],
                |row| R::from_row(row),
            )
            .optional()?;
        Ok(record)
    }

    fn has_history(&self, uuid: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            &format!("SELECT EXISTS(SELECT 1 FROM {} WHERE uuid = ?1)", R::TABLE),
            params![uuid],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn exists_current_by_code(&self, code: &str) -> StoreResult<bool> {
        let conn = self.conn()?;
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE code = ?1 AND validity_to IS NULL)",
                R::TABLE
            ),
            params![code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn save(&self, record: &R) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(&insert_sql::<R>(true), params_from_iter(row_values(record)))
            .map_err(|e| map_write_error(e, record))?;
        Ok(())
    }

    fn close_history(&self, record: &R, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        close_current::<R>(&conn, record, at)
    }

    fn replace_version(&self, previous: &R, next: &R, at: DateTime<Utc>) -> StoreResult<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        close_current::<R>(&tx, previous, at)?;
        tx.execute(&insert_sql::<R>(false), params_from_iter(row_values(next)))
            .map_err(|e| map_write_error(e, next))?;

        // dropping the transaction without commit rolls the close back
        tx.commit()?;
        debug!(table = R::TABLE, uuid = next.uuid(), version = next.version(), "replaced version");
        Ok(())
    }

    fn history(&self, uuid: &str) -> StoreResult<Vec<R>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&select_sql::<R>("uuid = ?1 ORDER BY version ASC"))?;
        let versions = stmt
            .query_map(params![uuid], |row| R::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(versions)
    }

    fn all_current(&self) -> StoreResult<Vec<R>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&select_sql::<R>("validity_to IS NULL ORDER BY code, uuid"))?;
        let records = stmt
            .query_map([], |row| R::from_row(row))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

/// Close the live row `(uuid, version)` of `record`; a historical or missing row is refused
fn close_current<R: SqlRecord>(conn: &Connection, record: &R, at: DateTime<Utc>) -> StoreResult<()> {
    let changed = conn.execute(
        &format!(
            "UPDATE {} SET validity_to = ?1
             WHERE uuid = ?2 AND version = ?3 AND validity_to IS NULL",
            R::TABLE
        ),
        params![at.to_rfc3339(), record.uuid(), record.version()],
    )?;

    if changed == 0 {
        return Err(StoreError::MissingVersion {
            uuid: record.uuid().to_string(),
            version: record.version(),
        });
    }
    Ok(())
}

fn detail_from_row(row: &Row) -> rusqlite::Result<PriceListDetail> {
    let kind: String = row.get(1)?;
    let kind = RecordKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            Type::Text,
            format!("unknown record kind {:?}", kind).into(),
        )
    })?;

    Ok(PriceListDetail {
        uuid: row.get(0)?,
        kind,
        parent_uuid: row.get(2)?,
        pricelist: row.get(3)?,
        price_overrule: row.get(4)?,
        audit_user_id: row.get(5)?,
        validity: read_validity(row, 6)?,
    })
}

impl PriceListDetailStore for SqliteStore {
    fn create(&self, detail: &PriceListDetail) -> StoreResult<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO pricelist_details (
                uuid, version, kind, parent_uuid, pricelist, price_overrule,
                audit_user_id, validity_from, validity_to
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                detail.uuid,
                detail.validity.version,
                detail.kind.as_str(),
                detail.parent_uuid,
                detail.pricelist,
                detail.price_overrule,
                detail.audit_user_id,
                detail.validity.validity_from.to_rfc3339(),
                detail.validity.validity_to.map(|t| t.to_rfc3339()),
            ],
        )?;
        Ok(())
    }

    fn find_current_by_parent(
        &self,
        kind: RecordKind,
        parent_uuid: &str,
    ) -> StoreResult<Vec<PriceListDetail>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT uuid, kind, parent_uuid, pricelist, price_overrule, audit_user_id,
                    version, validity_from, validity_to
             FROM pricelist_details
             WHERE kind = ?1 AND parent_uuid = ?2 AND validity_to IS NULL
             ORDER BY pricelist",
        )?;
        let details = stmt
            .query_map(params![kind.as_str(), parent_uuid], detail_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(details)
    }

    fn close_history(&self, detail: &PriceListDetail, at: DateTime<Utc>) -> StoreResult<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE pricelist_details SET validity_to = ?1
             WHERE uuid = ?2 AND version = ?3 AND validity_to IS NULL",
            params![at.to_rfc3339(), detail.uuid, detail.validity.version],
        )?;

        if changed == 0 {
            warn!(uuid = %detail.uuid, "price list detail vanished before close");
            return Err(StoreError::MissingVersion {
                uuid: detail.uuid.clone(),
                version: detail.validity.version,
            });
        }
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
