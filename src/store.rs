// 🗄️ Persistence ports
// The record services only orchestrate transitions; storage lives behind
// these traits. Two backends ship with the crate:
// - registry.rs: in-memory, append-only version lists
// - db.rs: SQLite (rusqlite)

use chrono::{DateTime, Utc};

use crate::entities::{MedicalRecord, PriceListDetail, RecordKind};
use crate::error::StoreResult;

/// Versioned storage for one record kind.
///
/// Rows are keyed by `(uuid, version)`. Implementations must refuse a write
/// that would leave two current rows sharing a code
/// (`StoreError::UniqueViolation`); the service-level code check is only an
/// early fail.
pub trait RecordStore<R: MedicalRecord>: Send + Sync {
    /// Insert version 1 of a new identity
    fn create(&self, record: &R) -> StoreResult<()>;

    fn find_current_by_uuid(&self, uuid: &str) -> StoreResult<Option<R>>;

    /// Whether any version (current or historical) exists for `uuid`
    fn has_history(&self, uuid: &str) -> StoreResult<bool>;

    fn exists_current_by_code(&self, code: &str) -> StoreResult<bool>;

    /// Persist `record` as the row `(uuid, version)`, inserting or replacing it
    fn save(&self, record: &R) -> StoreResult<()>;

    /// Mark the live row `(uuid, version)` of `record` as history at `at`.
    ///
    /// Fails with `StoreError::MissingVersion` when that row is not stored or
    /// is already historical.
    fn close_history(&self, record: &R, at: DateTime<Utc>) -> StoreResult<()>;

    /// Close the live `previous` and store `next` as one write: if `next` is
    /// refused, `previous` stays live.
    fn replace_version(&self, previous: &R, next: &R, at: DateTime<Utc>) -> StoreResult<()>;

    /// Every version of `uuid`, oldest first
    fn history(&self, uuid: &str) -> StoreResult<Vec<R>>;

    /// Current version of every live identity, ordered by code
    fn all_current(&self) -> StoreResult<Vec<R>>;
}

/// Storage for price-list rows hanging off items and services
pub trait PriceListDetailStore: Send + Sync {
    fn create(&self, detail: &PriceListDetail) -> StoreResult<()>;

    fn find_current_by_parent(
        &self,
        kind: RecordKind,
        parent_uuid: &str,
    ) -> StoreResult<Vec<PriceListDetail>>;

    fn close_history(&self, detail: &PriceListDetail, at: DateTime<Utc>) -> StoreResult<()>;
}
