// ⚠️ Error types
// Storage failures are enumerated so callers (and the delete cascade) can
// match on them instead of catching everything.

use thiserror::Error;

use crate::entities::RecordKind;

/// Failures reported by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A current row already holds this value in a unique column.
    #[error("unique constraint violated on {table}.{column}: {value}")]
    UniqueViolation {
        table: &'static str,
        column: &'static str,
        value: String,
    },

    /// The version to close is not stored, or is no longer current.
    #[error("no current version {version} stored for {uuid}")]
    MissingVersion { uuid: String, version: i64 },

    #[error("store lock poisoned")]
    Poisoned,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors surfaced by the record services.
#[derive(Debug, Error)]
pub enum MedicalError {
    /// Another current record of the same kind already uses the code.
    #[error("{} code {code} already exists", .kind.plural_label())]
    CodeAlreadyExists { kind: RecordKind, code: String },

    /// The uuid has stored versions but none of them is current (deleted record).
    #[error("{} {uuid} has no current version", .kind.as_str())]
    NotCurrent { kind: RecordKind, uuid: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type MedicalResult<T> = Result<T, MedicalError>;
