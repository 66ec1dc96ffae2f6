// Entity Models
// Medical items and medical services are two versioned, coded records that
// share one lifecycle: create, update (close + reopen), soft-delete.
//
// Each record has:
// - Stable identity (uuid) that never changes across versions
// - A business code unique among current records of its kind
// - A validity window (see temporal.rs)

pub mod item;
pub mod pricelist;
pub mod service;

pub use item::{Item, ItemData};
pub use pricelist::PriceListDetail;
pub use service::{Service, ServiceData};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::temporal::Validity;

// ============================================================================
// RECORD KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Item,
    Service,
}

impl RecordKind {
    /// Label used in message keys and stored rows ("item" / "service")
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Item => "item",
            RecordKind::Service => "service",
        }
    }

    /// Label used in user-facing uniqueness errors
    pub fn plural_label(&self) -> &'static str {
        match self {
            RecordKind::Item => "Items",
            RecordKind::Service => "Services",
        }
    }

    /// Name of the signal fired around create-or-update
    pub fn signal_name(&self) -> &'static str {
        match self {
            RecordKind::Item => "medication_item.create_or_update",
            RecordKind::Service => "medication_service.create_or_update",
        }
    }

    pub fn parse(s: &str) -> Option<RecordKind> {
        match s {
            "item" => Some(RecordKind::Item),
            "service" => Some(RecordKind::Service),
            _ => None,
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// MEDICAL RECORD CAPABILITY
// ============================================================================

/// A versioned record with a business code and a fixed set of mutable fields.
///
/// `Data` is the complete set of settable business fields. An update applies
/// every field of `Data`, so a field left as `None` ends up null on the new
/// version.
pub trait MedicalRecord: Clone + fmt::Debug + Send + Sync + 'static {
    type Data: Clone + fmt::Debug + Serialize + Send + Sync;

    const KIND: RecordKind;

    /// Build version 1 of a brand new identity
    fn create(data: Self::Data, audit_user_id: i64, at: DateTime<Utc>) -> Self;

    fn uuid(&self) -> &str;
    fn code(&self) -> Option<&str>;
    fn validity(&self) -> &Validity;
    fn validity_mut(&mut self) -> &mut Validity;
    fn audit_user_id(&self) -> i64;
    fn set_audit_user_id(&mut self, audit_user_id: i64);

    /// Null every mutable business field
    fn reset_before_update(&mut self);

    /// Assign every field of `data` onto this record
    fn apply(&mut self, data: Self::Data);

    /// Business fields of this version, without uuid
    fn to_data(&self) -> Self::Data;

    /// Remove and return the uuid carried by an incoming field set
    fn take_uuid(data: &mut Self::Data) -> Option<String>;

    fn data_code(data: &Self::Data) -> Option<&str>;

    fn version(&self) -> i64 {
        self.validity().version
    }

    fn is_current(&self) -> bool {
        self.validity().is_current()
    }

    /// Mark this version as history
    fn close(&mut self, at: DateTime<Utc>) {
        self.validity_mut().close(at);
    }

    /// Turn this in-memory copy into the next current version
    fn open_next_version(&mut self, at: DateTime<Utc>) {
        let next = self.validity().next(at);
        *self.validity_mut() = next;
    }
}

pub(crate) fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
