// 🧾 Price List Detail
// A row of a price list pointing at one item or service. It lives and dies
// with its parent: soft-deleting the parent closes every current detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_uuid, RecordKind};
use crate::temporal::Validity;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceListDetail {
    pub uuid: String,

    /// Kind of the parent record
    pub kind: RecordKind,

    /// uuid of the parent item/service
    pub parent_uuid: String,

    /// Name of the price list this row belongs to
    pub pricelist: String,

    /// Price replacing the parent's price within this list
    pub price_overrule: Option<f64>,

    pub audit_user_id: i64,

    #[serde(flatten)]
    pub validity: Validity,
}

impl PriceListDetail {
    pub fn new(
        kind: RecordKind,
        parent_uuid: &str,
        pricelist: &str,
        price_overrule: Option<f64>,
        audit_user_id: i64,
    ) -> Self {
        PriceListDetail {
            uuid: new_uuid(),
            kind,
            parent_uuid: parent_uuid.to_string(),
            pricelist: pricelist.to_string(),
            price_overrule,
            audit_user_id,
            validity: Validity::new(Utc::now()),
        }
    }

    pub fn is_current(&self) -> bool {
        self.validity.is_current()
    }

    pub fn close(&mut self, at: DateTime<Utc>) {
        self.validity.close(at);
    }

    /// Whether this row hangs off the given parent
    pub fn belongs_to(&self, kind: RecordKind, parent_uuid: &str) -> bool {
        self.kind == kind && self.parent_uuid == parent_uuid
    }
}
