// 💊 Medical Item Entity
//
// "Item code/name/price are VALUES (can change), Item uuid is IDENTITY (never changes)"

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_uuid, MedicalRecord, RecordKind};
use crate::temporal::Validity;

// ============================================================================
// ITEM ENTITY
// ============================================================================

/// One version of a medical item (drug or consumable)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    // ========================================================================
    // IDENTITY (never changes)
    // ========================================================================
    pub uuid: String,

    // ========================================================================
    // VALUES (replaced wholesale on every update)
    // ========================================================================
    pub code: Option<String>,
    pub name: Option<String>,

    #[serde(rename = "type")]
    pub item_type: Option<String>,

    pub price: Option<f64>,
    pub care_type: Option<String>,
    pub patient_category: Option<i64>,
    pub package: Option<String>,
    pub quantity: Option<f64>,
    pub frequency: Option<i64>,

    // ========================================================================
    // VERSIONING
    // ========================================================================
    pub audit_user_id: i64,

    #[serde(flatten)]
    pub validity: Validity,
}

/// Complete field set for creating or updating an item.
///
/// With `uuid` set it updates that item; without it a new item is created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ItemData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub item_type: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub care_type: Option<String>,
    #[serde(default)]
    pub patient_category: Option<i64>,
    #[serde(default)]
    pub package: Option<String>,
    #[serde(default)]
    pub quantity: Option<f64>,
    #[serde(default)]
    pub frequency: Option<i64>,
}

impl MedicalRecord for Item {
    type Data = ItemData;

    const KIND: RecordKind = RecordKind::Item;

    fn create(data: ItemData, audit_user_id: i64, at: DateTime<Utc>) -> Self {
        let mut item = Item {
            uuid: new_uuid(),
            code: None,
            name: None,
            item_type: None,
            price: None,
            care_type: None,
            patient_category: None,
            package: None,
            quantity: None,
            frequency: None,
            audit_user_id,
            validity: Validity::new(at),
        };
        item.apply(data);
        item
    }

    fn uuid(&self) -> &str {
        &self.uuid
    }

    fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    fn validity(&self) -> &Validity {
        &self.validity
    }

    fn validity_mut(&mut self) -> &mut Validity {
        &mut self.validity
    }

    fn audit_user_id(&self) -> i64 {
        self.audit_user_id
    }

    fn set_audit_user_id(&mut self, audit_user_id: i64) {
        self.audit_user_id = audit_user_id;
    }

    fn reset_before_update(&mut self) {
        self.code = None;
        self.name = None;
        self.item_type = None;
        self.price = None;
        self.care_type = None;
        self.patient_category = None;
        self.package = None;
        self.quantity = None;
        self.frequency = None;
    }

    fn apply(&mut self, data: ItemData) {
        // uuid is identity, never assigned from incoming data
        let ItemData {
            uuid: _,
            code,
            name,
            item_type,
            price,
            care_type,
            patient_category,
            package,
            quantity,
            frequency,
        } = data;

        self.code = code;
        self.name = name;
        self.item_type = item_type;
        self.price = price;
        self.care_type = care_type;
        self.patient_category = patient_category;
        self.package = package;
        self.quantity = quantity;
        self.frequency = frequency;
    }

    fn to_data(&self) -> ItemData {
        ItemData {
            uuid: None,
            code: self.code.clone(),
            name: self.name.clone(),
            item_type: self.item_type.clone(),
            price: self.price,
            care_type: self.care_type.clone(),
            patient_category: self.patient_category,
            package: self.package.clone(),
            quantity: self.quantity,
            frequency: self.frequency,
        }
    }

    fn take_uuid(data: &mut ItemData) -> Option<String> {
        data.uuid.take()
    }

    fn data_code(data: &ItemData) -> Option<&str> {
        data.code.as_deref()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn aspirin() -> ItemData {
        ItemData {
            code: Some("A1".to_string()),
            name: Some("Aspirin".to_string()),
            item_type: Some("D".to_string()),
            price: Some(5.0),
            package: Some("Box of 20".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_item_creation() {
        let item = Item::create(aspirin(), 42, Utc::now());

        assert!(!item.uuid.is_empty());
        assert_eq!(item.code(), Some("A1"));
        assert_eq!(item.price, Some(5.0));
        assert_eq!(item.audit_user_id, 42);
        assert_eq!(item.version(), 1);
        assert!(item.is_current());
    }

    #[test]
    fn test_item_creation_ignores_incoming_uuid() {
        let mut data = aspirin();
        data.uuid = Some("not-used".to_string());

        let item = Item::create(data, 1, Utc::now());

        assert_ne!(item.uuid, "not-used");
    }

    #[test]
    fn test_reset_clears_every_business_field() {
        let mut item = Item::create(aspirin(), 1, Utc::now());
        let uuid = item.uuid.clone();

        item.reset_before_update();

        assert_eq!(item.to_data(), ItemData::default());
        assert_eq!(item.uuid, uuid);
        assert_eq!(item.version(), 1);
    }

    #[test]
    fn test_to_data_round_trips_fields() {
        let item = Item::create(aspirin(), 1, Utc::now());

        assert_eq!(item.to_data(), aspirin());
    }

    #[test]
    fn test_item_data_from_json_map() {
        let data: ItemData = serde_json::from_value(serde_json::json!({
            "uuid": "u1",
            "code": "A1",
            "type": "D",
            "price": 7.5
        }))
        .unwrap();

        assert_eq!(data.uuid.as_deref(), Some("u1"));
        assert_eq!(data.item_type.as_deref(), Some("D"));
        assert_eq!(data.price, Some(7.5));
        assert!(data.name.is_none());

        let unknown = serde_json::from_value::<ItemData>(serde_json::json!({"colour": "red"}));
        assert!(unknown.is_err());
    }
}
