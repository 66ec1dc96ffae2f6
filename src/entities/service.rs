// 🩺 Medical Service Entity
//
// Same lifecycle as Item, different value set (category, level, maximum amount).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{new_uuid, MedicalRecord, RecordKind};
use crate::temporal::Validity;

// ============================================================================
// SERVICE ENTITY
// ============================================================================

/// One version of a medical service (consultation, surgery, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub uuid: String,

    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,

    #[serde(rename = "type")]
    pub service_type: Option<String>,

    pub level: Option<String>,
    pub price: Option<f64>,
    pub care_type: Option<String>,
    pub patient_category: Option<i64>,
    pub frequency: Option<i64>,
    pub maximum_amount: Option<f64>,

    pub audit_user_id: i64,

    #[serde(flatten)]
    pub validity: Validity,
}

/// Complete field set for creating or updating a service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "type")]
    pub service_type: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub care_type: Option<String>,
    #[serde(default)]
    pub patient_category: Option<i64>,
    #[serde(default)]
    pub frequency: Option<i64>,
    #[serde(default)]
    pub maximum_amount: Option<f64>,
}

impl MedicalRecord for Service {
    type Data = ServiceData;

    const KIND: RecordKind = RecordKind::Service;

    fn create(data: ServiceData, audit_user_id: i64, at: DateTime<Utc>) -> Self {
        let mut service = Service {
            uuid: new_uuid(),
            code: None,
            name: None,
            category: None,
            service_type: None,
            level: None,
            price: None,
            care_type: None,
            patient_category: None,
            frequency: None,
            maximum_amount: None,
            audit_user_id,
            validity: Validity::new(at),
        };
        service.apply(data);
        service
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
        self.category = None;
        self.service_type = None;
        self.name = None;
        self.level = None;
        self.patient_category = None;
        self.price = None;
        self.frequency = None;
        self.maximum_amount = None;
        self.care_type = None;
    }

    fn apply(&mut self, data: ServiceData) {
        let ServiceData {
            uuid: _,
            code,
            name,
            category,
            service_type,
            level,
            price,
            care_type,
            patient_category,
            frequency,
            maximum_amount,
        } = data;

        self.code = code;
        self.name = name;
        self.category = category;
        self.service_type = service_type;
        self.level = level;
        self.price = price;
        self.care_type = care_type;
        self.patient_category = patient_category;
        self.frequency = frequency;
        self.maximum_amount = maximum_amount;
    }

    fn to_data(&self) -> ServiceData {
        ServiceData {
            uuid: None,
            code: self.code.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            service_type: self.service_type.clone(),
            level: self.level.clone(),
            price: self.price,
            care_type: self.care_type.clone(),
            patient_category: self.patient_category,
            frequency: self.frequency,
            maximum_amount: self.maximum_amount,
        }
    }

    fn take_uuid(data: &mut ServiceData) -> Option<String> {
        data.uuid.take()
    }

    fn data_code(data: &ServiceData) -> Option<&str> {
        data.code.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn consultation() -> ServiceData {
        ServiceData {
            code: Some("C01".to_string()),
            name: Some("General consultation".to_string()),
            category: Some("C".to_string()),
            level: Some("S".to_string()),
            price: Some(12.0),
            maximum_amount: Some(50.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_service_creation() {
        let service = Service::create(consultation(), 7, Utc::now());

        assert_eq!(service.code(), Some("C01"));
        assert_eq!(service.maximum_amount, Some(50.0));
        assert_eq!(service.audit_user_id, 7);
        assert!(service.is_current());
    }

    #[test]
    fn test_service_reset_then_apply_replaces_values() {
        let mut service = Service::create(consultation(), 7, Utc::now());

        service.reset_before_update();
        service.apply(ServiceData {
            price: Some(15.0),
            ..Default::default()
        });

        assert_eq!(service.price, Some(15.0));
        assert!(service.code.is_none());
        assert!(service.name.is_none());
        assert!(service.maximum_amount.is_none());
    }

    #[test]
    fn test_service_serializes_flat_validity() {
        let service = Service::create(consultation(), 7, Utc::now());
        let json = serde_json::to_value(&service).unwrap();

        assert_eq!(json["version"], 1);
        assert!(json["validity_to"].is_null());
        assert_eq!(json["type"], serde_json::Value::Null);
    }
}
