// End-to-end flows against both backends

use std::sync::Arc;

use chrono::{DateTime, Utc};
use medical_registry::{
    Item, ItemData, MedicalError, MedicalRecord, PriceListDetail, PriceListDetailStore,
    PriceListRegistry, RecordKind, RecordService, RecordStore, Registry, Service, ServiceData,
    SignalBus, SqliteStore, StoreResult, UserContext,
};

fn sqlite_items() -> (RecordService<Item>, SqliteStore) {
    let store = SqliteStore::open_in_memory().unwrap();
    let service = RecordService::new(
        UserContext::new("tester", 9),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    );
    (service, store)
}

fn memory_items() -> (RecordService<Item>, PriceListRegistry) {
    let details = PriceListRegistry::new();
    let service = RecordService::new(
        UserContext::new("tester", 9),
        Arc::new(Registry::<Item>::new()),
        Arc::new(details.clone()),
    );
    (service, details)
}

fn aspirin() -> ItemData {
    ItemData {
        code: Some("A1".to_string()),
        name: Some("Aspirin".to_string()),
        price: Some(5.0),
        ..Default::default()
    }
}

/// create -> update -> duplicate -> delete, same expectations on any store
fn run_item_lifecycle(service: &RecordService<Item>, details: &dyn PriceListDetailStore) {
    // create
    let created = service.create_or_update(aspirin()).unwrap();
    assert_eq!(created.price, Some(5.0));
    assert_eq!(created.audit_user_id, 9);

    // a second "A1" is refused
    let duplicate = service.create_or_update(aspirin());
    assert!(matches!(
        duplicate,
        Err(MedicalError::CodeAlreadyExists { kind: RecordKind::Item, .. })
    ));

    // update with only a price: everything else becomes null
    let updated = service
        .create_or_update(ItemData {
            uuid: Some(created.uuid.clone()),
            price: Some(7.0),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(updated.price, Some(7.0));
    assert!(updated.name.is_none());
    assert!(updated.code.is_none());

    // the code is free again once no current version holds it
    let other = service.create_or_update(aspirin()).unwrap();
    assert_ne!(other.uuid, created.uuid);

    // two price-list rows, then cascade delete
    for list in ["Default", "Hospital"] {
        details
            .create(&PriceListDetail::new(RecordKind::Item, &updated.uuid, list, None, 9))
            .unwrap();
    }
    assert!(service.mark_deleted(&updated).is_empty());

    assert!(service.find(&updated.uuid).unwrap().is_none());
    assert!(details
        .find_current_by_parent(RecordKind::Item, &updated.uuid)
        .unwrap()
        .is_empty());

    let history = service.history(&updated.uuid).unwrap();
    assert_eq!(history.len(), 2);
    assert!(history.iter().all(|v| !v.is_current()));

    let current = service.current().unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].uuid, other.uuid);
}

#[test]
fn test_item_lifecycle_in_memory() {
    let (service, details) = memory_items();
    run_item_lifecycle(&service, &details);
}

#[test]
fn test_item_lifecycle_sqlite() {
    let (service, store) = sqlite_items();
    run_item_lifecycle(&service, &store);
}

#[test]
fn test_sqlite_records_audit_events_through_signals() {
    let store = SqliteStore::open_in_memory().unwrap();
    let signals = SignalBus::new();
    signals.connect_after(RecordKind::Service.signal_name(), store.event_listener());

    let services: RecordService<Service> = RecordService::new(
        UserContext::new("tester", 11),
        Arc::new(store.clone()),
        Arc::new(store.clone()),
    )
    .with_signals(signals);

    let created = services
        .create_or_update(ServiceData {
            code: Some("S1".to_string()),
            name: Some("X-ray".to_string()),
            ..Default::default()
        })
        .unwrap();
    services
        .create_or_update(ServiceData {
            uuid: Some(created.uuid.clone()),
            code: Some("S1".to_string()),
            name: Some("Chest X-ray".to_string()),
            ..Default::default()
        })
        .unwrap();

    // a refused write leaves no event behind
    let refused = services.create_or_update(ServiceData {
        code: Some("S1".to_string()),
        ..Default::default()
    });
    assert!(refused.is_err());

    let events = store.events_for("service", &created.uuid).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events
        .iter()
        .all(|e| e.event_type == "medication_service.create_or_update" && e.actor == "11"));

    let mut versions: Vec<i64> = events
        .iter()
        .map(|e| e.data["version"].as_i64().unwrap())
        .collect();
    versions.sort();
    assert_eq!(versions, vec![1, 2]);
}

#[test]
fn test_items_and_services_codes_are_independent() {
    let store = SqliteStore::open_in_memory().unwrap();
    let user = UserContext::new("tester", 1);
    let items: RecordService<Item> =
        RecordService::new(user.clone(), Arc::new(store.clone()), Arc::new(store.clone()));
    let services: RecordService<Service> =
        RecordService::new(user, Arc::new(store.clone()), Arc::new(store.clone()));

    items.create_or_update(aspirin()).unwrap();
    let service = services
        .create_or_update(ServiceData {
            code: Some("A1".to_string()),
            ..Default::default()
        })
        .unwrap();

    assert_eq!(service.code(), Some("A1"));
}

#[test]
fn test_batch_delete_reports_each_failure() {
    let (service, _) = sqlite_items();
    let a1 = service.create_or_update(aspirin()).unwrap();

    let failures = service.delete_by_uuids(&[
        "missing-1".to_string(),
        a1.uuid.clone(),
        "missing-2".to_string(),
    ]);

    let titles: Vec<&str> = failures.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(titles, vec!["missing-1", "missing-2"]);
    assert!(service.find(&a1.uuid).unwrap().is_none());
}

/// SQLite store whose code lookup always misses, as if another writer
/// committed the same code between check and write
struct LateCodeStore(SqliteStore);

impl RecordStore<Item> for LateCodeStore {
    fn create(&self, record: &Item) -> StoreResult<()> {
        RecordStore::<Item>::create(&self.0, record)
    }
    fn find_current_by_uuid(&self, uuid: &str) -> StoreResult<Option<Item>> {
        RecordStore::<Item>::find_current_by_uuid(&self.0, uuid)
    }
    fn has_history(&self, uuid: &str) -> StoreResult<bool> {
        RecordStore::<Item>::has_history(&self.0, uuid)
    }
    fn exists_current_by_code(&self, _code: &str) -> StoreResult<bool> {
        Ok(false)
    }
    fn save(&self, record: &Item) -> StoreResult<()> {
        RecordStore::<Item>::save(&self.0, record)
    }
    fn close_history(&self, record: &Item, at: DateTime<Utc>) -> StoreResult<()> {
        RecordStore::<Item>::close_history(&self.0, record, at)
    }
    fn replace_version(&self, previous: &Item, next: &Item, at: DateTime<Utc>) -> StoreResult<()> {
        RecordStore::<Item>::replace_version(&self.0, previous, next, at)
    }
    fn history(&self, uuid: &str) -> StoreResult<Vec<Item>> {
        RecordStore::<Item>::history(&self.0, uuid)
    }
    fn all_current(&self) -> StoreResult<Vec<Item>> {
        RecordStore::<Item>::all_current(&self.0)
    }
}

#[test]
fn test_sqlite_refused_update_writes_nothing() {
    let store = SqliteStore::open_in_memory().unwrap();
    let service: RecordService<Item> = RecordService::new(
        UserContext::new("tester", 9),
        Arc::new(LateCodeStore(store.clone())),
        Arc::new(store.clone()),
    );
    service.create_or_update(aspirin()).unwrap();
    let b2 = service
        .create_or_update(ItemData {
            code: Some("B2".to_string()),
            ..Default::default()
        })
        .unwrap();

    let result = service.create_or_update(ItemData {
        uuid: Some(b2.uuid.clone()),
        code: Some("A1".to_string()),
        ..Default::default()
    });

    assert!(matches!(
        result,
        Err(MedicalError::CodeAlreadyExists { kind: RecordKind::Item, .. })
    ));
    assert_eq!(service.find(&b2.uuid).unwrap(), Some(b2.clone()));
    assert_eq!(service.history(&b2.uuid).unwrap().len(), 1);

    let retried = service
        .create_or_update(ItemData {
            uuid: Some(b2.uuid.clone()),
            code: Some("B3".to_string()),
            ..Default::default()
        })
        .unwrap();
    assert_eq!(retried.version(), 2);
}

#[test]
fn test_sqlite_delete_from_stale_snapshot_keeps_live_version() {
    let (service, _) = sqlite_items();
    let v1 = service.create_or_update(aspirin()).unwrap();
    let mut data = aspirin();
    data.uuid = Some(v1.uuid.clone());
    data.price = Some(6.0);
    let v2 = service.create_or_update(data).unwrap();
    let v1_closed_at = service.history(&v1.uuid).unwrap()[0].validity.validity_to;

    let failures = service.mark_deleted(&v1);

    assert_eq!(failures.len(), 1);
    assert_eq!(service.find(&v1.uuid).unwrap(), Some(v2));
    assert_eq!(
        service.history(&v1.uuid).unwrap()[0].validity.validity_to,
        v1_closed_at
    );
}
