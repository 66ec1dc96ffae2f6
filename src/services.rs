// 🏥 Record services
// Create, update and soft-delete of medical items and services.
//
// Update = close the current version + open the next one with the COMPLETE
// incoming field set: anything the caller leaves out becomes null.
// Delete = close the current version + close every current price-list row.

use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::entities::MedicalRecord;
use crate::error::{MedicalError, MedicalResult, StoreError};
use crate::i18n::{Catalog, Translator};
use crate::signals::{Outcome, Phase, Signal, SignalBus};
use crate::store::{PriceListDetailStore, RecordStore};

// ============================================================================
// CALLER CONTEXT
// ============================================================================

/// The user on whose behalf a mutation runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserContext {
    pub username: String,

    /// Stamped onto every version this user writes
    pub audit_user_id: i64,
}

impl UserContext {
    pub fn new(username: &str, audit_user_id: i64) -> Self {
        UserContext {
            username: username.to_string(),
            audit_user_id,
        }
    }
}

// ============================================================================
// DELETE FAILURES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureDetail {
    /// Localized, user-facing
    pub message: String,

    /// Raw cause, for logs and support
    pub detail: String,
}

/// Structured error returned (not raised) by the delete path, so a batch
/// delete can report every failure at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeleteFailure {
    /// uuid of the record that could not be deleted
    pub title: String,
    pub list: Vec<FailureDetail>,
}

impl DeleteFailure {
    fn new(uuid: &str, message: String, detail: String) -> Self {
        DeleteFailure {
            title: uuid.to_string(),
            list: vec![FailureDetail { message, detail }],
        }
    }
}

// ============================================================================
// RECORD SERVICE
// ============================================================================

/// Versioned upsert / soft-delete for one record kind (`Item` or `Service`)
pub struct RecordService<R: MedicalRecord> {
    user: UserContext,
    store: Arc<dyn RecordStore<R>>,
    details: Arc<dyn PriceListDetailStore>,
    signals: SignalBus,
    translator: Arc<dyn Translator>,
}

impl<R: MedicalRecord> RecordService<R> {
    pub fn new(
        user: UserContext,
        store: Arc<dyn RecordStore<R>>,
        details: Arc<dyn PriceListDetailStore>,
    ) -> Self {
        RecordService {
            user,
            store,
            details,
            signals: SignalBus::new(),
            translator: Arc::new(Catalog::english()),
        }
    }

    /// Share a signal bus with other services
    pub fn with_signals(mut self, signals: SignalBus) -> Self {
        self.signals = signals;
        self
    }

    pub fn with_translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn user(&self) -> &UserContext {
        &self.user
    }

    pub fn signals(&self) -> &SignalBus {
        &self.signals
    }

    // ========================================================================
    // CREATE OR UPDATE
    // ========================================================================

    /// Create a record, or version an existing one when `data` carries a uuid.
    ///
    /// Listeners of `R::KIND.signal_name()` are notified before and after.
    pub fn create_or_update(&self, mut data: R::Data) -> MedicalResult<R> {
        let payload = serde_json::to_value(&data).unwrap_or(serde_json::Value::Null);

        self.signals.emit(&self.signal(Phase::Before, payload.clone(), None));

        let uuid = R::take_uuid(&mut data);
        let result = self.upsert(uuid, data);

        let outcome = match &result {
            Ok(record) => Outcome::Saved {
                uuid: record.uuid().to_string(),
                version: record.version(),
            },
            Err(err) => Outcome::Failed {
                error: err.to_string(),
            },
        };
        self.signals.emit(&self.signal(Phase::After, payload, Some(outcome)));

        result
    }

    fn signal(&self, phase: Phase, data: serde_json::Value, outcome: Option<Outcome>) -> Signal {
        Signal {
            name: R::KIND.signal_name(),
            phase,
            kind: R::KIND,
            audit_user_id: self.user.audit_user_id,
            data,
            outcome,
        }
    }

    fn upsert(&self, uuid: Option<String>, data: R::Data) -> MedicalResult<R> {
        let current = match uuid.as_deref() {
            Some(uuid) => self.store.find_current_by_uuid(uuid)?,
            None => None,
        };

        // Only a changed code can collide; an unchanged one is the record's own
        if let Some(code) = R::data_code(&data) {
            let unchanged = current.as_ref().and_then(|r| r.code()) == Some(code);
            if !unchanged {
                self.check_unique_code(code)?;
            }
        }

        match (uuid, current) {
            (_, Some(record)) => self.update(record, data),
            (Some(uuid), None) if self.store.has_history(&uuid)? => Err(MedicalError::NotCurrent {
                kind: R::KIND,
                uuid,
            }),
            (uuid, None) => {
                if let Some(unknown) = uuid {
                    debug!(kind = %R::KIND, uuid = %unknown, "unknown uuid, creating a new record");
                }
                self.create(data)
            }
        }
    }

    fn create(&self, data: R::Data) -> MedicalResult<R> {
        let record = R::create(data, self.user.audit_user_id, Utc::now());
        self.store
            .create(&record)
            .map_err(|e| self.map_write_error(e))?;

        info!(
            kind = %R::KIND,
            uuid = record.uuid(),
            code = record.code().unwrap_or_default(),
            user = %self.user.username,
            "created"
        );
        Ok(record)
    }

    fn update(&self, current: R, data: R::Data) -> MedicalResult<R> {
        let now = Utc::now();

        // each update is complete: reset first so omitted fields end up null
        let mut record = current.clone();
        record.open_next_version(now);
        record.reset_before_update();
        record.apply(data);
        record.set_audit_user_id(self.user.audit_user_id);

        self.store
            .replace_version(&current, &record, now)
            .map_err(|e| self.map_write_error(e))?;
        debug!(kind = %R::KIND, uuid = current.uuid(), version = current.version(), "closed history");

        info!(
            kind = %R::KIND,
            uuid = record.uuid(),
            version = record.version(),
            user = %self.user.username,
            "updated"
        );
        Ok(record)
    }

    /// A unique-code refusal from storage means a concurrent writer won the race
    fn map_write_error(&self, err: StoreError) -> MedicalError {
        match err {
            StoreError::UniqueViolation {
                column: "code",
                value,
                ..
            } => MedicalError::CodeAlreadyExists {
                kind: R::KIND,
                code: value,
            },
            other => MedicalError::Store(other),
        }
    }

    /// Fail if a current record of this kind already uses `code`
    pub fn check_unique_code(&self, code: &str) -> MedicalResult<()> {
        debug!(kind = %R::KIND, code, "checking code uniqueness");
        if self.store.exists_current_by_code(code)? {
            return Err(MedicalError::CodeAlreadyExists {
                kind: R::KIND,
                code: code.to_string(),
            });
        }
        Ok(())
    }

    // ========================================================================
    // SOFT DELETE
    // ========================================================================

    /// Close `record` and cascade onto its current price-list rows.
    ///
    /// Returns an empty list on success. A storage failure is reported as one
    /// `DeleteFailure`; already-closed rows are not reopened.
    pub fn mark_deleted(&self, record: &R) -> Vec<DeleteFailure> {
        match self.cascade_delete(record) {
            Ok(closed_details) => {
                info!(
                    kind = %R::KIND,
                    uuid = record.uuid(),
                    closed_details,
                    user = %self.user.username,
                    "deleted"
                );
                Vec::new()
            }
            Err(err) => {
                warn!(kind = %R::KIND, uuid = record.uuid(), error = %err, "delete failed");
                let key = format!("medical.mutation.failed_to_delete_{}", R::KIND.as_str());
                let message = self.translator.translate(&key, &[("uuid", record.uuid())]);
                vec![DeleteFailure::new(record.uuid(), message, err.to_string())]
            }
        }
    }

    fn cascade_delete(&self, record: &R) -> Result<usize, StoreError> {
        let now = Utc::now();
        self.store.close_history(record, now)?;

        let details = self
            .details
            .find_current_by_parent(R::KIND, record.uuid())?;
        for detail in &details {
            self.details.close_history(detail, now)?;
        }
        Ok(details.len())
    }

    /// Delete every uuid, collecting one failure per record that could not be deleted
    pub fn delete_by_uuids(&self, uuids: &[String]) -> Vec<DeleteFailure> {
        let mut failures = Vec::new();

        for uuid in uuids {
            match self.store.find_current_by_uuid(uuid) {
                Ok(Some(record)) => failures.extend(self.mark_deleted(&record)),
                Ok(None) => {
                    let key = format!("medical.mutation.{}_not_found", R::KIND.as_str());
                    let message = self.translator.translate(&key, &[("uuid", uuid)]);
                    failures.push(DeleteFailure::new(uuid, message, uuid.clone()));
                }
                Err(err) => {
                    let key = format!("medical.mutation.failed_to_delete_{}", R::KIND.as_str());
                    let message = self.translator.translate(&key, &[("uuid", uuid)]);
                    failures.push(DeleteFailure::new(uuid, message, err.to_string()));
                }
            }
        }

        failures
    }

    // ========================================================================
    // READS
    // ========================================================================

    pub fn find(&self, uuid: &str) -> MedicalResult<Option<R>> {
        Ok(self.store.find_current_by_uuid(uuid)?)
    }

    /// Every version of `uuid`, oldest first
    pub fn history(&self, uuid: &str) -> MedicalResult<Vec<R>> {
        Ok(self.store.history(uuid)?)
    }

    /// Current version of every live record
    pub fn current(&self) -> MedicalResult<Vec<R>> {
        Ok(self.store.all_current()?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
