// 📚 In-memory registries
// Multi-version storage: every version is kept, nothing is ever removed.
// Closing history only sets `validity_to` on the stored copy.

use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::entities::{MedicalRecord, PriceListDetail, RecordKind};
use crate::error::{StoreError, StoreResult};
use crate::store::{PriceListDetailStore, RecordStore};

// ============================================================================
// RECORD REGISTRY
// ============================================================================

/// ALL versions of all records of one kind (append-only)
pub struct Registry<R> {
    versions: Arc<RwLock<Vec<R>>>,
}

impl<R> Clone for Registry<R> {
    fn clone(&self) -> Self {
        Registry {
            versions: Arc::clone(&self.versions),
        }
    }
}

impl<R: MedicalRecord> Registry<R> {
    pub fn new() -> Self {
        Registry {
            versions: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Count stored versions (current and historical)
    pub fn version_count(&self) -> StoreResult<usize> {
        Ok(self.read()?.len())
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Vec<R>>> {
        self.versions.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Vec<R>>> {
        self.versions.write().map_err(|_| StoreError::Poisoned)
    }

    /// Index of the live stored row `(uuid, version)` of `record`
    fn position_of_current(versions: &[R], record: &R) -> StoreResult<usize> {
        versions
            .iter()
            .position(|r| {
                r.uuid() == record.uuid() && r.version() == record.version() && r.is_current()
            })
            .ok_or_else(|| StoreError::MissingVersion {
                uuid: record.uuid().to_string(),
                version: record.version(),
            })
    }

    /// Refuse `record` if another current identity already holds its code
    fn check_code(versions: &[R], record: &R) -> StoreResult<()> {
        let Some(code) = record.code() else {
            return Ok(());
        };
        if !record.is_current() {
            return Ok(());
        }

        let taken = versions
            .iter()
            .any(|r| r.is_current() && r.uuid() != record.uuid() && r.code() == Some(code));
        if taken {
            return Err(StoreError::UniqueViolation {
                table: table_name(R::KIND),
                column: "code",
                value: code.to_string(),
            });
        }
        Ok(())
    }
}

impl<R: MedicalRecord> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: MedicalRecord> RecordStore<R> for Registry<R> {
    fn create(&self, record: &R) -> StoreResult<()> {
        let mut versions = self.write()?;

        if versions.iter().any(|r| r.uuid() == record.uuid()) {
            return Err(StoreError::UniqueViolation {
                table: table_name(R::KIND),
                column: "uuid",
                value: record.uuid().to_string(),
            });
        }
        Self::check_code(&versions, record)?;

        versions.push(record.clone());
        Ok(())
    }

    fn find_current_by_uuid(&self, uuid: &str) -> StoreResult<Option<R>> {
        let versions = self.read()?;
        Ok(versions
            .iter()
            .find(|r| r.uuid() == uuid && r.is_current())
            .cloned())
    }

    fn has_history(&self, uuid: &str) -> StoreResult<bool> {
        Ok(self.read()?.iter().any(|r| r.uuid() == uuid))
    }

    fn exists_current_by_code(&self, code: &str) -> StoreResult<bool> {
        Ok(self
            .read()?
            .iter()
            .any(|r| r.is_current() && r.code() == Some(code)))
    }

    fn save(&self, record: &R) -> StoreResult<()> {
        let mut versions = self.write()?;
        Self::check_code(&versions, record)?;

        if record.is_current()
            && versions.iter().any(|r| {
                r.uuid() == record.uuid() && r.is_current() && r.version() != record.version()
            })
        {
            return Err(StoreError::UniqueViolation {
                table: table_name(R::KIND),
                column: "uuid",
                value: record.uuid().to_string(),
            });
        }

        match versions
            .iter_mut()
            .find(|r| r.uuid() == record.uuid() && r.version() == record.version())
        {
            Some(stored) => *stored = record.clone(),
            None => versions.push(record.clone()),
        }
        Ok(())
    }

    fn close_history(&self, record: &R, at: DateTime<Utc>) -> StoreResult<()> {
        let mut versions = self.write()?;
        let index = Self::position_of_current(&versions, record)?;
        versions[index].close(at);
        Ok(())
    }

    fn replace_version(&self, previous: &R, next: &R, at: DateTime<Utc>) -> StoreResult<()> {
        // everything is checked before the single write lock mutates anything
        let mut versions = self.write()?;
        let index = Self::position_of_current(&versions, previous)?;
        Self::check_code(&versions, next)?;

        versions[index].close(at);
        versions.push(next.clone());
        Ok(())
    }

    fn history(&self, uuid: &str) -> StoreResult<Vec<R>> {
        let mut history: Vec<R> = self
            .read()?
            .iter()
            .filter(|r| r.uuid() == uuid)
            .cloned()
            .collect();
        history.sort_by_key(|r| r.version());
        Ok(history)
    }

    fn all_current(&self) -> StoreResult<Vec<R>> {
        let mut current: Vec<R> = self
            .read()?
            .iter()
            .filter(|r| r.is_current())
            .cloned()
            .collect();
        current.sort_by(|a, b| a.code().cmp(&b.code()).then(a.uuid().cmp(b.uuid())));
        Ok(current)
    }
}

fn table_name(kind: RecordKind) -> &'static str {
    match kind {
        RecordKind::Item => "items",
        RecordKind::Service => "services",
    }
}

// ============================================================================
// PRICE LIST REGISTRY
// ============================================================================

#[derive(Clone, Default)]
pub struct PriceListRegistry {
    details: Arc<RwLock<Vec<PriceListDetail>>>,
}

impl PriceListRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored detail row, for inspection
    pub fn all(&self) -> StoreResult<Vec<PriceListDetail>> {
        Ok(self
            .details
            .read()
            .map_err(|_| StoreError::Poisoned)?
            .clone())
    }
}

impl PriceListDetailStore for PriceListRegistry {
    fn create(&self, detail: &PriceListDetail) -> StoreResult<()> {
        let mut details = self.details.write().map_err(|_| StoreError::Poisoned)?;
        details.push(detail.clone());
        Ok(())
    }

    fn find_current_by_parent(
        &self,
        kind: RecordKind,
        parent_uuid: &str,
    ) -> StoreResult<Vec<PriceListDetail>> {
        let details = self.details.read().map_err(|_| StoreError::Poisoned)?;
        Ok(details
            .iter()
            .filter(|d| d.is_current() && d.belongs_to(kind, parent_uuid))
            .cloned()
            .collect())
    }

    fn close_history(&self, detail: &PriceListDetail, at: DateTime<Utc>) -> StoreResult<()> {
        let mut details = self.details.write().map_err(|_| StoreError::Poisoned)?;
        let stored = details
            .iter_mut()
            .find(|d| {
                d.uuid == detail.uuid && d.validity.version == detail.validity.version && d.is_current()
            })
            .ok_or_else(|| StoreError::MissingVersion {
                uuid: detail.uuid.clone(),
                version: detail.validity.version,
            })?;

        stored.close(at);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================
