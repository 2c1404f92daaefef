//! In-memory record set and store.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::{CertificateStore, StorageError, StorageResult};
use crate::core::record::CertificateRecord;

/// Ordered record collection with the store's uniqueness rules.
///
/// This is also the persisted document shape of [`super::JsonFileStore`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecordSet {
    #[serde(default)]
    pub certificates: Vec<CertificateRecord>,
}

impl RecordSet {
    pub fn new(certificates: Vec<CertificateRecord>) -> Self {
        Self { certificates }
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    pub fn find_by_code(&self, code: &str) -> Option<&CertificateRecord> {
        self.certificates
            .iter()
            .find(|r| r.codes.current() == code)
            .or_else(|| {
                self.certificates
                    .iter()
                    .find(|r| r.codes.grace_open() && r.codes.previous() == Some(code))
            })
    }

    pub fn find_by_id(&self, id: &str) -> Option<&CertificateRecord> {
        self.certificates.iter().find(|r| r.id == id)
    }

    pub fn find_by_external_id(&self, external_id: &str) -> Option<&CertificateRecord> {
        let wanted = external_id.trim();
        self.certificates
            .iter()
            .find(|r| r.claims_external_id(wanted))
            .or_else(|| self.certificates.iter().find(|r| r.unique_external_id() == Some(wanted)))
    }

    pub fn active_code_in_use(&self, code: &str) -> bool {
        self.certificates.iter().any(|r| r.codes.current() == code)
    }

    /// Check every insert rule, then push.
    pub fn append(&mut self, record: CertificateRecord) -> StorageResult<()> {
        if self.find_by_id(&record.id).is_some() {
            return Err(StorageError::DuplicateId(record.id));
        }
        if let Some(external_id) = record.unique_external_id() {
            if self.certificates.iter().any(|r| r.claims_external_id(external_id)) {
                return Err(StorageError::DuplicateExternalId(external_id.to_string()));
            }
        }
        if self.active_code_in_use(record.codes.current()) {
            return Err(StorageError::CodeCollision(record.codes.current().to_string()));
        }
        self.certificates.push(record);
        Ok(())
    }

    pub fn replace(&mut self, record: CertificateRecord) -> StorageResult<()> {
        let slot = self
            .certificates
            .iter_mut()
            .find(|r| r.id == record.id)
            .ok_or_else(|| StorageError::NotFound(record.id.clone()))?;
        *slot = record;
        Ok(())
    }
}

/// Volatile store; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<RecordSet>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<CertificateRecord>) -> Self {
        Self {
            records: RwLock::new(RecordSet::new(records)),
        }
    }
}

impl CertificateStore for MemoryStore {
    fn find_by_active_or_previous_code(&self, code: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_code(code).cloned())
    }

    fn find_by_id(&self, id: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_id(id).cloned())
    }

    fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<CertificateRecord>> {
        Ok(self.records.read().find_by_external_id(external_id).cloned())
    }

    fn append(&self, record: CertificateRecord) -> StorageResult<()> {
        self.records.write().append(record)
    }

    fn update_in_place(&self, record: CertificateRecord) -> StorageResult<()> {
        self.records.write().replace(record)
    }

    fn all_records(&self) -> StorageResult<Vec<CertificateRecord>> {
        Ok(self.records.read().certificates.clone())
    }

    fn count(&self) -> StorageResult<usize> {
        Ok(self.records.read().len())
    }

    fn active_code_in_use(&self, code: &str) -> StorageResult<bool> {
        Ok(self.records.read().active_code_in_use(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::CertificateSubmission;
    use chrono::Utc;

    fn record(external_id: &str, code: &str) -> CertificateRecord {
        CertificateRecord::new(
            CertificateSubmission::new("ABC University").with_external_id(external_id),
            "/uploads/f.pdf",
            code,
            Utc::now(),
        )
    }

    #[test]
    fn test_append_and_lookup() {
        let store = MemoryStore::new();
        let r = record("X1", "AB12CD34");
        store.append(r.clone()).unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.find_by_id(&r.id).unwrap(), Some(r.clone()));
        assert_eq!(store.find_by_active_or_previous_code("AB12CD34").unwrap(), Some(r.clone()));
        assert_eq!(store.find_by_external_id("X1").unwrap(), Some(r));
        assert!(store.find_by_active_or_previous_code("FFFFFFFF").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_external_id_leaves_store_unchanged() {
        let store = MemoryStore::new();
        store.append(record("X1", "AAAAAAAA")).unwrap();
        let err = store.append(record("X1", "BBBBBBBB")).unwrap_err();
        assert!(matches!(err, StorageError::DuplicateExternalId(ref id) if id == "X1"));
        assert_eq!(store.count().unwrap(), 1);
        assert!(!store.active_code_in_use("BBBBBBBB").unwrap());
    }

    #[test]
    fn test_revoked_record_frees_external_id() {
        let store = MemoryStore::new();
        let mut first = record("X1", "AAAAAAAA");
        first.is_revoked = true;
        store.append(first).unwrap();
        assert!(store.append(record("X1", "BBBBBBBB")).is_ok());
        assert_eq!(store.count().unwrap(), 2);
        assert!(!store.find_by_external_id("X1").unwrap().unwrap().is_revoked);
    }

    #[test]
    fn test_active_code_collision_rejected() {
        let store = MemoryStore::new();
        store.append(record("X1", "AAAAAAAA")).unwrap();
        let err = store.append(record("X2", "AAAAAAAA")).unwrap_err();
        assert!(matches!(err, StorageError::CodeCollision(_)));
    }

    #[test]
    fn test_update_in_place() {
        let store = MemoryStore::new();
        let mut r = record("X1", "AAAAAAAA");
        store.append(r.clone()).unwrap();

        r.codes.rotate("BBBBBBBB".to_string());
        r.is_verified = true;
        store.update_in_place(r.clone()).unwrap();

        let found = store.find_by_active_or_previous_code("AAAAAAAA").unwrap().unwrap();
        assert_eq!(found.verification_code(), "BBBBBBBB");
        assert!(found.is_verified);

        let missing = record("X9", "CCCCCCCC");
        assert!(matches!(store.update_in_place(missing), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_live_code_match_wins_over_retired() {
        let mut older = record("X1", "AAAAAAAA");
        older.codes.rotate("BBBBBBBB".to_string());
        let newer = record("X2", "CCCCCCCC");
        let mut set = RecordSet::new(vec![older.clone(), newer]);
        // a later record drew the retired value as its live code
        let mut third = record("X3", "DDDDDDDD");
        third.codes = crate::core::record::CodeRing::new("AAAAAAAA");
        set.certificates.push(third.clone());

        assert_eq!(set.find_by_code("AAAAAAAA").unwrap().id, third.id);
        assert_eq!(set.find_by_code("BBBBBBBB").unwrap().id, older.id);
    }

    #[test]
    fn test_feature_vectors_cover_all_records() {
        let store = MemoryStore::with_records(vec![record("X1", "AAAAAAAA"), record("X2", "BBBBBBBB")]);
        let vectors = store
            .all_feature_vectors(&crate::anomaly_detection::FeatureExtractor::new())
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!(vectors.iter().all(|v| v.len() == 6));
    }
}
