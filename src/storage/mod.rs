//! Certificate store facade.
//!
//! The portal core only needs lookup by code and id, append, whole-record
//! replace and a full scan for retraining. Backends hold the full record set
//! in memory; [`JsonFileStore`] additionally rewrites one JSON file on every
//! mutation.

use thiserror::Error;

use crate::anomaly_detection::FeatureExtractor;
use crate::core::record::CertificateRecord;

mod json_file;
mod memory;

pub use json_file::JsonFileStore;
pub use memory::{MemoryStore, RecordSet};

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Duplicate external certificate id: {0}")]
    DuplicateExternalId(String),

    #[error("Verification code already active on another record")]
    CodeCollision(String),

    #[error("Duplicate record id: {0}")]
    DuplicateId(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Corrupt store: {0}")]
    Corrupt(String),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Persistence contract used by the verification manager and the portal.
pub trait CertificateStore: Send + Sync {
    /// Record whose live code is `code`, else one whose retired code is
    /// `code` with its grace window still open.
    fn find_by_active_or_previous_code(&self, code: &str) -> StorageResult<Option<CertificateRecord>>;

    fn find_by_id(&self, id: &str) -> StorageResult<Option<CertificateRecord>>;

    /// Non-revoked record claiming `external_id`, falling back to any record with it.
    fn find_by_external_id(&self, external_id: &str) -> StorageResult<Option<CertificateRecord>>;

    /// Insert a new record. Fails without mutating on an external id held by a
    /// non-revoked record, a live code already in use, or a reused id.
    fn append(&self, record: CertificateRecord) -> StorageResult<()>;

    /// Replace the record with the same id. Last writer wins.
    fn update_in_place(&self, record: CertificateRecord) -> StorageResult<()>;

    fn all_records(&self) -> StorageResult<Vec<CertificateRecord>>;

    fn count(&self) -> StorageResult<usize>;

    /// Whether any record currently holds `code` as its live code.
    fn active_code_in_use(&self, code: &str) -> StorageResult<bool>;

    /// Feature vectors of every record, extracted now.
    fn all_feature_vectors(&self, extractor: &FeatureExtractor) -> StorageResult<Vec<Vec<f64>>> {
        let now = chrono::Utc::now();
        Ok(self
            .all_records()?
            .iter()
            .map(|r| extractor.extract_at(r, now).to_vector())
            .collect())
    }
}
