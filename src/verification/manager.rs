//! Match-and-rotate verification protocol.
//!
//! A live code is single-use: the first lookup with it marks the record
//! verified and installs a fresh code. The retired code then answers exactly
//! one follow-up lookup (the grace window) without further mutation. Codes
//! older than that never match again.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::codes::CodeGenerator;
use crate::core::errors::{PortalError, Result};
use crate::core::record::{CertificateRecord, CodeMatch};
use crate::storage::CertificateStore;

/// Result of a successful lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    /// The code the caller typed.
    pub original_code: String,
    pub matched: CodeMatch,
    /// Whether this lookup rotated the record's code.
    pub rotated: bool,
    /// Record state after the lookup.
    pub record: CertificateRecord,
}

pub struct VerificationManager {
    generator: Arc<dyn CodeGenerator>,
    max_attempts: usize,
}

impl VerificationManager {
    pub fn new(generator: Arc<dyn CodeGenerator>, max_attempts: usize) -> Self {
        Self {
            generator,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Draw a code no record currently holds as its live code.
    pub fn issue_code(&self, store: &dyn CertificateStore) -> Result<String> {
        for attempt in 1..=self.max_attempts {
            let code = self.generator.generate();
            if !store.active_code_in_use(&code)? {
                return Ok(code);
            }
            warn!("Verification code collision on attempt {}, redrawing", attempt);
        }
        Err(PortalError::Storage(format!(
            "Could not allocate a unique verification code after {} attempts",
            self.max_attempts
        )))
    }

    /// Apply the protocol to `record` in memory.
    ///
    /// Fails with the generic not-found error when `code` matches neither
    /// the live code nor an open grace window; `record` is then untouched.
    pub fn apply(
        &self,
        store: &dyn CertificateStore,
        record: &mut CertificateRecord,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<VerificationOutcome> {
        let matched = record.codes.classify(code).ok_or_else(PortalError::invalid_code)?;

        let rotated = match matched {
            CodeMatch::Current => {
                let next = self.issue_code(store)?;
                record.codes.rotate(next);
                record.is_verified = true;
                record.verification_count += 1;
                record.last_verified_at = Some(now);
                true
            }
            CodeMatch::Previous => {
                record.codes.close_grace();
                false
            }
        };

        Ok(VerificationOutcome {
            original_code: code.to_string(),
            matched,
            rotated,
            record: record.clone(),
        })
    }

    /// Look `code` up in `store`, apply the protocol and write the record back.
    pub fn verify(&self, store: &dyn CertificateStore, code: &str) -> Result<VerificationOutcome> {
        let code = code.trim();
        let Some(mut record) = store.find_by_active_or_previous_code(code)? else {
            debug!("Verification lookup missed");
            return Err(PortalError::invalid_code());
        };

        let outcome = self.apply(store, &mut record, code, Utc::now())?;
        store.update_in_place(record)?;

        match outcome.matched {
            CodeMatch::Current => info!("🔑 Certificate {} verified, code rotated", outcome.record.id),
            CodeMatch::Previous => info!("Certificate {} resolved via retired code", outcome.record.id),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::CertificateSubmission;
    use crate::storage::MemoryStore;
    use crate::verification::codes::ScriptedCodeGenerator;

    fn setup(codes: &[&str]) -> (MemoryStore, VerificationManager, CertificateRecord) {
        let store = MemoryStore::new();
        let record = CertificateRecord::new(
            CertificateSubmission::new("ABC University").with_external_id("X1"),
            "/uploads/x1.pdf",
            "AB12CD34",
            Utc::now(),
        );
        store.append(record.clone()).unwrap();
        let generator = Arc::new(ScriptedCodeGenerator::new(codes.iter().copied()));
        (store, VerificationManager::new(generator, 4), record)
    }

    #[test]
    fn test_first_use_rotates() {
        let (store, manager, record) = setup(&["11111111"]);
        let outcome = manager.verify(&store, "AB12CD34").unwrap();

        assert_eq!(outcome.matched, CodeMatch::Current);
        assert!(outcome.rotated);
        assert_eq!(outcome.original_code, "AB12CD34");
        assert_eq!(outcome.record.id, record.id);
        assert!(outcome.record.is_verified);
        assert_eq!(outcome.record.verification_code(), "11111111");
        assert_eq!(outcome.record.previous_verification_code(), Some("AB12CD34"));
        assert_eq!(store.find_by_id(&record.id).unwrap().unwrap(), outcome.record);
    }

    #[test]
    fn test_grace_window_is_single_use() {
        let (store, manager, record) = setup(&["11111111"]);
        manager.verify(&store, "AB12CD34").unwrap();

        let second = manager.verify(&store, "AB12CD34").unwrap();
        assert_eq!(second.matched, CodeMatch::Previous);
        assert!(!second.rotated);
        assert_eq!(second.record.id, record.id);
        assert_eq!(second.record.verification_code(), "11111111");
        assert_eq!(second.record.previous_verification_code(), Some("AB12CD34"));
        assert_eq!(second.record.verification_count, 1);

        let third = manager.verify(&store, "AB12CD34").unwrap_err();
        assert!(matches!(third, PortalError::NotFound(_)));
    }

    #[test]
    fn test_two_generation_old_code_fails() {
        let (store, manager, _) = setup(&["11111111", "22222222"]);
        manager.verify(&store, "AB12CD34").unwrap();
        manager.verify(&store, "11111111").unwrap();
        assert!(manager.verify(&store, "AB12CD34").is_err());
        assert!(manager.verify(&store, "11111111").is_ok());
    }

    #[test]
    fn test_unknown_code_mutates_nothing() {
        let (store, manager, record) = setup(&[]);
        let err = manager.verify(&store, "DEADBEEF").unwrap_err();
        assert_eq!(err.to_string(), PortalError::invalid_code().to_string());
        assert_eq!(store.find_by_id(&record.id).unwrap().unwrap(), record);
    }

    #[test]
    fn test_issue_code_skips_live_codes() {
        let (store, manager, _) = setup(&["AB12CD34", "AB12CD34", "33333333"]);
        assert_eq!(manager.issue_code(&store).unwrap(), "33333333");
    }

    #[test]
    fn test_issue_code_gives_up() {
        let (store, _, _) = setup(&[]);
        let generator = Arc::new(ScriptedCodeGenerator::new(["AB12CD34", "AB12CD34"]));
        let manager = VerificationManager::new(generator, 2);
        assert!(matches!(manager.issue_code(&store), Err(PortalError::Storage(_))));
    }

    #[test]
    fn test_verified_flag_survives_rotation_chain() {
        let (store, manager, record) = setup(&["11111111", "22222222", "33333333"]);
        let mut code = "AB12CD34".to_string();
        for _ in 0..3 {
            let outcome = manager.verify(&store, &code).unwrap();
            assert!(outcome.record.is_verified);
            code = outcome.record.verification_code().to_string();
        }
        let stored = store.find_by_id(&record.id).unwrap().unwrap();
        assert!(stored.is_verified);
        assert_eq!(stored.verification_count, 3);
    }
}
