//! Certificate portal service.
//!
//! `CertificatePortal` owns the store handle, the anomaly detector and the
//! verification manager, and is the only entry point the HTTP layer and the
//! CLI use. Every mutation runs under one write gate, so a verification of a
//! record never interleaves with another write and retraining never reads a
//! record set that is being appended to.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::analytics::{self, AnalyticsSummary};
use super::insights::{self, CertificateAnalysis};
use crate::anomaly_detection::{AnomalyDetector, AnomalyResult, DetectorStatus, RiskLevel};
use crate::core::caller::{Caller, Role};
use crate::core::config::{PortalConfig, StorageBackendKind};
use crate::core::errors::{PortalError, Result};
use crate::core::record::{CertificateRecord, CertificateReport, CertificateSubmission, CodeRing};
use crate::storage::{CertificateStore, JsonFileStore, MemoryStore, StorageError};
use crate::verification::{CodeGenerator, RandomCodeGenerator, VerificationManager, VerificationOutcome};

/// Result of an accepted upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionOutcome {
    pub record: CertificateRecord,
    pub anomaly: AnomalyResult,
}

/// One flagged record in the anomaly report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedCertificate {
    pub id: String,
    pub issuer: String,
    pub external_certificate_id: Option<String>,
    pub student_name: Option<String>,
    pub anomaly_score: f64,
    pub risk_level: RiskLevel,
    pub upload_timestamp: DateTime<Utc>,
    pub is_revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyReport {
    pub anomalous_count: usize,
    pub total_count: usize,
    pub anomaly_rate: f64,
    /// Highest score first.
    pub flagged: Vec<FlaggedCertificate>,
    pub detector_status: DetectorStatus,
    pub last_trained_at: Option<DateTime<Utc>>,
}

/// Per-row result of a bulk upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRowOutcome {
    /// Zero-based position in the upload.
    pub row: usize,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verification_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anomaly: Option<AnomalyResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub accepted: usize,
    pub rejected: usize,
    pub rows: Vec<BatchRowOutcome>,
}

impl BatchOutcome {
    fn push(&mut self, row: usize, stored: Result<SubmissionOutcome>) {
        let entry = match stored {
            Ok(SubmissionOutcome { record, anomaly }) => {
                self.accepted += 1;
                BatchRowOutcome {
                    row,
                    accepted: true,
                    certificate_id: Some(record.id.clone()),
                    verification_code: Some(record.verification_code().to_string()),
                    anomaly: Some(anomaly),
                    error: None,
                    error_code: None,
                }
            }
            Err(e) => {
                self.rejected += 1;
                let message = if e.is_client_error() {
                    e.to_string()
                } else {
                    warn!("Bulk upload row {} failed: {}", row, e);
                    "Row could not be stored".to_string()
                };
                BatchRowOutcome {
                    row,
                    accepted: false,
                    certificate_id: None,
                    verification_code: None,
                    anomaly: None,
                    error: Some(message),
                    error_code: Some(e.code().to_string()),
                }
            }
        };
        self.rows.push(entry);
    }
}

pub struct CertificatePortal {
    config: PortalConfig,
    store: Arc<dyn CertificateStore>,
    detector: AnomalyDetector,
    verification: VerificationManager,
    write_gate: Mutex<()>,
}

impl CertificatePortal {
    /// Portal over `store` with OS-random codes.
    pub fn new(config: PortalConfig, store: Arc<dyn CertificateStore>) -> Result<Self> {
        let detector = AnomalyDetector::new(config.detector.clone());
        Self::with_components(config, store, detector, Arc::new(RandomCodeGenerator::new()))
    }

    /// Portal with an injected detector and code source.
    pub fn with_components(
        config: PortalConfig,
        store: Arc<dyn CertificateStore>,
        detector: AnomalyDetector,
        generator: Arc<dyn CodeGenerator>,
    ) -> Result<Self> {
        config.validate()?;
        let verification = VerificationManager::new(generator, config.verification.max_code_attempts);
        let portal = Self {
            config,
            store,
            detector,
            verification,
            write_gate: Mutex::new(()),
        };

        let existing = portal.store.count()?;
        if existing >= portal.detector.config().min_training_records {
            info!("Training detector over {} existing records", existing);
            portal.retrain();
        }
        Ok(portal)
    }

    /// Open the store named by `config.storage`.
    pub fn from_config(config: PortalConfig) -> Result<Self> {
        let store: Arc<dyn CertificateStore> = match config.storage.backend {
            StorageBackendKind::Memory => Arc::new(MemoryStore::new()),
            StorageBackendKind::JsonFile => Arc::new(JsonFileStore::open(&config.storage.data_path)?),
        };
        Self::new(config, store)
    }

    /// Portal over an in-memory copy of the configured store, for read-only commands.
    ///
    /// Nothing on disk is created or rewritten; a missing store file is an error.
    pub fn snapshot(config: PortalConfig) -> Result<Self> {
        let records = match config.storage.backend {
            StorageBackendKind::Memory => Vec::new(),
            StorageBackendKind::JsonFile => JsonFileStore::read_snapshot(&config.storage.data_path)?,
        };
        Self::new(config, Arc::new(MemoryStore::with_records(records)))
    }

    pub fn config(&self) -> &PortalConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn CertificateStore> {
        &self.store
    }

    pub fn detector(&self) -> &AnomalyDetector {
        &self.detector
    }

    pub fn detector_status(&self) -> DetectorStatus {
        self.detector.status()
    }

    /// Accept an upload, score it and store it.
    pub fn submit_certificate(
        &self,
        caller: &Caller,
        mut submission: CertificateSubmission,
        file_ref: Option<&str>,
    ) -> Result<SubmissionOutcome> {
        let file_ref = self.admit(caller, &mut submission, file_ref)?;

        let _gate = self.write_gate.lock();
        let outcome = self.store_scored(submission, &file_ref)?;
        self.retrain_if_ready();
        Ok(outcome)
    }

    /// Accept many uploads at once.
    ///
    /// Rows are checked and stored one by one; a rejected row does not stop
    /// the rest. Rows are scored against the forest installed when the batch
    /// started and the detector retrains once, after the last row.
    pub fn submit_batch(
        &self,
        caller: &Caller,
        rows: Vec<(CertificateSubmission, Option<String>)>,
    ) -> Result<BatchOutcome> {
        if caller.role == Role::Student {
            return Err(PortalError::Forbidden("Institution or admin role required".to_string()));
        }
        if rows.is_empty() {
            return Err(PortalError::Validation("Bulk upload contains no certificates".to_string()));
        }

        let _gate = self.write_gate.lock();
        let mut outcome = BatchOutcome::default();
        for (row, (mut submission, file_ref)) in rows.into_iter().enumerate() {
            let stored = self
                .admit(caller, &mut submission, file_ref.as_deref())
                .and_then(|file_ref| self.store_scored(submission, &file_ref));
            outcome.push(row, stored);
        }

        if outcome.accepted > 0 {
            self.retrain_if_ready();
        }
        info!(
            "📦 Bulk upload from {}: {} accepted, {} rejected",
            caller.identity, outcome.accepted, outcome.rejected
        );
        Ok(outcome)
    }

    /// Check required fields and role rules, returning the trimmed file reference.
    fn admit(
        &self,
        caller: &Caller,
        submission: &mut CertificateSubmission,
        file_ref: Option<&str>,
    ) -> Result<String> {
        submission.issuer = submission.issuer.trim().to_string();
        if submission.issuer.is_empty() {
            return Err(PortalError::Validation("Issuer is required".to_string()));
        }
        let file_ref = file_ref
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .ok_or_else(|| PortalError::Validation("Certificate file is required".to_string()))?;

        match caller.role {
            Role::Student => match submission.subject_identifier.as_deref().map(str::trim) {
                None | Some("") => submission.subject_identifier = Some(caller.identity.clone()),
                Some(nin) if nin == caller.identity.trim() => {}
                Some(_) => {
                    return Err(PortalError::Forbidden(
                        "Students may only upload their own certificates".to_string(),
                    ))
                }
            },
            Role::Institution => {
                if !caller.is_issuer_of(&submission.issuer) {
                    return Err(PortalError::Forbidden(
                        "Institutions may only upload certificates they issued".to_string(),
                    ));
                }
            }
            Role::Admin => {}
        }
        Ok(file_ref.to_string())
    }

    /// Score and append one admitted upload. Callers hold the write gate.
    fn store_scored(&self, submission: CertificateSubmission, file_ref: &str) -> Result<SubmissionOutcome> {
        let stored_before = self.store.count()?;
        let code = self.verification.issue_code(self.store.as_ref())?;
        let mut record = CertificateRecord::new(submission, file_ref, code, Utc::now());

        let anomaly = self.detector.check_record(&record, stored_before);
        record.anomaly_score = anomaly.score;
        record.is_anomalous = anomaly.is_anomalous;
        record.anomaly_scored = anomaly.status == DetectorStatus::Active;

        self.append_with_retry(&mut record)?;
        info!(
            "📄 Certificate {} accepted from {} (anomalous={}, score={:.3})",
            record.id, record.issuer, record.is_anomalous, record.anomaly_score
        );
        Ok(SubmissionOutcome { record, anomaly })
    }

    /// Append `record`, drawing a fresh code whenever its live code collides.
    fn append_with_retry(&self, record: &mut CertificateRecord) -> Result<()> {
        let attempts = self.config.verification.max_code_attempts;
        for attempt in 1..=attempts {
            match self.store.append(record.clone()) {
                Ok(()) => return Ok(()),
                Err(StorageError::CodeCollision(_)) if attempt < attempts => {
                    warn!("Code collision on insert, redrawing (attempt {})", attempt);
                    record.codes = CodeRing::new(self.verification.issue_code(self.store.as_ref())?);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(PortalError::Storage("Could not allocate a unique verification code".to_string()))
    }

    fn retrain_if_ready(&self) {
        match self.store.count() {
            Ok(count) if count >= self.detector.config().min_training_records => self.retrain(),
            Ok(_) => {}
            Err(e) => warn!("Could not count records for retraining: {}", e),
        }
    }

    /// Retrain over every stored record. Failures keep the previous forest.
    fn retrain(&self) {
        let vectors = match self.store.all_feature_vectors(self.detector.extractor()) {
            Ok(vectors) => vectors,
            Err(e) => {
                warn!("Could not load feature vectors for retraining: {}", e);
                return;
            }
        };
        match self.detector.retrain(&vectors) {
            Ok(_) => {}
            Err(e) if e.is_expected() => debug!("Retrain skipped: {}", e),
            Err(e) => warn!("Retrain failed: {}", e),
        }
    }

    /// Resolve a code, rotating it on first use.
    pub fn verify(&self, code: &str) -> Result<VerificationOutcome> {
        let _gate = self.write_gate.lock();
        self.verification.verify(self.store.as_ref(), code)
    }

    /// Verify plus rule-based insights about the certificate.
    pub fn analyze(&self, code: &str) -> Result<CertificateAnalysis> {
        let outcome = self.verify(code)?;
        Ok(insights::analyze(outcome, Utc::now()))
    }

    /// Mark a certificate revoked. Repeating the call is a no-op.
    pub fn revoke(&self, caller: &Caller, id: &str) -> Result<CertificateRecord> {
        let _gate = self.write_gate.lock();
        let mut record = self
            .store
            .find_by_id(id)?
            .ok_or_else(|| PortalError::NotFound(format!("Certificate {}", id)))?;

        if !caller.is_admin() && !caller.is_issuer_of(&record.issuer) {
            return Err(PortalError::Forbidden(
                "Only the issuing institution or an admin may revoke".to_string(),
            ));
        }
        if record.is_revoked {
            debug!("Certificate {} already revoked", id);
            return Ok(record);
        }

        record.is_revoked = true;
        record.revocation_date = Some(Utc::now());
        self.store.update_in_place(record.clone())?;
        info!("⛔ Certificate {} revoked by {} ({})", id, caller.identity, caller.role);
        Ok(record)
    }

    /// File a public misuse report against a certificate id or external id.
    pub fn report(&self, reference: &str, reason: &str, evidence_ref: Option<&str>) -> Result<CertificateReport> {
        let reference = reference.trim();
        let reason = reason.trim();
        if reference.is_empty() {
            return Err(PortalError::Validation("Certificate reference is required".to_string()));
        }
        if reason.is_empty() {
            return Err(PortalError::Validation("Report reason is required".to_string()));
        }

        let _gate = self.write_gate.lock();
        let mut record = match self.store.find_by_id(reference)? {
            Some(record) => record,
            None => self
                .store
                .find_by_external_id(reference)?
                .ok_or_else(|| PortalError::NotFound(format!("Certificate {}", reference)))?,
        };

        let report = CertificateReport {
            id: format!("report-{}", Uuid::new_v4()),
            reason: reason.to_string(),
            evidence_ref: evidence_ref.map(str::trim).filter(|e| !e.is_empty()).map(str::to_string),
            reported_at: Utc::now(),
        };
        record.reports.push(report.clone());
        self.store.update_in_place(record.clone())?;
        warn!("🚩 Certificate {} reported: {}", record.id, report.reason);
        Ok(report)
    }

    /// Certificates held by `nin`.
    pub fn list_for_subject(&self, caller: &Caller, nin: &str) -> Result<Vec<CertificateRecord>> {
        let allowed = caller.is_admin() || (caller.role == Role::Student && caller.identity.trim() == nin.trim());
        if !allowed {
            return Err(PortalError::Forbidden(
                "Students may only list their own certificates".to_string(),
            ));
        }
        self.records_where(|r| r.is_held_by(nin))
    }

    /// Certificates issued by the calling institution.
    pub fn list_for_issuer(&self, caller: &Caller) -> Result<Vec<CertificateRecord>> {
        if caller.role != Role::Institution {
            return Err(PortalError::Forbidden("Institution role required".to_string()));
        }
        self.records_where(|r| caller.is_issuer_of(&r.issuer))
    }

    pub fn list_all(&self, caller: &Caller) -> Result<Vec<CertificateRecord>> {
        caller.require_admin()?;
        Ok(self.store.all_records()?)
    }

    fn records_where<F>(&self, keep: F) -> Result<Vec<CertificateRecord>>
    where
        F: Fn(&CertificateRecord) -> bool,
    {
        let mut records: Vec<_> = self.store.all_records()?.into_iter().filter(|r| keep(r)).collect();
        records.sort_by(|a, b| b.upload_timestamp.cmp(&a.upload_timestamp));
        Ok(records)
    }

    /// File reference for the holder, the issuer or an admin.
    ///
    /// Unknown ids and unauthorized callers get the same NotFound.
    pub fn download_reference(&self, caller: &Caller, id: &str) -> Result<String> {
        let not_found = || PortalError::NotFound("Certificate not found".to_string());
        let record = self.store.find_by_id(id)?.ok_or_else(not_found)?;
        let allowed = match caller.role {
            Role::Admin => true,
            Role::Institution => caller.is_issuer_of(&record.issuer),
            Role::Student => record.is_held_by(&caller.identity),
        };
        if !allowed {
            debug!("Download of {} refused for {}", id, caller.identity);
            return Err(not_found());
        }
        Ok(record.file_path)
    }

    pub fn anomaly_report(&self, caller: &Caller) -> Result<AnomalyReport> {
        caller.require_admin()?;
        let records = self.store.all_records()?;
        let detector = self.detector.config();

        let mut flagged: Vec<FlaggedCertificate> = records
            .iter()
            .filter(|r| r.is_anomalous)
            .map(|r| FlaggedCertificate {
                id: r.id.clone(),
                issuer: r.issuer.clone(),
                external_certificate_id: r.external_certificate_id.clone(),
                student_name: r.student_name.clone(),
                anomaly_score: r.anomaly_score,
                risk_level: RiskLevel::from_score(
                    r.anomaly_score,
                    detector.anomaly_threshold,
                    detector.high_risk_threshold,
                ),
                upload_timestamp: r.upload_timestamp,
                is_revoked: r.is_revoked,
            })
            .collect();
        flagged.sort_by(|a, b| b.anomaly_score.total_cmp(&a.anomaly_score));

        let total_count = records.len();
        let anomalous_count = flagged.len();
        Ok(AnomalyReport {
            anomalous_count,
            total_count,
            anomaly_rate: if total_count == 0 {
                0.0
            } else {
                anomalous_count as f64 / total_count as f64
            },
            flagged,
            detector_status: self.detector.status(),
            last_trained_at: self.detector.last_trained_at(),
        })
    }

    pub fn analytics_summary(&self, caller: &Caller) -> Result<AnalyticsSummary> {
        caller.require_admin()?;
        let records = self.store.all_records()?;
        Ok(analytics::summarize(&records, self.config.analytics.recent_activity_limit))
    }
}
