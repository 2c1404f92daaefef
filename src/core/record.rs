//! Certificate record model.
//!
//! The persisted shape uses camelCase keys so the store file stays readable by
//! the dashboard front-end.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Which slot of a [`CodeRing`] an input code matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeMatch {
    /// The live code. Matching it rotates the ring.
    Current,
    /// The code retired by the most recent rotation, still inside its grace window.
    Previous,
}

/// Two-slot code history: the live code plus the one most recently retired.
///
/// Anything older than one rotation is dropped. The retired code answers one
/// follow-up lookup, after which `grace_used` closes it without changing the
/// stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeRing {
    #[serde(rename = "verificationCode")]
    current: String,
    #[serde(rename = "previousVerificationCode", default)]
    previous: Option<String>,
    #[serde(rename = "previousCodeGraceUsed", default)]
    grace_used: bool,
}

impl CodeRing {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            current: code.into(),
            previous: None,
            grace_used: false,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn previous(&self) -> Option<&str> {
        self.previous.as_deref()
    }

    pub fn grace_open(&self) -> bool {
        self.previous.is_some() && !self.grace_used
    }

    /// Classify `code` against the ring without mutating it.
    pub fn classify(&self, code: &str) -> Option<CodeMatch> {
        if code == self.current {
            Some(CodeMatch::Current)
        } else if self.grace_open() && self.previous.as_deref() == Some(code) {
            Some(CodeMatch::Previous)
        } else {
            None
        }
    }

    /// Whether `code` would resolve this record right now.
    pub fn resolves(&self, code: &str) -> bool {
        self.classify(code).is_some()
    }

    /// Install `next` as the live code and return the code it replaced.
    pub fn rotate(&mut self, next: String) -> String {
        let retired = std::mem::replace(&mut self.current, next);
        self.previous = Some(retired.clone());
        self.grace_used = false;
        retired
    }

    pub fn close_grace(&mut self) {
        self.grace_used = true;
    }
}

/// A public misuse report filed against a certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateReport {
    pub id: String,
    pub reason: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence_ref: Option<String>,
    pub reported_at: DateTime<Utc>,
}

/// Descriptive fields supplied on upload.
///
/// `None` means "not provided" and is distinct from `Some("")`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSubmission {
    #[serde(default)]
    pub issuer: String,
    #[serde(default, alias = "nin")]
    pub subject_identifier: Option<String>,
    #[serde(default, alias = "certificateId")]
    pub external_certificate_id: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default, alias = "name")]
    pub student_name: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub issue_date: Option<NaiveDate>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub expiry_date: Option<NaiveDate>,
}

/// Date inputs post `""` when left empty.
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(s) if !s.trim().is_empty() => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

impl CertificateSubmission {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            ..Self::default()
        }
    }

    pub fn with_subject(mut self, nin: impl Into<String>) -> Self {
        self.subject_identifier = Some(nin.into());
        self
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_certificate_id = Some(id.into());
        self
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn with_grade(mut self, grade: impl Into<String>) -> Self {
        self.grade = Some(grade.into());
        self
    }

    pub fn with_student_name(mut self, name: impl Into<String>) -> Self {
        self.student_name = Some(name.into());
        self
    }

    pub fn with_dates(mut self, issued: NaiveDate, expires: NaiveDate) -> Self {
        self.issue_date = Some(issued);
        self.expiry_date = Some(expires);
        self
    }
}

/// A stored certificate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateRecord {
    pub id: String,
    pub issuer: String,
    #[serde(default)]
    pub subject_identifier: Option<String>,
    #[serde(default)]
    pub external_certificate_id: Option<String>,
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub grade: Option<String>,
    #[serde(default)]
    pub student_name: Option<String>,
    #[serde(default)]
    pub issue_date: Option<NaiveDate>,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    pub upload_timestamp: DateTime<Utc>,
    pub file_path: String,
    #[serde(flatten)]
    pub codes: CodeRing,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub verification_count: u64,
    #[serde(default)]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_revoked: bool,
    #[serde(default)]
    pub revocation_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub anomaly_score: f64,
    #[serde(default)]
    pub is_anomalous: bool,
    /// False when the record was stored before the detector had enough data.
    #[serde(default)]
    pub anomaly_scored: bool,
    #[serde(default)]
    pub reports: Vec<CertificateReport>,
}

impl CertificateRecord {
    /// Build a fresh record in the Created state.
    pub fn new(
        submission: CertificateSubmission,
        file_path: impl Into<String>,
        code: impl Into<String>,
        uploaded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("cert-{}", Uuid::new_v4()),
            issuer: submission.issuer,
            subject_identifier: submission.subject_identifier,
            external_certificate_id: submission.external_certificate_id,
            program: submission.program,
            grade: submission.grade,
            student_name: submission.student_name,
            issue_date: submission.issue_date,
            expiry_date: submission.expiry_date,
            upload_timestamp: uploaded_at,
            file_path: file_path.into(),
            codes: CodeRing::new(code),
            is_verified: false,
            verification_count: 0,
            last_verified_at: None,
            is_revoked: false,
            revocation_date: None,
            anomaly_score: 0.0,
            is_anomalous: false,
            anomaly_scored: false,
            reports: Vec::new(),
        }
    }

    pub fn verification_code(&self) -> &str {
        self.codes.current()
    }

    pub fn previous_verification_code(&self) -> Option<&str> {
        self.codes.previous()
    }

    /// External id as it takes part in uniqueness checks; blank ids never collide.
    pub fn unique_external_id(&self) -> Option<&str> {
        self.external_certificate_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }

    /// Whether this record blocks another record from using `external_id`.
    pub fn claims_external_id(&self, external_id: &str) -> bool {
        !self.is_revoked && self.unique_external_id() == Some(external_id.trim())
    }

    pub fn is_held_by(&self, nin: &str) -> bool {
        self.subject_identifier.as_deref().map(str::trim) == Some(nin.trim())
    }
}
