//! Certificate feature extraction
//!
//! Turns a record into the fixed six-slot vector the isolation forest trains
//! and scores on. Slot order is part of the model contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::record::CertificateRecord;

/// Number of slots in a feature vector.
pub const FEATURE_DIMENSION: usize = 6;

/// Certificate feature vector
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CertificateFeatures {
    /// Issuer name length
    pub issuer_length: f64,
    /// External certificate id length, 0 when absent
    pub external_id_length: f64,
    /// Hours since upload, recomputed on every extraction
    pub hours_since_upload: f64,
    /// Subject identifier (NIN) length, 0 when absent
    pub subject_length: f64,
    /// Program length, 0 when absent
    pub program_length: f64,
    /// Ordinal grade: A=4, B=3, C=2, other=1, absent or empty=0
    pub grade_ordinal: f64,
}

impl CertificateFeatures {
    /// 转换为向量
    pub fn to_vector(&self) -> Vec<f64> {
        vec![
            self.issuer_length,
            self.external_id_length,
            self.hours_since_upload,
            self.subject_length,
            self.program_length,
            self.grade_ordinal,
        ]
    }

    /// from向量创建
    pub fn from_vector(vec: &[f64]) -> Option<Self> {
        if vec.len() != FEATURE_DIMENSION {
            return None;
        }

        Some(Self {
            issuer_length: vec[0],
            external_id_length: vec[1],
            hours_since_upload: vec[2],
            subject_length: vec[3],
            program_length: vec[4],
            grade_ordinal: vec[5],
        })
    }

    /// 特征维度
    pub fn dimension() -> usize {
        FEATURE_DIMENSION
    }

    /// Slot names in vector order, for explanations.
    pub fn names() -> [&'static str; FEATURE_DIMENSION] {
        [
            "Issuer Length",
            "Certificate Id Length",
            "Hours Since Upload",
            "Subject Id Length",
            "Program Length",
            "Grade",
        ]
    }
}

/// Stateless extractor; never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureExtractor;

impl FeatureExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract against the current wall clock.
    pub fn extract(&self, record: &CertificateRecord) -> CertificateFeatures {
        self.extract_at(record, Utc::now())
    }

    /// Extract against an explicit `now`. Upload times in the future count as 0 hours.
    pub fn extract_at(&self, record: &CertificateRecord, now: DateTime<Utc>) -> CertificateFeatures {
        let elapsed_ms = (now - record.upload_timestamp).num_milliseconds().max(0);

        CertificateFeatures {
            issuer_length: text_length(Some(&record.issuer)),
            external_id_length: text_length(record.external_certificate_id.as_deref()),
            hours_since_upload: elapsed_ms as f64 / 3_600_000.0,
            subject_length: text_length(record.subject_identifier.as_deref()),
            program_length: text_length(record.program.as_deref()),
            grade_ordinal: grade_ordinal(record.grade.as_deref()),
        }
    }
}

fn text_length(value: Option<&str>) -> f64 {
    value.map(|s| s.chars().count() as f64).unwrap_or(0.0)
}

/// Letter grade ordinal. Matching is case-insensitive on the trimmed value.
pub fn grade_ordinal(grade: Option<&str>) -> f64 {
    let Some(grade) = grade.map(str::trim).filter(|g| !g.is_empty()) else {
        return 0.0;
    };
    match grade.to_ascii_uppercase().as_str() {
        "A" => 4.0,
        "B" => 3.0,
        "C" => 2.0,
        _ => 1.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::CertificateSubmission;
    use chrono::Duration;

    fn record_at(uploaded: DateTime<Utc>) -> CertificateRecord {
        CertificateRecord::new(
            CertificateSubmission::new("ABC University")
                .with_external_id("X1")
                .with_subject("12345678901")
                .with_program("Computer Science")
                .with_grade("B"),
            "/uploads/a.pdf",
            "AB12CD34",
            uploaded,
        )
    }

    #[test]
    fn test_feature_order() {
        let now = Utc::now();
        let r = record_at(now - Duration::hours(3));
        let v = FeatureExtractor::new().extract_at(&r, now).to_vector();
        assert_eq!(v, vec![14.0, 2.0, 3.0, 11.0, 16.0, 3.0]);
    }

    #[test]
    fn test_absent_fields_default_to_zero() {
        let now = Utc::now();
        let r = CertificateRecord::new(CertificateSubmission::new("X"), "/f", "AB12CD34", now);
        let f = FeatureExtractor::new().extract_at(&r, now);
        assert_eq!(f.external_id_length, 0.0);
        assert_eq!(f.subject_length, 0.0);
        assert_eq!(f.program_length, 0.0);
        assert_eq!(f.grade_ordinal, 0.0);
        assert_eq!(f.hours_since_upload, 0.0);
    }

    #[test]
    fn test_grade_ordinal_mapping() {
        assert_eq!(grade_ordinal(Some("A")), 4.0);
        assert_eq!(grade_ordinal(Some("b")), 3.0);
        assert_eq!(grade_ordinal(Some("C")), 2.0);
        assert_eq!(grade_ordinal(Some("Distinction")), 1.0);
        assert_eq!(grade_ordinal(Some("")), 0.0);
        assert_eq!(grade_ordinal(None), 0.0);
    }

    #[test]
    fn test_elapsed_hours_is_non_decreasing() {
        let now = Utc::now();
        let r = record_at(now);
        let extractor = FeatureExtractor::new();
        let first = extractor.extract_at(&r, now + Duration::minutes(30));
        let second = extractor.extract_at(&r, now + Duration::minutes(90));
        assert!(second.hours_since_upload >= first.hours_since_upload);
        assert_eq!(first.issuer_length, second.issuer_length);
        assert_eq!(first.grade_ordinal, second.grade_ordinal);
    }

    #[test]
    fn test_vector_roundtrip_rejects_wrong_length() {
        assert!(CertificateFeatures::from_vector(&[1.0; 5]).is_none());
        let f = CertificateFeatures::from_vector(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(f.grade_ordinal, 6.0);
    }
}
