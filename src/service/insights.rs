//! Certificate analysis follow-up.
//!
//! Rule-based insights shown next to a verification result. Nothing here is
//! learned; the confidence value only reflects how complete the record is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::record::CertificateRecord;
use crate::verification::VerificationOutcome;

const EDUCATIONAL_TERMS: [&str; 5] = ["university", "institute", "college", "school", "academy"];
const ACADEMIC_TERMS: [&str; 6] = ["degree", "bachelor", "master", "bsc", "msc", "phd"];

/// Points per optional field; a present but empty field earns half.
const FIELD_WEIGHTS: [(&str, f64); 5] = [
    ("external certificate id", 2.0),
    ("holder identifier", 2.0),
    ("holder name", 1.0),
    ("program", 1.0),
    ("grade", 1.0),
];

/// Issue and expiry dates together; one without the other earns half.
const DATE_WEIGHT: f64 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub icon: String,
    pub title: String,
    pub description: String,
}

impl Insight {
    fn new(icon: &str, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            icon: icon.to_string(),
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Record completeness bands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrengthLevel {
    Basic,
    Standard,
    Enhanced,
    Strong,
}

impl StrengthLevel {
    pub fn from_points(points: f64) -> Self {
        if points >= 5.0 {
            StrengthLevel::Strong
        } else if points >= 3.0 {
            StrengthLevel::Enhanced
        } else if points >= 1.0 {
            StrengthLevel::Standard
        } else {
            StrengthLevel::Basic
        }
    }

    fn icon(self) -> &'static str {
        match self {
            StrengthLevel::Basic => "⚠️",
            StrengthLevel::Standard => "🔒",
            StrengthLevel::Enhanced => "🛡️",
            StrengthLevel::Strong => "💪",
        }
    }

    fn description(self) -> &'static str {
        match self {
            StrengthLevel::Basic => "basic record details only",
            StrengthLevel::Standard => "standard record details",
            StrengthLevel::Enhanced => "enhanced record details",
            StrengthLevel::Strong => "a complete record",
        }
    }
}

/// Verification result plus insights.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAnalysis {
    #[serde(flatten)]
    pub outcome: VerificationOutcome,
    pub insights: Vec<Insight>,
    /// Share of the optional-field points the record earned, in [0, 1].
    pub confidence: f64,
}

/// Completeness points and the names of the fields that earned them.
pub fn completeness(record: &CertificateRecord) -> (f64, Vec<&'static str>) {
    let fields = [
        &record.external_certificate_id,
        &record.subject_identifier,
        &record.student_name,
        &record.program,
        &record.grade,
    ];
    let mut points: f64 = 0.0;
    let mut present = Vec::new();
    for ((name, weight), value) in FIELD_WEIGHTS.iter().zip(fields) {
        match value.as_deref().map(str::trim) {
            Some("") => points += weight / 2.0,
            Some(_) => {
                points += weight;
                present.push(*name);
            }
            None => {}
        }
    }
    match (record.issue_date, record.expiry_date) {
        (Some(_), Some(_)) => {
            points += DATE_WEIGHT;
            present.push("issue and expiry dates");
        }
        (None, None) => {}
        _ => points += DATE_WEIGHT / 2.0,
    }
    (points, present)
}

pub fn confidence(record: &CertificateRecord) -> f64 {
    let max: f64 = FIELD_WEIGHTS.iter().map(|(_, w)| w).sum::<f64>() + DATE_WEIGHT;
    completeness(record).0 / max
}

pub fn issuer_insight(issuer: &str) -> Insight {
    let issuer = issuer.to_lowercase();
    if EDUCATIONAL_TERMS.iter().any(|term| issuer.contains(term)) {
        Insight::new("🏢", "Issuer Analysis", "Issuer appears to be an educational institution.")
    } else {
        Insight::new("ℹ️", "Issuer Analysis", "Additional verification recommended for this issuer type.")
    }
}

pub fn strength_insight(record: &CertificateRecord) -> Insight {
    let (points, present) = completeness(record);
    let level = StrengthLevel::from_points(points);
    let description = if present.is_empty() {
        format!("Certificate carries {}.", level.description())
    } else {
        format!("Certificate carries {} including {}.", level.description(), present.join(", "))
    };
    Insight::new(level.icon(), format!("{:?} Record", level), description)
}

fn anomaly_insight(record: &CertificateRecord) -> Insight {
    if !record.anomaly_scored {
        Insight::new(
            "ℹ️",
            "Anomaly Check",
            "Uploaded before enough certificates existed for anomaly scoring.",
        )
    } else if record.is_anomalous {
        Insight::new(
            "⚠️",
            "Anomaly Check",
            format!(
                "Upload was flagged as unusual (score {:.2}). Confirm details with the issuer.",
                record.anomaly_score
            ),
        )
    } else {
        Insight::new(
            "✅",
            "Anomaly Check",
            format!("Upload matches typical certificates (score {:.2}).", record.anomaly_score),
        )
    }
}

fn revocation_insight(record: &CertificateRecord) -> Option<Insight> {
    if !record.is_revoked {
        return None;
    }
    let when = record
        .revocation_date
        .map(|d| format!(" on {}", d.format("%Y-%m-%d")))
        .unwrap_or_default();
    Some(Insight::new(
        "⛔",
        "Revoked",
        format!("The issuer revoked this certificate{}. Do not rely on it.", when),
    ))
}

/// Validity span from the certificate's own dates, or upload age when either is missing.
fn timeline_insight(record: &CertificateRecord, now: DateTime<Utc>) -> Insight {
    match (record.issue_date, record.expiry_date) {
        (Some(issued), Some(expires)) => validity_insight((expires - issued).num_days() as f64 / 365.0),
        _ => upload_age_insight(record, now),
    }
}

fn validity_insight(years: f64) -> Insight {
    if years <= 0.0 {
        Insight::new(
            "⚠️",
            "Timeline Alert",
            "Certificate dates require verification. The expiry date is on or before the issue date.",
        )
    } else if years > 10.0 {
        Insight::new(
            "📅",
            "Extended Validity",
            format!(
                "Long-term certificate with {} year validity period, typical for permanent certifications.",
                years.floor()
            ),
        )
    } else {
        Insight::new(
            "✅",
            "Standard Timeline",
            format!("Certificate follows a standard {} year validity period.", years.floor()),
        )
    }
}

fn upload_age_insight(record: &CertificateRecord, now: DateTime<Utc>) -> Insight {
    let days = (now - record.upload_timestamp).num_days().max(0);
    match days {
        0 => Insight::new("🆕", "Recently Uploaded", "Certificate was uploaded today."),
        d if d > 3650 => Insight::new(
            "📅",
            "Long-standing Record",
            format!("Certificate has been on file for {} years.", d / 365),
        ),
        d => Insight::new("📅", "Timeline", format!("Certificate has been on file for {} days.", d)),
    }
}

/// Build the analysis for a verification outcome.
pub fn analyze(outcome: VerificationOutcome, now: DateTime<Utc>) -> CertificateAnalysis {
    let record = &outcome.record;
    let mut insights = vec![
        strength_insight(record),
        timeline_insight(record, now),
        issuer_insight(&record.issuer),
        anomaly_insight(record),
    ];
    insights.extend(revocation_insight(record));
    if let Some(program) = record.program.as_deref().filter(|p| !p.trim().is_empty()) {
        let lower = program.to_lowercase();
        let kind = if ACADEMIC_TERMS.iter().any(|term| lower.contains(term)) {
            "academic qualifications"
        } else {
            "professional certifications"
        };
        insights.push(Insight::new(
            "📜",
            "Program",
            format!("Awarded for {}, commonly used for {}.", program.trim(), kind),
        ));
    }

    let confidence = confidence(record);
    CertificateAnalysis {
        outcome,
        insights,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::record::{CertificateSubmission, CodeMatch};
    use chrono::{Duration, NaiveDate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn record(submission: CertificateSubmission) -> CertificateRecord {
        CertificateRecord::new(submission, "/f.pdf", "AAAAAAAA", Utc::now())
    }

    fn outcome(record: CertificateRecord) -> VerificationOutcome {
        VerificationOutcome {
            original_code: "AAAAAAAA".to_string(),
            matched: CodeMatch::Current,
            rotated: true,
            record,
        }
    }

    #[test]
    fn test_issuer_keywords() {
        assert_eq!(issuer_insight("ABC University").icon, "🏢");
        assert_eq!(issuer_insight("Lagos Business SCHOOL").icon, "🏢");
        assert_eq!(issuer_insight("Acme Ltd").icon, "ℹ️");
    }

    #[test]
    fn test_absent_fields_lower_confidence() {
        let bare = record(CertificateSubmission::new("ABC University"));
        assert_eq!(confidence(&bare), 0.0);

        let full = record(
            CertificateSubmission::new("ABC University")
                .with_external_id("X1")
                .with_subject("12345")
                .with_student_name("Ada")
                .with_program("BSc Physics")
                .with_grade("A")
                .with_dates(date(2020, 9, 1), date(2024, 9, 1)),
        );
        assert_eq!(confidence(&full), 1.0);
        assert_eq!(StrengthLevel::from_points(completeness(&full).0), StrengthLevel::Strong);
    }

    #[test]
    fn test_empty_field_counts_half() {
        let empty = record(CertificateSubmission::new("ABC").with_external_id(""));
        let (points, present) = completeness(&empty);
        assert_eq!(points, 1.0);
        assert!(present.is_empty());
        assert_eq!(StrengthLevel::from_points(points), StrengthLevel::Standard);
    }

    #[test]
    fn test_analysis_includes_revocation() {
        let mut r = record(CertificateSubmission::new("ABC University"));
        r.is_revoked = true;
        r.revocation_date = Some(Utc::now());
        let analysis = analyze(outcome(r), Utc::now());
        assert!(analysis.insights.iter().any(|i| i.title == "Revoked"));
    }

    #[test]
    fn test_unscored_record_reports_insufficient_data() {
        let r = record(CertificateSubmission::new("ABC University"));
        let analysis = analyze(outcome(r), Utc::now());
        let anomaly = analysis.insights.iter().find(|i| i.title == "Anomaly Check").unwrap();
        assert!(anomaly.description.contains("before enough certificates"));
    }

    #[test]
    fn test_missing_dates_lower_confidence() {
        let base = CertificateSubmission::new("ABC University").with_external_id("X1");
        let mut one_date = base.clone();
        one_date.issue_date = Some(date(2020, 9, 1));

        let none = confidence(&record(base.clone()));
        let half = confidence(&record(one_date));
        let both = confidence(&record(base.with_dates(date(2020, 9, 1), date(2024, 9, 1))));
        assert!(none < half && half < both);
        assert_eq!(both, 3.0 / 8.0);
    }

    #[test]
    fn test_timeline_from_certificate_dates() {
        let submission = |issued, expires| {
            record(CertificateSubmission::new("ABC").with_dates(issued, expires))
        };
        let now = Utc::now();

        let standard = timeline_insight(&submission(date(2020, 9, 1), date(2024, 9, 1)), now);
        assert_eq!(standard.title, "Standard Timeline");
        assert!(standard.description.contains("4 year"));

        let extended = timeline_insight(&submission(date(2000, 1, 1), date(2050, 1, 1)), now);
        assert_eq!(extended.title, "Extended Validity");
        assert!(extended.description.contains("50 year"));

        let inverted = timeline_insight(&submission(date(2024, 1, 1), date(2024, 1, 1)), now);
        assert_eq!(inverted.title, "Timeline Alert");
        assert_eq!(inverted.icon, "⚠️");
    }

    #[test]
    fn test_timeline_age() {
        let mut r = record(CertificateSubmission::new("ABC"));
        r.upload_timestamp = Utc::now() - Duration::days(40);
        let insight = timeline_insight(&r, Utc::now());
        assert!(insight.description.contains("40 days"));
    }

    #[test]
    fn test_analysis_serializes_flat() {
        let r = record(CertificateSubmission::new("ABC University"));
        let json = serde_json::to_value(analyze(outcome(r), Utc::now())).unwrap();
        assert_eq!(json["originalCode"], "AAAAAAAA");
        assert!(json["insights"].is_array());
        assert!(json["confidence"].is_number());
    }
}
