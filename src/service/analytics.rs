//! Admin analytics: totals, per-issuer breakdown and recent activity.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::core::record::CertificateRecord;

/// Kind of entry in the activity feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Upload,
    Verification,
    Revocation,
    Report,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    #[serde(rename = "type")]
    pub kind: ActivityKind,
    pub certificate_id: String,
    pub institution: String,
    pub description: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuerStats {
    pub issuer: String,
    pub certificates: usize,
    pub verified: usize,
    pub verifications: u64,
    pub revoked: usize,
    pub anomalous: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub total_certificates: usize,
    pub total_verified: usize,
    pub total_verifications: u64,
    pub total_institutions: usize,
    pub total_reports: usize,
    pub total_revoked: usize,
    pub total_anomalous: usize,
    pub institution_stats: Vec<IssuerStats>,
    pub recent_activity: Vec<ActivityEntry>,
}

/// Aggregate `records`. The activity feed is newest first, at most `activity_limit` long.
pub fn summarize(records: &[CertificateRecord], activity_limit: usize) -> AnalyticsSummary {
    let mut by_issuer: BTreeMap<&str, IssuerStats> = BTreeMap::new();
    for r in records {
        let issuer = r.issuer.trim();
        let stats = by_issuer.entry(issuer).or_insert_with(|| IssuerStats {
            issuer: issuer.to_string(),
            certificates: 0,
            verified: 0,
            verifications: 0,
            revoked: 0,
            anomalous: 0,
        });
        stats.certificates += 1;
        stats.verified += r.is_verified as usize;
        stats.verifications += r.verification_count;
        stats.revoked += r.is_revoked as usize;
        stats.anomalous += r.is_anomalous as usize;
    }

    let mut institution_stats: Vec<IssuerStats> = by_issuer.into_values().collect();
    institution_stats.sort_by(|a, b| b.certificates.cmp(&a.certificates).then_with(|| a.issuer.cmp(&b.issuer)));

    AnalyticsSummary {
        total_certificates: records.len(),
        total_verified: records.iter().filter(|r| r.is_verified).count(),
        total_verifications: records.iter().map(|r| r.verification_count).sum(),
        total_institutions: institution_stats.len(),
        total_reports: records.iter().map(|r| r.reports.len()).sum(),
        total_revoked: records.iter().filter(|r| r.is_revoked).count(),
        total_anomalous: records.iter().filter(|r| r.is_anomalous).count(),
        institution_stats,
        recent_activity: recent_activity(records, activity_limit),
    }
}

fn recent_activity(records: &[CertificateRecord], limit: usize) -> Vec<ActivityEntry> {
    let mut feed = Vec::new();
    for r in records {
        let entry = |kind, description: String, timestamp| ActivityEntry {
            kind,
            certificate_id: r.id.clone(),
            institution: r.issuer.clone(),
            description,
            timestamp,
        };

        feed.push(entry(ActivityKind::Upload, "Certificate uploaded".to_string(), r.upload_timestamp));
        if let Some(at) = r.last_verified_at {
            feed.push(entry(
                ActivityKind::Verification,
                format!("Certificate verified ({} total)", r.verification_count),
                at,
            ));
        }
        if let Some(at) = r.revocation_date {
            feed.push(entry(ActivityKind::Revocation, "Certificate revoked".to_string(), at));
        }
        for report in &r.reports {
            feed.push(entry(
                ActivityKind::Report,
                format!("Certificate reported: {}", report.reason),
                report.reported_at,
            ));
        }
    }
    feed.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    feed.truncate(limit);
    feed
}
