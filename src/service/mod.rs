//! Service layer: the portal facade plus analytics and analysis helpers.

pub mod analytics;
pub mod insights;
pub mod portal;

pub use analytics::{ActivityEntry, ActivityKind, AnalyticsSummary, IssuerStats};
pub use insights::{CertificateAnalysis, Insight, StrengthLevel};
pub use portal::{
    AnomalyReport, BatchOutcome, BatchRowOutcome, CertificatePortal, FlaggedCertificate, SubmissionOutcome,
};
