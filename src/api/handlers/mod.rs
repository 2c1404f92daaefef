//! API Handlers 模块
//!
//! 按功能拆分的HTTP请求处理器

pub mod admin;
pub mod certificates;
pub mod health;
pub mod verification;

// 重新导出常用handlers
pub use admin::{analytics_summary, anomaly_report};
pub use certificates::{
    bulk_upload, download_certificate, institution_certificates, report_certificate,
    revoke_certificate, student_certificates, submit_certificate,
};
pub use health::health_check;
pub use verification::{analyze_certificate, verify_certificate};
