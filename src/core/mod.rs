pub mod caller;
pub mod config;
pub mod errors;
pub mod record;

pub use caller::{Caller, Role};
pub use config::PortalConfig;
pub use errors::{PortalError, Result};
pub use record::{CertificateRecord, CertificateReport, CertificateSubmission, CodeMatch, CodeRing};
