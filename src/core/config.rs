use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::errors::PortalError;

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "ServerConfig::default_host")]
    pub host: String,

    #[serde(default = "ServerConfig::default_port")]
    pub port: u16,

    /// Allowed CORS origin for the dashboard front-end
    #[serde(default = "ServerConfig::default_cors_allow_origin")]
    pub cors_allow_origin: String,
}

impl ServerConfig {
    fn default_host() -> String { "0.0.0.0".to_string() }
    fn default_port() -> u16 { 5000 }
    fn default_cors_allow_origin() -> String { "http://localhost:3000".to_string() }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
            cors_allow_origin: Self::default_cors_allow_origin(),
        }
    }
}

/// Storage backend type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackendKind {
    /// In-memory only, lost on exit
    Memory,
    /// Single JSON file rewritten on every mutation
    JsonFile,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_backend")]
    pub backend: StorageBackendKind,

    #[serde(default = "StorageConfig::default_data_path")]
    pub data_path: PathBuf,
}

impl StorageConfig {
    fn default_backend() -> StorageBackendKind { StorageBackendKind::JsonFile }
    fn default_data_path() -> PathBuf { PathBuf::from("certs.json") }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            data_path: Self::default_data_path(),
        }
    }
}

/// Isolation-forest detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Trees per forest
    #[serde(default = "DetectorConfig::default_num_trees")]
    pub num_trees: usize,

    /// Depth bound used while growing each tree
    #[serde(default = "DetectorConfig::default_max_depth")]
    pub max_depth: usize,

    /// Records required before the forest is trained and used
    #[serde(default = "DetectorConfig::default_min_training_records")]
    pub min_training_records: usize,

    /// Scores strictly above this are anomalous
    #[serde(default = "DetectorConfig::default_anomaly_threshold")]
    pub anomaly_threshold: f64,

    /// Scores strictly above this are reported as high risk
    #[serde(default = "DetectorConfig::default_high_risk_threshold")]
    pub high_risk_threshold: f64,

    /// Reference sample size for score normalization
    #[serde(default = "DetectorConfig::default_normalization_size")]
    pub normalization_size: usize,

    /// Fixed seed for reproducible forests; OS entropy when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl DetectorConfig {
    fn default_num_trees() -> usize { 10 }
    fn default_max_depth() -> usize { 8 }
    fn default_min_training_records() -> usize { 5 }
    fn default_anomaly_threshold() -> f64 { 0.6 }
    fn default_high_risk_threshold() -> f64 { 0.8 }
    fn default_normalization_size() -> usize { 100 }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            num_trees: Self::default_num_trees(),
            max_depth: Self::default_max_depth(),
            min_training_records: Self::default_min_training_records(),
            anomaly_threshold: Self::default_anomaly_threshold(),
            high_risk_threshold: Self::default_high_risk_threshold(),
            normalization_size: Self::default_normalization_size(),
            seed: None,
        }
    }
}

/// Verification code configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Attempts to draw a code that no other record holds as its live code
    #[serde(default = "VerificationConfig::default_max_code_attempts")]
    pub max_code_attempts: usize,
}

impl VerificationConfig {
    fn default_max_code_attempts() -> usize { 8 }
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_code_attempts: Self::default_max_code_attempts(),
        }
    }
}

/// Analytics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "AnalyticsConfig::default_recent_activity_limit")]
    pub recent_activity_limit: usize,
}

impl AnalyticsConfig {
    fn default_recent_activity_limit() -> usize { 10 }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            recent_activity_limit: Self::default_recent_activity_limit(),
        }
    }
}

/// Portal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PortalConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub verification: VerificationConfig,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl PortalConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PortalError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            PortalError::Configuration(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, PortalError> {
        toml::from_str(content).map_err(|e| PortalError::Configuration(e.to_string()))
    }

    /// Defaults with environment overrides applied
    pub fn from_env() -> Result<Self, PortalError> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Override fields from `PORTAL_*` environment variables
    pub fn apply_env_overrides(&mut self) -> Result<(), PortalError> {
        if let Ok(host) = std::env::var("PORTAL_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("PORTAL_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|_| PortalError::Configuration(format!("Invalid PORTAL_PORT: {}", port)))?;
        }
        if let Ok(path) = std::env::var("PORTAL_DATA_PATH") {
            self.storage.data_path = PathBuf::from(path);
        }
        if let Ok(backend) = std::env::var("PORTAL_STORAGE_BACKEND") {
            self.storage.backend = match backend.trim().to_ascii_lowercase().as_str() {
                "memory" => StorageBackendKind::Memory,
                "json_file" | "json" | "file" => StorageBackendKind::JsonFile,
                other => {
                    return Err(PortalError::Configuration(format!(
                        "Unknown PORTAL_STORAGE_BACKEND: {}",
                        other
                    )))
                }
            };
        }
        if let Ok(seed) = std::env::var("PORTAL_DETECTOR_SEED") {
            let seed = seed.trim().parse().map_err(|_| {
                PortalError::Configuration(format!("Invalid PORTAL_DETECTOR_SEED: {}", seed))
            })?;
            self.detector.seed = Some(seed);
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), PortalError> {
        let d = &self.detector;
        if !(0.0..=1.0).contains(&d.anomaly_threshold) || !(0.0..=1.0).contains(&d.high_risk_threshold) {
            return Err(PortalError::Configuration(
                "Detector thresholds must be between 0.0 and 1.0".to_string(),
            ));
        }
        if d.high_risk_threshold < d.anomaly_threshold {
            return Err(PortalError::Configuration(
                "high_risk_threshold must not be below anomaly_threshold".to_string(),
            ));
        }
        if d.num_trees == 0 || d.max_depth == 0 {
            return Err(PortalError::Configuration(
                "num_trees and max_depth must be greater than 0".to_string(),
            ));
        }
        if d.min_training_records < 2 {
            return Err(PortalError::Configuration(
                "min_training_records must be at least 2".to_string(),
            ));
        }
        if d.normalization_size < 2 {
            return Err(PortalError::Configuration(
                "normalization_size must be at least 2".to_string(),
            ));
        }
        if self.verification.max_code_attempts == 0 {
            return Err(PortalError::Configuration(
                "max_code_attempts must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = PortalConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.detector.num_trees, 10);
        assert_eq!(config.detector.max_depth, 8);
        assert_eq!(config.detector.normalization_size, 100);
        assert_eq!(config.storage.backend, StorageBackendKind::JsonFile);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PortalConfig::from_toml_str(
            r#"
            [server]
            port = 8080

            [detector]
            num_trees = 25
            seed = 7
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.detector.num_trees, 25);
        assert_eq!(config.detector.seed, Some(7));
        assert_eq!(config.detector.max_depth, 8);
    }

    #[test]
    fn test_threshold_validation() {
        let mut config = PortalConfig::default();
        config.detector.anomaly_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = PortalConfig::default();
        config.detector.high_risk_threshold = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_toml_is_configuration_error() {
        let err = PortalConfig::from_toml_str("server = 3").unwrap_err();
        assert!(matches!(err, PortalError::Configuration(_)));
    }
}
