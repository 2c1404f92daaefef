//! 证书异常检测模块
//!
//! Flags suspicious certificate uploads with a from-scratch isolation forest.
//!
//! ## 特性
//! - 🌲 Isolation forest trained online over every stored record
//! - 📏 Six-slot feature vectors, recomputed at extraction time
//! - 🛡️ Insufficient-data guard before the training threshold
//! - 🔁 Whole-forest replacement on retrain, never a partial forest

pub mod detector;
pub mod errors;
pub mod features;
pub mod forest;

pub use detector::{AnomalyDetector, RetrainOutcome};
pub use errors::{AnomalyDetectionError, Result};
pub use features::{CertificateFeatures, FeatureExtractor, FEATURE_DIMENSION};
pub use forest::{average_path_length, ForestParams, IsolationForest, IsolationNode, IsolationTree};

use serde::{Deserialize, Serialize};

/// Whether the detector is scoring or still waiting for data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DetectorStatus {
    Active,
    InsufficientData,
}

/// Reporting band for an anomaly score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    /// `> high` is High, `> anomalous` is Medium, else Low.
    pub fn from_score(score: f64, anomaly_threshold: f64, high_threshold: f64) -> Self {
        if score > high_threshold {
            RiskLevel::High
        } else if score > anomaly_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// 异常检测结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyResult {
    /// 是否检测到异常
    pub is_anomalous: bool,
    /// 异常分数 (0.0-1.0)
    pub score: f64,
    pub risk_level: RiskLevel,
    pub status: DetectorStatus,
    /// 详细原因
    pub reason: String,
    /// 关键特征贡献 (特征名, 贡献度)
    pub key_factors: Vec<(String, f64)>,
}

impl AnomalyResult {
    /// Fixed result before the detector has enough data.
    pub fn insufficient_data() -> Self {
        Self {
            is_anomalous: false,
            score: 0.0,
            risk_level: RiskLevel::Low,
            status: DetectorStatus::InsufficientData,
            reason: "Insufficient data for anomaly detection".to_string(),
            key_factors: Vec::new(),
        }
    }

    /// 创建正常结果
    pub fn normal(score: f64) -> Self {
        Self {
            is_anomalous: false,
            score,
            risk_level: RiskLevel::Low,
            status: DetectorStatus::Active,
            reason: "Certificate appears normal".to_string(),
            key_factors: Vec::new(),
        }
    }

    /// 创建异常结果
    pub fn anomalous(score: f64, risk_level: RiskLevel, reason: String) -> Self {
        Self {
            is_anomalous: true,
            score,
            risk_level,
            status: DetectorStatus::Active,
            reason,
            key_factors: Vec::new(),
        }
    }

    /// 添加关键因素
    pub fn with_factors(mut self, factors: Vec<(String, f64)>) -> Self {
        self.key_factors = factors;
        self
    }
}
