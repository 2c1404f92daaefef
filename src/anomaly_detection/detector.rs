//! 异常检测器 - 主入口
//!
//! Owns the live isolation forest and the decision policy around it:
//! the insufficient-data guard, the anomaly threshold, risk banding and
//! whole-forest replacement on retrain.

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::errors::{AnomalyDetectionError, Result};
use super::features::{CertificateFeatures, FeatureExtractor};
use super::forest::{ForestParams, IsolationForest};
use super::{AnomalyResult, DetectorStatus, RiskLevel};
use crate::core::config::DetectorConfig;
use crate::core::record::CertificateRecord;

/// Summary of a successful retrain.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrainOutcome {
    pub training_size: usize,
    pub num_trees: usize,
    pub trained_at: DateTime<Utc>,
}

/// 异常检测器
pub struct AnomalyDetector {
    config: DetectorConfig,
    extractor: FeatureExtractor,
    /// Readers clone the `Arc` and never see a half-built forest.
    forest: RwLock<Option<Arc<IsolationForest>>>,
    last_trained_at: RwLock<Option<DateTime<Utc>>>,
    rng: Mutex<StdRng>,
}

impl AnomalyDetector {
    /// Seeded from `config.seed` when present, OS entropy otherwise.
    pub fn new(config: DetectorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }

    /// Use an explicit random source for tree construction.
    pub fn with_rng(config: DetectorConfig, rng: StdRng) -> Self {
        info!(
            "🤖 Anomaly detector ready: trees={}, max_depth={}, min_records={}",
            config.num_trees, config.max_depth, config.min_training_records
        );
        Self {
            config,
            extractor: FeatureExtractor::new(),
            forest: RwLock::new(None),
            last_trained_at: RwLock::new(None),
            rng: Mutex::new(rng),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    pub fn extractor(&self) -> &FeatureExtractor {
        &self.extractor
    }

    fn params(&self) -> ForestParams {
        ForestParams {
            num_trees: self.config.num_trees,
            max_depth: self.config.max_depth,
            normalization_size: self.config.normalization_size,
        }
    }

    /// Active once a forest has been installed.
    pub fn status(&self) -> DetectorStatus {
        if self.forest.read().is_some() {
            DetectorStatus::Active
        } else {
            DetectorStatus::InsufficientData
        }
    }

    /// Snapshot of the installed forest.
    pub fn forest(&self) -> Option<Arc<IsolationForest>> {
        self.forest.read().clone()
    }

    pub fn last_trained_at(&self) -> Option<DateTime<Utc>> {
        *self.last_trained_at.read()
    }

    /// Score `record` given the number of records already stored.
    pub fn check_record(&self, record: &CertificateRecord, record_count: usize) -> AnomalyResult {
        let features = self.extractor.extract(record);
        self.check(&features, record_count)
    }

    /// Score a feature vector.
    ///
    /// Below `min_training_records`, or before any forest exists, this
    /// returns the fixed insufficient-data result without touching the forest.
    pub fn check(&self, features: &CertificateFeatures, record_count: usize) -> AnomalyResult {
        if record_count < self.config.min_training_records {
            debug!(
                "Skipping anomaly scoring: {} of {} records",
                record_count, self.config.min_training_records
            );
            return AnomalyResult::insufficient_data();
        }
        let Some(forest) = self.forest() else {
            debug!("Skipping anomaly scoring: no forest trained yet");
            return AnomalyResult::insufficient_data();
        };

        let vector = features.to_vector();
        let score = match forest.try_predict(&vector) {
            Ok(score) => score,
            Err(e) => {
                error!("Anomaly scoring failed: {}", e);
                return AnomalyResult::insufficient_data();
            }
        };

        let result = self.classify(score).with_factors(Self::key_factors(&forest, &vector));
        if result.is_anomalous {
            warn!("⚠️ Anomalous certificate: score={:.3}, risk={:?}", score, result.risk_level);
        } else {
            debug!("✅ Certificate looks normal: score={:.3}", score);
        }
        result
    }

    /// Apply the decision policy to a raw score.
    pub fn classify(&self, score: f64) -> AnomalyResult {
        let risk_level =
            RiskLevel::from_score(score, self.config.anomaly_threshold, self.config.high_risk_threshold);
        if score > self.config.anomaly_threshold {
            AnomalyResult::anomalous(
                score,
                risk_level,
                format!("Isolation score {:.2} above threshold {:.2}", score, self.config.anomaly_threshold),
            )
        } else {
            AnomalyResult::normal(score)
        }
    }

    fn key_factors(forest: &IsolationForest, vector: &[f64]) -> Vec<(String, f64)> {
        let mut factors: Vec<(String, f64)> = CertificateFeatures::names()
            .iter()
            .zip(forest.isolating_features(vector))
            .map(|(name, weight)| (name.to_string(), weight))
            .filter(|(_, weight)| *weight > 0.0)
            .collect();
        factors.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        factors.truncate(3);
        factors
    }

    /// Replace the forest with one trained over `vectors`.
    ///
    /// On any failure the previous forest stays installed.
    pub fn retrain(&self, vectors: &[Vec<f64>]) -> Result<RetrainOutcome> {
        if vectors.len() < self.config.min_training_records {
            return Err(AnomalyDetectionError::InsufficientData {
                required: self.config.min_training_records,
                available: vectors.len(),
            });
        }

        info!("🌲 Retraining isolation forest over {} records", vectors.len());
        let fitted = {
            let mut rng = self.rng.lock();
            IsolationForest::fit(vectors, self.params(), &mut *rng)
        };

        match fitted {
            Ok(forest) => {
                let trained_at = Utc::now();
                let outcome = RetrainOutcome {
                    training_size: forest.training_size(),
                    num_trees: forest.trees().len(),
                    trained_at,
                };
                *self.forest.write() = Some(Arc::new(forest));
                *self.last_trained_at.write() = Some(trained_at);
                info!("✅ Isolation forest installed ({} trees)", outcome.num_trees);
                Ok(outcome)
            }
            Err(e) => {
                warn!("Retrain aborted, keeping previous forest: {}", e);
                Err(e)
            }
        }
    }

    /// Retrain over the current feature vectors of `records`.
    pub fn retrain_from_records(&self, records: &[CertificateRecord]) -> Result<RetrainOutcome> {
        let now = Utc::now();
        let vectors: Vec<Vec<f64>> = records
            .iter()
            .map(|r| self.extractor.extract_at(r, now).to_vector())
            .collect();
        self.retrain(&vectors)
    }
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}
