//! Model scorer. Wraps an externally trained tabular classifier.
//!
//! The classifier is optional. Scoring walks an ordered list of sources
//! (`Model`, then `Rules`) and takes the first that succeeds; the rule
//! source cannot fail, so `score()` is total.
//!
//! Classifier input is a fixed ordered vector, see `FEATURE_NAMES`.
//! Every classifier call runs behind a timeout (`TimedClassifier`); a
//! timed-out call is a failure like any other and falls back to rules.

use crate::{
    config::RuleWeights,
    error::RetentionResult,
    features::NormalizedFeatures,
    rules,
};
use serde::{Deserialize, Serialize};
use std::{
    sync::{mpsc, Arc, Once},
    thread,
    time::Duration,
};
use thiserror::Error;

/// Classifier feature order. Never reorder. Trained artifacts depend on it.
pub const FEATURE_NAMES: [&str; 6] = [
    "days_since_last_purchase",
    "yearly_purchase_count",
    "avg_gap_days",
    "discount_sensitivity",
    "online_ratio",
    "avg_order_value",
];

pub type FeatureVector = [f64; 6];

/// Map normalized features into classifier input.
/// Sensitivity is ordinal: Low=0, Medium=1, High=2.
pub fn feature_vector(f: &NormalizedFeatures) -> FeatureVector {
    [
        f.days_since_last_purchase as f64,
        f.yearly_purchase_count as f64,
        f.avg_gap_days as f64,
        f.discount_sensitivity.ordinal(),
        f.online_ratio,
        f.avg_order_value,
    ]
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClassifierError {
    #[error("classifier artifact unavailable: {0}")]
    Unavailable(String),

    #[error("prediction failed: {0}")]
    Prediction(String),

    #[error("expected {expected} features, artifact has {actual}")]
    ShapeMismatch { expected: usize, actual: usize },

    #[error("non-finite probability {0}")]
    NonFinite(f64),

    #[error("classifier call timed out after {0} ms")]
    Timeout(u64),
}

/// The contract a trained classifier must fulfil.
/// Implementations are read-only after load and shared across threads.
pub trait ChurnClassifier: Send + Sync {
    fn name(&self) -> &str;

    /// Probability of the positive ("will churn") class.
    fn predict_proba(&self, x: &FeatureVector) -> Result<f64, ClassifierError>;

    /// Parallel-result batch prediction. One result per row.
    fn predict_proba_batch(&self, rows: &[FeatureVector]) -> Vec<Result<f64, ClassifierError>> {
        rows.iter().map(|x| self.predict_proba(x)).collect()
    }

    /// Per-feature signed contributions for one row, as
    /// (raw feature name, impact) pairs in any order.
    fn attributions(&self, x: &FeatureVector) -> Result<Vec<(String, f64)>, ClassifierError>;
}

// ── Linear artifact ──────────────────────────────────────────────────────────

/// Logistic model persisted as JSON. Attributions are exact in log-odds
/// space: `coef_i × (x_i − baseline_i)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearClassifier {
    pub version:       String,
    pub intercept:     f64,
    pub coefficients:  Vec<f64>,
    /// Reference row (training means) for attributions.
    pub baseline:      Vec<f64>,
    /// Names as emitted by the training pipeline, e.g. `num__avg_gap_days`.
    #[serde(default)]
    pub feature_names: Vec<String>,
}

impl LinearClassifier {
    pub fn from_json_file(path: &str) -> RetentionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let model: Self = serde_json::from_str(&content)?;
        Ok(model)
    }

    fn check_shape(&self) -> Result<(), ClassifierError> {
        let expected = FEATURE_NAMES.len();
        for actual in [self.coefficients.len(), self.baseline.len()] {
            if actual != expected {
                return Err(ClassifierError::ShapeMismatch { expected, actual });
            }
        }
        Ok(())
    }

    fn feature_name(&self, i: usize) -> String {
        self.feature_names
            .get(i)
            .cloned()
            .unwrap_or_else(|| FEATURE_NAMES[i].to_string())
    }
}

impl ChurnClassifier for LinearClassifier {
    fn name(&self) -> &str { &self.version }

    fn predict_proba(&self, x: &FeatureVector) -> Result<f64, ClassifierError> {
        self.check_shape()?;
        let logit = self.intercept
            + self.coefficients.iter().zip(x.iter()).map(|(w, v)| w * v).sum::<f64>();
        let p = 1.0 / (1.0 + (-logit).exp());
        if p.is_finite() { Ok(p) } else { Err(ClassifierError::NonFinite(p)) }
    }

    fn attributions(&self, x: &FeatureVector) -> Result<Vec<(String, f64)>, ClassifierError> {
        self.check_shape()?;
        Ok((0..FEATURE_NAMES.len())
            .map(|i| (self.feature_name(i), self.coefficients[i] * (x[i] - self.baseline[i])))
            .collect())
    }
}

/// Load the artifact at `path`. Any failure is logged and yields `None`;
/// the scorer then runs rule-based only.
pub fn load_classifier(path: Option<&str>) -> Option<Arc<dyn ChurnClassifier>> {
    let path = path?;
    if !std::path::Path::new(path).exists() {
        log::warn!("model: classifier artifact not found at {path}, using rule-based scorer");
        return None;
    }
    match LinearClassifier::from_json_file(path) {
        Ok(model) => match model.check_shape() {
            Ok(()) => {
                log::info!("model: loaded classifier {} from {path}", model.version);
                Some(Arc::new(model))
            }
            Err(e) => {
                log::error!("model: rejected classifier at {path}: {e}");
                None
            }
        },
        Err(e) => {
            log::error!("model: failed to load classifier from {path}: {e}");
            None
        }
    }
}

// ── Timeout guard ────────────────────────────────────────────────────────────

pub const DEFAULT_CLASSIFIER_TIMEOUT_MS: u64 = 5_000;

/// Runs every call of the wrapped classifier on a worker thread and waits
/// at most `timeout_ms`. A timed-out worker is detached; its late answer
/// is discarded.
pub struct TimedClassifier {
    inner:      Arc<dyn ChurnClassifier>,
    timeout_ms: u64,
}

impl TimedClassifier {
    pub fn new(inner: Arc<dyn ChurnClassifier>, timeout_ms: u64) -> Self {
        Self { inner, timeout_ms }
    }

    fn call<T, F>(&self, op: F) -> Result<T, ClassifierError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn ChurnClassifier) -> Result<T, ClassifierError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("classifier-call".into())
            .spawn(move || {
                let _ = tx.send(op(inner.as_ref()));
            })
            .map_err(|e| ClassifierError::Prediction(format!("cannot spawn worker: {e}")))?;

        match rx.recv_timeout(Duration::from_millis(self.timeout_ms)) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ClassifierError::Timeout(self.timeout_ms)),
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                Err(ClassifierError::Prediction("worker exited without a response".into()))
            }
        }
    }
}

impl ChurnClassifier for TimedClassifier {
    fn name(&self) -> &str { self.inner.name() }

    fn predict_proba(&self, x: &FeatureVector) -> Result<f64, ClassifierError> {
        let x = *x;
        self.call(move |c| c.predict_proba(&x))
    }

    /// One worker and one deadline for the whole batch. A timeout fails
    /// every row.
    fn predict_proba_batch(&self, rows: &[FeatureVector]) -> Vec<Result<f64, ClassifierError>> {
        let owned = rows.to_vec();
        match self.call(move |c| Ok(c.predict_proba_batch(&owned))) {
            Ok(results) => results,
            Err(e) => vec![Err(e); rows.len()],
        }
    }

    fn attributions(&self, x: &FeatureVector) -> Result<Vec<(String, f64)>, ClassifierError> {
        let x = *x;
        self.call(move |c| c.attributions(&x))
    }
}

// ── Scorer ───────────────────────────────────────────────────────────────────

/// Where a probability came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    Model,
    Rules,
}

/// Fallback order. The last entry must be infallible.
pub const SCORE_SOURCES: [ScoreSource; 2] = [ScoreSource::Model, ScoreSource::Rules];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredProbability {
    pub probability: f64,
    pub source:      ScoreSource,
}

pub struct ModelScorer {
    classifier:     Option<Arc<dyn ChurnClassifier>>,
    weights:        RuleWeights,
    absence_logged: Once,
}

impl ModelScorer {
    pub fn new(classifier: Option<Arc<dyn ChurnClassifier>>, weights: RuleWeights) -> Self {
        Self::with_timeout(classifier, weights, DEFAULT_CLASSIFIER_TIMEOUT_MS)
    }

    /// The classifier, if any, is wrapped in a `TimedClassifier`.
    pub fn with_timeout(
        classifier: Option<Arc<dyn ChurnClassifier>>,
        weights: RuleWeights,
        timeout_ms: u64,
    ) -> Self {
        let classifier = classifier.map(|c| {
            Arc::new(TimedClassifier::new(c, timeout_ms)) as Arc<dyn ChurnClassifier>
        });
        Self { classifier, weights, absence_logged: Once::new() }
    }

    pub fn rules_only(weights: RuleWeights) -> Self {
        Self::new(None, weights)
    }

    /// The timeout-guarded classifier.
    pub fn classifier(&self) -> Option<&Arc<dyn ChurnClassifier>> {
        self.classifier.as_ref()
    }

    pub fn weights(&self) -> &RuleWeights {
        &self.weights
    }

    /// Score one record. Never fails.
    pub fn score(&self, f: &NormalizedFeatures) -> ScoredProbability {
        for source in SCORE_SOURCES {
            match self.try_source(source, f) {
                Ok(probability) => return ScoredProbability { probability, source },
                // Absence is logged once by available_classifier().
                Err(ClassifierError::Unavailable(_)) => {}
                Err(e) => log::warn!(
                    "model: {:?} source failed for {}: {e}; falling back",
                    source, f.customer_id,
                ),
            }
        }
        self.rules(f)
    }

    /// Score many records. A failed row falls back to rules on its own;
    /// the rest of the batch keeps its model probabilities.
    pub fn score_batch(&self, rows: &[NormalizedFeatures]) -> Vec<ScoredProbability> {
        let Some(classifier) = self.available_classifier() else {
            return rows.iter().map(|f| self.rules(f)).collect();
        };

        let vectors: Vec<FeatureVector> = rows.iter().map(feature_vector).collect();
        let mut results = classifier.predict_proba_batch(&vectors);
        if results.len() != rows.len() {
            log::error!(
                "model: batch returned {} results for {} rows; using rule-based scorer",
                results.len(), rows.len(),
            );
            results = Vec::new();
        }

        rows.iter()
            .enumerate()
            .map(|(i, f)| match results.get(i).cloned().map(|r| r.and_then(check_finite)) {
                Some(Ok(probability)) => ScoredProbability { probability, source: ScoreSource::Model },
                Some(Err(e)) => {
                    log::warn!("model: batch row {} failed: {e}; falling back", f.customer_id);
                    self.rules(f)
                }
                None => self.rules(f),
            })
            .collect()
    }

    fn try_source(&self, source: ScoreSource, f: &NormalizedFeatures) -> Result<f64, ClassifierError> {
        match source {
            ScoreSource::Model => {
                let classifier = self.available_classifier()
                    .ok_or_else(|| ClassifierError::Unavailable("no classifier loaded".into()))?;
                classifier.predict_proba(&feature_vector(f)).and_then(check_finite)
            }
            ScoreSource::Rules => Ok(rules::rule_based_probability(f, &self.weights)),
        }
    }

    fn rules(&self, f: &NormalizedFeatures) -> ScoredProbability {
        ScoredProbability {
            probability: rules::rule_based_probability(f, &self.weights),
            source:      ScoreSource::Rules,
        }
    }

    fn available_classifier(&self) -> Option<&Arc<dyn ChurnClassifier>> {
        if self.classifier.is_none() {
            self.absence_logged.call_once(|| {
                log::warn!("model: no classifier available, using rule-based scorer");
            });
        }
        self.classifier.as_ref()
    }
}

fn check_finite(p: f64) -> Result<f64, ClassifierError> {
    if p.is_finite() { Ok(p.clamp(0.0, 1.0)) } else { Err(ClassifierError::NonFinite(p)) }
}
