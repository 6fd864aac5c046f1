//! Risk classifier: probability → tier and confidence.
//!
//! Confidence uses fixed per-tier constants. The distance-from-0.5
//! formula is not used anywhere in the crate.

use crate::{config::RiskThresholds, types::RiskTier};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChurnScore {
    /// In [0.0, 0.99].
    pub probability: f64,
    pub tier:        RiskTier,
    /// In [0.65, 0.85].
    pub confidence:  f64,
}

pub fn classify(probability: f64, t: &RiskThresholds) -> RiskTier {
    if probability >= t.high {
        RiskTier::High
    } else if probability >= t.medium {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

pub fn confidence(tier: RiskTier, t: &RiskThresholds) -> f64 {
    match tier {
        RiskTier::High   => t.high_confidence,
        RiskTier::Medium => t.medium_confidence,
        RiskTier::Low    => t.low_confidence,
    }
}

pub fn churn_score(probability: f64, t: &RiskThresholds) -> ChurnScore {
    let tier = classify(probability, t);
    ChurnScore { probability, tier, confidence: confidence(tier, t) }
}
