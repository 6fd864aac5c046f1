//! Rule-based churn scorer, the always-available fallback.
//!
//! Five additive terms, then a category multiplier:
//!   recency + frequency + volume + sensitivity + online
//!
//! Sensitivity and online terms carry their weight inside the constant
//! and are added as-is. This scorer has no external dependency and must
//! never fail.

use crate::{
    config::RuleWeights,
    features::NormalizedFeatures,
    types::{DiscountSensitivity, RiskTier},
};
use serde::{Deserialize, Serialize};

/// Per-term contributions of a rule-based score, already weighted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleBreakdown {
    pub recency:             f64,
    pub frequency:           f64,
    pub volume:              f64,
    pub discount_sensitivity: f64,
    pub online_channel:      f64,
    pub category_multiplier: f64,
    pub probability:         f64,
}

impl RuleBreakdown {
    /// Named terms after the category multiplier is applied, in
    /// classifier feature order.
    pub fn weighted_terms(&self) -> [(&'static str, f64); 5] {
        let m = self.category_multiplier;
        [
            ("days_since_last_purchase", self.recency * m),
            ("yearly_purchase_count",    self.volume * m),
            ("avg_gap_days",             self.frequency * m),
            ("discount_sensitivity",     self.discount_sensitivity * m),
            ("online_ratio",             self.online_channel * m),
        ]
    }
}

pub fn score_breakdown(f: &NormalizedFeatures, w: &RuleWeights) -> RuleBreakdown {
    let recency_risk = (f.days_since_last_purchase as f64 / w.recency_horizon_days).min(1.0);
    let frequency_risk = (f.avg_gap_days as f64 / w.frequency_horizon_days).min(1.0);
    let volume_risk = 1.0 - (f.yearly_purchase_count as f64 / w.volume_saturation).min(1.0);

    let discount_sensitivity = match f.discount_sensitivity {
        DiscountSensitivity::High   => w.sensitivity_high,
        DiscountSensitivity::Medium => w.sensitivity_medium,
        DiscountSensitivity::Low    => w.sensitivity_low,
    };

    let online_channel = if f.online_ratio > w.online_threshold {
        f.online_ratio * w.online_factor
    } else {
        0.0
    };

    let recency = recency_risk * w.recency_weight;
    let frequency = frequency_risk * w.frequency_weight;
    let volume = volume_risk * w.volume_weight;
    let category_multiplier = w.category_multiplier(&f.primary_category);

    let additive = recency + frequency + volume + discount_sensitivity + online_channel;
    let probability = (additive * category_multiplier).clamp(0.0, 1.0);

    RuleBreakdown {
        recency,
        frequency,
        volume,
        discount_sensitivity,
        online_channel,
        category_multiplier,
        probability,
    }
}

/// Full weighted heuristic probability in [0.0, 1.0].
///
/// Not to be confused with `intervention::simulation_baseline_probability`,
/// which is a separate two-term formula used only for simulation.
pub fn rule_based_probability(f: &NormalizedFeatures, w: &RuleWeights) -> f64 {
    score_breakdown(f, w).probability
}

/// Retention playbook for a customer at a given tier.
pub fn playbook_recommendations(f: &NormalizedFeatures, tier: RiskTier, brand: &str) -> Vec<String> {
    let category = &f.primary_category;
    let mut recs: Vec<String> = match tier {
        RiskTier::High => vec![
            format!("Send personalized {category} coupon bundle"),
            format!("Enroll in {brand} Rewards Plus program with bonus points"),
            "Schedule personal shopping assistant consultation".into(),
            "Offer free delivery on next 3 orders".into(),
        ],
        RiskTier::Medium => vec![
            format!("Send targeted {category} promotions"),
            "Double loyalty points for next month".into(),
            "Personalized weekly deals based on purchase history".into(),
        ],
        RiskTier::Low => vec![
            format!("Maintain regular engagement through {brand} app"),
            format!("Provide exclusive early access to {category} new arrivals"),
            "Share personalized shopping tips and recipes".into(),
        ],
    };

    if f.discount_sensitivity == DiscountSensitivity::High {
        recs.push("Send exclusive flash sale notifications".into());
    }
    if f.online_ratio > 0.7 {
        recs.push("Highlight online-exclusive deals and app-only coupons".into());
    }
    recs
}
