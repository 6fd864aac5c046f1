//! Attribution extractor: why did a customer get this score?
//!
//! Modes are tried in order: `Model` (classifier attributions),
//! `Heuristic` (feature thresholds + rule breakdown), and finally the
//! explicit `NoData` entry. A mode that yields nothing passes control on.

use crate::{
    config::RuleWeights,
    features::NormalizedFeatures,
    model::{feature_vector, ChurnClassifier},
    rules,
    types::DiscountSensitivity,
};
use serde::{Deserialize, Serialize};

const MODEL_TOP_K: usize = 5;
const GENERIC_REASON_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributionMode {
    Model,
    Heuristic,
    NoData,
}

pub const ATTRIBUTION_MODES: [AttributionMode; 3] = [
    AttributionMode::Model,
    AttributionMode::Heuristic,
    AttributionMode::NoData,
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    /// Signed: positive raises churn probability.
    pub impact:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributionResult {
    pub mode:           AttributionMode,
    /// Ranked by |impact| descending. Non-empty when produced by `extract`.
    pub contributions:  Vec<FeatureContribution>,
    /// One-sentence templated explanation of the primary driver.
    pub explanation:    String,
    /// Heuristic reason strings (empty in model mode).
    pub reasons:        Vec<String>,
}

impl AttributionResult {
    /// The highest-|impact| contribution. `None` only for a hand-built
    /// result with no contributions.
    pub fn primary_driver(&self) -> Option<&FeatureContribution> {
        self.contributions.first()
    }

    fn no_data() -> Self {
        Self {
            mode:          AttributionMode::NoData,
            contributions: vec![FeatureContribution { feature: "no data".into(), impact: 0.0 }],
            explanation:   "No usable feature data was available to explain this score.".into(),
            reasons:       Vec::new(),
        }
    }
}

pub fn extract(
    f: &NormalizedFeatures,
    probability: f64,
    classifier: Option<&dyn ChurnClassifier>,
    weights: &RuleWeights,
) -> AttributionResult {
    for mode in ATTRIBUTION_MODES {
        let attempt = match mode {
            AttributionMode::Model     => classifier.and_then(|c| model_attribution(f, c)),
            AttributionMode::Heuristic => heuristic_attribution(f, probability, weights),
            AttributionMode::NoData    => Some(AttributionResult::no_data()),
        };
        if let Some(result) = attempt {
            return result;
        }
    }
    AttributionResult::no_data()
}

// ── Model mode ───────────────────────────────────────────────────────────────

pub fn model_attribution(f: &NormalizedFeatures, classifier: &dyn ChurnClassifier) -> Option<AttributionResult> {
    let raw = match classifier.attributions(&feature_vector(f)) {
        Ok(raw) => raw,
        Err(e) => {
            log::warn!("attribution: classifier attribution failed for {}: {e}", f.customer_id);
            return None;
        }
    };

    let mut contributions: Vec<FeatureContribution> = raw
        .into_iter()
        .filter(|(_, impact)| impact.is_finite())
        .map(|(name, impact)| FeatureContribution { feature: clean_feature_name(&name), impact })
        .collect();
    rank(&mut contributions);
    contributions.truncate(MODEL_TOP_K);

    if contributions.iter().all(|c| c.impact == 0.0) {
        return None;
    }

    let explanation = driver_sentence(contributions.first()?);
    Some(AttributionResult {
        mode: AttributionMode::Model,
        contributions,
        explanation,
        reasons: Vec::new(),
    })
}

/// `num__days_since_last_purchase` → `days since last purchase`.
pub fn clean_feature_name(raw: &str) -> String {
    let base = raw.rsplit_once("__").map(|(_, rest)| rest).unwrap_or(raw);
    base.replace('_', " ").trim().to_string()
}

// ── Heuristic mode ───────────────────────────────────────────────────────────

pub fn heuristic_reasons(f: &NormalizedFeatures, probability: f64, weights: &RuleWeights) -> Vec<String> {
    let mut reasons = Vec::new();

    let days = f.days_since_last_purchase;
    if days > 60 {
        reasons.push(format!("Long gap since last purchase ({days} days)"));
    } else if days > 30 {
        reasons.push("Recent engagement has dropped".to_string());
    }

    if f.avg_gap_days > 21 {
        reasons.push("Infrequent purchase pattern".to_string());
    }
    if f.yearly_purchase_count < 6 {
        reasons.push("Very low yearly purchase volume".to_string());
    }
    if f.discount_sensitivity == DiscountSensitivity::High {
        reasons.push("High sensitivity to discounts increases churn risk if no deals available".to_string());
    }
    if weights.is_discretionary(&f.primary_category) {
        reasons.push(format!(
            "Category '{}' typically has higher churn rates",
            title_case(&f.primary_category)
        ));
    }
    if f.online_ratio > 0.8 {
        reasons.push("High dependence on online channel may indicate lower brand loyalty".to_string());
    }

    if probability > GENERIC_REASON_THRESHOLD && reasons.is_empty() {
        reasons.push("Combination of behavioral factors indicates high risk".to_string());
    }
    reasons
}

pub fn heuristic_attribution(
    f: &NormalizedFeatures,
    probability: f64,
    weights: &RuleWeights,
) -> Option<AttributionResult> {
    let reasons = heuristic_reasons(f, probability, weights);

    let breakdown = rules::score_breakdown(f, weights);
    let mut contributions: Vec<FeatureContribution> = breakdown
        .weighted_terms()
        .into_iter()
        .filter(|(_, impact)| *impact != 0.0)
        .map(|(name, impact)| FeatureContribution { feature: clean_feature_name(name), impact })
        .collect();
    rank(&mut contributions);

    let explanation = match (contributions.first(), reasons.first()) {
        (Some(top), _) => driver_sentence(top),
        (None, Some(reason)) => format!("{reason}."),
        (None, None) => return None,
    };
    if contributions.is_empty() {
        contributions.push(FeatureContribution { feature: "behavioral pattern".into(), impact: probability });
    }

    Some(AttributionResult {
        mode: AttributionMode::Heuristic,
        contributions,
        explanation,
        reasons,
    })
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rank(contributions: &mut [FeatureContribution]) {
    contributions.sort_by(|a, b| {
        b.impact.abs()
            .total_cmp(&a.impact.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
}

fn driver_sentence(top: &FeatureContribution) -> String {
    let direction = if top.impact >= 0.0 { "increased" } else { "reduced" };
    format!(
        "The churn prediction is driven primarily by {}, which {direction} the probability.",
        top.feature
    )
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
