//! Intervention simulation and A/B comparison.
//!
//! Simulation uses its own two-term baseline, `simulation_baseline_probability`,
//! distinct from the rule-based scorer. Do not unify them.

use crate::{
    config::SimulationConfig,
    features::{CustomerFeatures, NormalizedFeatures},
    types::CustomerId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionConfig {
    pub name:                 String,
    /// Percentage in [0, 100]; clamped on use.
    #[serde(default)]
    pub planned_discount:     f64,
    #[serde(default)]
    pub loyalty_points_bonus: u64,
}

impl InterventionConfig {
    pub fn new(name: impl Into<String>, planned_discount: f64, loyalty_points_bonus: u64) -> Self {
        Self { name: name.into(), planned_discount, loyalty_points_bonus }
    }

    fn discount_fraction(&self) -> f64 {
        if self.planned_discount.is_finite() {
            self.planned_discount.clamp(0.0, 100.0) / 100.0
        } else {
            0.0
        }
    }
}

/// Monetary inputs shared by every strategy evaluated for one customer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CustomerValue {
    pub avg_order_value:       f64,
    pub yearly_purchase_count: f64,
}

impl CustomerValue {
    /// Monetary figures use the raw values (floored at zero), not the
    /// scoring caps.
    pub fn from_features(f: &CustomerFeatures) -> Self {
        let aov = if f.avg_order_value.is_finite() { f.avg_order_value.max(0.0) } else { 0.0 };
        Self {
            avg_order_value:       aov,
            yearly_purchase_count: f.yearly_purchase_count.max(0) as f64,
        }
    }

    pub fn annual_value(&self) -> f64 {
        self.avg_order_value * self.yearly_purchase_count
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImpactLevel {
    #[serde(rename = "High Impact")]
    High,
    #[serde(rename = "Moderate Impact")]
    Moderate,
    #[serde(rename = "Low Impact")]
    Low,
}

impl ImpactLevel {
    pub fn from_improvement(improvement: f64, cfg: &SimulationConfig) -> Self {
        if improvement > cfg.high_impact_threshold {
            Self::High
        } else if improvement > cfg.moderate_impact_threshold {
            Self::Moderate
        } else {
            Self::Low
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::High     => "High Impact",
            Self::Moderate => "Moderate Impact",
            Self::Low      => "Low Impact",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::High     => "This intervention significantly stabilizes the customer.",
            Self::Moderate => "The intervention helps, but may need further personalization.",
            Self::Low      => "Minimal impact. Consider a more aggressive discount or direct outreach.",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionResult {
    pub name:                     String,
    pub new_churn_probability:    f64,
    pub churn_reduction_absolute: f64,
    pub intervention_cost:        f64,
    pub net_retention_score:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub original_probability: f64,
    pub new_probability:      f64,
    pub improvement:          f64,
    pub risk_reduction_level: ImpactLevel,
    pub impact_description:   String,
    pub intervention_cost:    f64,
    pub net_retention_score:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub customer_id:                CustomerId,
    pub baseline_churn_probability: f64,
    pub strategy_a:                 InterventionResult,
    pub strategy_b:                 InterventionResult,
    pub winner:                     String,
}

/// Two-term simulation baseline in [min_probability, max_probability]:
/// `min(days/90, 1) × 0.5 + (1 − min(count/52, 1)) × 0.3`.
pub fn simulation_baseline_probability(f: &NormalizedFeatures, cfg: &SimulationConfig) -> f64 {
    let recency = (f.days_since_last_purchase as f64 / 90.0).min(1.0);
    let volume = (f.yearly_purchase_count as f64 / 52.0).min(1.0);
    let baseline = recency * cfg.baseline_recency_weight + (1.0 - volume) * cfg.baseline_volume_weight;
    baseline.clamp(cfg.min_probability, cfg.max_probability)
}

/// Evaluate one strategy against a fixed baseline.
pub fn evaluate(
    baseline: f64,
    strategy: &InterventionConfig,
    value: &CustomerValue,
    cfg: &SimulationConfig,
) -> InterventionResult {
    let discount = strategy.discount_fraction();
    let points = strategy.loyalty_points_bonus as f64;

    let discount_impact = discount * cfg.discount_effect;
    let points_impact = (points / cfg.points_saturation).min(1.0) * cfg.points_effect;

    let new_probability = (baseline - discount_impact - points_impact)
        .clamp(cfg.min_probability, cfg.max_probability);
    let reduction = baseline - new_probability;

    let cost = discount * value.avg_order_value + points * cfg.cost_per_point;
    let net_retention_score = reduction * value.annual_value() - cost;

    InterventionResult {
        name:                     strategy.name.clone(),
        new_churn_probability:    new_probability,
        churn_reduction_absolute: reduction,
        intervention_cost:        cost,
        net_retention_score,
    }
}

pub fn simulate(
    baseline: f64,
    strategy: &InterventionConfig,
    value: &CustomerValue,
    cfg: &SimulationConfig,
) -> SimulationResult {
    let r = evaluate(baseline, strategy, value, cfg);
    let level = ImpactLevel::from_improvement(r.churn_reduction_absolute, cfg);
    SimulationResult {
        original_probability: baseline,
        new_probability:      r.new_churn_probability,
        improvement:          r.churn_reduction_absolute,
        risk_reduction_level: level,
        impact_description:   level.description().to_string(),
        intervention_cost:    r.intervention_cost,
        net_retention_score:  r.net_retention_score,
    }
}

/// A wins only on a strictly greater net score; ties go to B.
/// Kept for compatibility with existing comparison reports.
pub fn pick_winner<'a>(a: &'a InterventionResult, b: &'a InterventionResult) -> &'a str {
    if a.net_retention_score > b.net_retention_score { &a.name } else { &b.name }
}

pub fn compare(
    customer_id: &str,
    baseline: f64,
    strategy_a: &InterventionConfig,
    strategy_b: &InterventionConfig,
    value: &CustomerValue,
    cfg: &SimulationConfig,
) -> ComparisonResult {
    let a = evaluate(baseline, strategy_a, value, cfg);
    let b = evaluate(baseline, strategy_b, value, cfg);
    let winner = pick_winner(&a, &b).to_string();

    log::debug!(
        "intervention: {customer_id} A={:.2} B={:.2} winner={winner}",
        a.net_retention_score, b.net_retention_score,
    );

    ComparisonResult {
        customer_id:                customer_id.to_string(),
        baseline_churn_probability: baseline,
        strategy_a:                 a,
        strategy_b:                 b,
        winner,
    }
}
