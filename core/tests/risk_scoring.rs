//! Normalizer, rule-based scorer, competitive adjustment and risk tiers.

use retention_core::{
    competitor::{apply_competitive_adjustment, CompetitorGap, CompetitorPrice, CompetitorTable},
    config::{CompetitiveConfig, NormalizationCaps, RetentionConfig, RiskThresholds, RuleWeights},
    engine::RetentionEngine,
    features::{normalize, CustomerFeatures},
    risk,
    rules,
    types::{DiscountSensitivity, RiskTier},
};
use std::sync::Arc;

// ── Helpers ──────────────────────────────────────────────────────────────────

fn customer(
    id: &str,
    category: &str,
    days_since_last: i64,
    yearly_count: i64,
    avg_gap: i64,
    sensitivity: &str,
    online_ratio: f64,
) -> CustomerFeatures {
    CustomerFeatures {
        customer_id:              id.into(),
        primary_category:         category.into(),
        yearly_purchase_count:    yearly_count,
        avg_gap_days:             avg_gap,
        avg_order_value:          80.0,
        days_since_last_purchase: days_since_last,
        discount_sensitivity:     sensitivity.into(),
        online_ratio,
    }
}

fn grocery_competitors() -> Arc<CompetitorTable> {
    Arc::new(CompetitorTable::new(vec![
        CompetitorPrice {
            category:         "Grocery".into(),
            reference_price:  120.0,
            competitor_name:  "ValueMart".into(),
            competitor_price: 105.0,
        },
        CompetitorPrice {
            category:         "Grocery".into(),
            reference_price:  120.0,
            competitor_name:  "CityBasket".into(),
            competitor_price: 114.0,
        },
    ]))
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

// ── Normalizer ───────────────────────────────────────────────────────────────

#[test]
fn normalizer_clamps_every_field() {
    let caps = NormalizationCaps::default();
    let raw = CustomerFeatures {
        customer_id:              "  C-1 ".into(),
        primary_category:         "  Electronics ".into(),
        yearly_purchase_count:    400,
        avg_gap_days:             -5,
        avg_order_value:          9_999.0,
        days_since_last_purchase: 365,
        discount_sensitivity:     "Very High".into(),
        online_ratio:             1.7,
    };

    let f = normalize(&raw, &caps);
    assert_eq!(f.customer_id, "C-1");
    assert_eq!(f.primary_category, "electronics");
    assert_eq!(f.yearly_purchase_count, 52);
    assert_eq!(f.avg_gap_days, 0);
    assert_close(f.avg_order_value, 200.0);
    assert_eq!(f.days_since_last_purchase, 90);
    assert_eq!(f.discount_sensitivity, DiscountSensitivity::High);
    assert_close(f.online_ratio, 1.0);
}

#[test]
fn normalizer_repairs_missing_and_non_finite_values() {
    let caps = NormalizationCaps::default();
    let mut raw = CustomerFeatures::with_defaults("C-2");
    raw.primary_category = "   ".into();
    raw.avg_order_value = f64::NAN;
    raw.online_ratio = f64::INFINITY;
    raw.discount_sensitivity = "whatever".into();

    let f = normalize(&raw, &caps);
    assert_eq!(f.primary_category, "grocery");
    assert_close(f.avg_order_value, 0.0);
    assert_close(f.online_ratio, 0.5);
    assert_eq!(f.discount_sensitivity, DiscountSensitivity::Medium);
}

#[test]
fn defaults_apply_to_sparse_json_records() {
    let raw: CustomerFeatures = serde_json::from_str(r#"{"customer_id": "C-3"}"#).unwrap();
    assert_eq!(raw.primary_category, "grocery");
    assert_eq!(raw.yearly_purchase_count, 12);
    assert_eq!(raw.avg_gap_days, 30);
    assert_eq!(raw.days_since_last_purchase, 30);
    assert_eq!(raw.discount_sensitivity, "medium");
    assert_close(raw.online_ratio, 0.5);
}

/// normalize(normalize(x)) == normalize(x) across a spread of inputs.
#[test]
fn normalizer_is_idempotent() {
    let caps = NormalizationCaps::default();
    let inputs = [
        customer("A", "Grocery", 9, 56, 59, "Low", 0.08),
        customer("B", " PHARMACY ", -4, -1, 1000, "very low", -0.3),
        customer("C", "", 400, 3, 12, "HIGH", 2.0),
        customer("D", "Seasonal Items", 45, 20, 21, "medium", 0.71),
    ];
    for raw in &inputs {
        let once = normalize(raw, &caps);
        let twice = normalize(&once.to_raw(), &caps);
        assert_eq!(once, twice, "normalization of {} is not idempotent", raw.customer_id);
    }
}

// ── Rule-based scorer ────────────────────────────────────────────────────────

#[test]
fn rule_scorer_stays_within_unit_interval() {
    let caps = NormalizationCaps::default();
    let weights = RuleWeights::default();
    for days in [0, 30, 90, 500] {
        for count in [0, 6, 52, 200] {
            for gap in [0, 15, 30, 90] {
                for sens in ["low", "medium", "high"] {
                    for online in [0.0, 0.75, 1.0] {
                        for cat in ["electronics", "pharmacy", "grocery", "toys"] {
                            let f = normalize(&customer("X", cat, days, count, gap, sens, online), &caps);
                            let p = rules::rule_based_probability(&f, &weights);
                            assert!((0.0..=1.0).contains(&p), "p={p} out of range for {f:?}");
                        }
                    }
                }
            }
        }
    }
}

/// Worked example: 0.04 recency + 0.25 frequency, grocery × 0.9.
#[test]
fn rule_scorer_matches_worked_example() {
    let f = normalize(
        &customer("S5", "Grocery", 9, 56, 59, "Low", 0.08),
        &NormalizationCaps::default(),
    );
    let b = rules::score_breakdown(&f, &RuleWeights::default());
    assert_close(b.recency, 0.04);
    assert_close(b.frequency, 0.25);
    assert_close(b.volume, 0.0);
    assert_close(b.discount_sensitivity, 0.0);
    assert_close(b.online_channel, 0.0);
    assert_close(b.category_multiplier, 0.9);
    assert_close(b.probability, 0.261);
}

#[test]
fn category_multipliers_order_discretionary_above_essential() {
    let caps = NormalizationCaps::default();
    let weights = RuleWeights::default();
    let score = |cat: &str| {
        rules::rule_based_probability(&normalize(&customer("M", cat, 40, 20, 14, "medium", 0.5), &caps), &weights)
    };

    let essential = score("Pharmacy");
    let grocery = score("Grocery");
    let neutral = score("Seasonal Items");
    let discretionary = score("Electronics");

    assert!(essential < grocery, "essential {essential} should be below grocery {grocery}");
    assert!(grocery < neutral, "grocery {grocery} should be below unlisted {neutral}");
    assert!(neutral < discretionary, "unlisted {neutral} should be below discretionary {discretionary}");
    assert_close(discretionary / neutral, 1.2);
}

#[test]
fn online_term_only_fires_above_threshold() {
    let caps = NormalizationCaps::default();
    let weights = RuleWeights::default();
    let at = normalize(&customer("O", "toys", 10, 30, 10, "low", 0.7), &caps);
    let above = normalize(&customer("O", "toys", 10, 30, 10, "low", 0.9), &caps);

    assert_close(rules::score_breakdown(&at, &weights).online_channel, 0.0);
    assert_close(rules::score_breakdown(&above, &weights).online_channel, 0.09);
}

// ── Competitive adjustment ───────────────────────────────────────────────────

#[test]
fn competitive_adjustment_is_bounded() {
    let cfg = CompetitiveConfig::default();
    for p in [0.0, 0.3, 0.85, 0.9, 0.99, 1.0] {
        for gap in [-0.5, 0.0, 0.10, 0.11, 0.5] {
            let g = CompetitorGap { gap, ..CompetitorGap::none("grocery") };
            let adjusted = apply_competitive_adjustment(p, g, &cfg);
            assert!(
                (0.0..=0.99).contains(&adjusted.probability),
                "adjusted p={} out of range (p={p}, gap={gap})",
                adjusted.probability,
            );
        }
    }
}

#[test]
fn gap_of_exactly_ten_percent_does_not_bump() {
    let cfg = CompetitiveConfig::default();
    let g = CompetitorGap { gap: 0.10, ..CompetitorGap::none("grocery") };
    let adjusted = apply_competitive_adjustment(0.3, g, &cfg);
    assert!(!adjusted.competitive_risk);
    assert_close(adjusted.probability, 0.3);
}

#[test]
fn gap_uses_cheapest_competitor_and_first_reference() {
    let table = grocery_competitors();
    let gap = table.gap("grocery", None);
    assert_eq!(gap.competitor_name.as_deref(), Some("ValueMart"));
    assert_close(gap.gap, 0.125);

    let unknown = table.gap("electronics", None);
    assert_close(unknown.gap, 0.0);
    assert!(unknown.competitor_name.is_none());

    let bad_reference = table.gap("grocery", Some(0.0));
    assert_close(bad_reference.gap, 0.0);
}

/// A Grocery shopper with a competitor 12.5% cheaper: 0.261 + 0.15 bump,
/// and the explanation names the competitor.
#[test]
fn competitor_bump_reaches_probability_and_explanation() {
    let engine = RetentionEngine::new(RetentionConfig::default(), grocery_competitors(), None, None);
    let raw = customer("S5", "Grocery", 9, 56, 59, "Low", 0.08);

    let prediction = engine.score(&raw);
    assert_close(prediction.score.probability, 0.411);
    assert_eq!(prediction.score.tier, RiskTier::Medium);

    let competitor = prediction.competitor.as_ref().expect("competitive risk flagged");
    assert_eq!(competitor.competitor_name.as_deref(), Some("ValueMart"));
    assert!(
        prediction.explanation.key_factors.iter().any(|k| k.contains("ValueMart")),
        "key factors should name the competitor: {:?}",
        prediction.explanation.key_factors,
    );
    assert!(
        prediction.explanation.recommended_actions.iter().any(|a| a.contains("price match")),
        "template should recommend a price match: {:?}",
        prediction.explanation.recommended_actions,
    );
}

#[test]
fn no_competitor_data_means_no_bump() {
    let engine = RetentionEngine::build_test();
    let prediction = engine.score(&customer("S5", "Grocery", 9, 56, 59, "Low", 0.08));
    assert_close(prediction.score.probability, 0.261);
    assert!(prediction.competitor.is_none());
}

// ── Risk classifier ──────────────────────────────────────────────────────────

#[test]
fn tier_boundaries_are_inclusive_lower_bounds() {
    let t = RiskThresholds::default();
    assert_eq!(risk::classify(0.0, &t), RiskTier::Low);
    assert_eq!(risk::classify(0.399, &t), RiskTier::Low);
    assert_eq!(risk::classify(0.4, &t), RiskTier::Medium);
    assert_eq!(risk::classify(0.699, &t), RiskTier::Medium);
    assert_eq!(risk::classify(0.7, &t), RiskTier::High);
    assert_eq!(risk::classify(0.99, &t), RiskTier::High);
}

#[test]
fn tier_is_monotonic_in_probability() {
    let t = RiskThresholds::default();
    let mut previous = RiskTier::Low;
    for i in 0..=99 {
        let tier = risk::classify(i as f64 / 100.0, &t);
        assert!(tier >= previous, "tier dropped from {previous} to {tier} at p={}", i as f64 / 100.0);
        previous = tier;
    }
}

#[test]
fn confidence_is_fixed_per_tier() {
    let t = RiskThresholds::default();
    assert_close(risk::churn_score(0.9, &t).confidence, 0.85);
    assert_close(risk::churn_score(0.5, &t).confidence, 0.75);
    assert_close(risk::churn_score(0.1, &t).confidence, 0.80);
}
