use retention_core::{
    config::{NormalizationCaps, SimulationConfig},
    directory::InMemoryDirectory,
    engine::RetentionEngine,
    error::RetentionError,
    features::{normalize, CustomerFeatures},
    intervention::{self, CustomerValue, ImpactLevel, InterventionConfig, InterventionResult},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn shopper() -> CustomerFeatures {
    CustomerFeatures {
        customer_id:              "I-1".into(),
        primary_category:         "Grocery".into(),
        yearly_purchase_count:    26,
        avg_gap_days:             14,
        avg_order_value:          100.0,
        days_since_last_purchase: 45,
        discount_sensitivity:     "medium".into(),
        online_ratio:             0.4,
    }
}

fn result(name: &str, net: f64) -> InterventionResult {
    InterventionResult {
        name:                     name.into(),
        new_churn_probability:    0.3,
        churn_reduction_absolute: 0.1,
        intervention_cost:        10.0,
        net_retention_score:      net,
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!((actual - expected).abs() < 1e-9, "expected {expected}, got {actual}");
}

// ── Simulation ───────────────────────────────────────────────────────────────

/// Baseline 0.5, 10% discount, no points: 0.5 − 0.04 = 0.46.
#[test]
fn ten_percent_discount_is_low_impact() {
    let cfg = SimulationConfig::default();
    let value = CustomerValue { avg_order_value: 100.0, yearly_purchase_count: 26.0 };
    let r = intervention::simulate(0.5, &InterventionConfig::new("discount", 10.0, 0), &value, &cfg);

    assert_close(r.original_probability, 0.5);
    assert_close(r.new_probability, 0.46);
    assert_close(r.improvement, 0.04);
    assert_eq!(r.risk_reduction_level, ImpactLevel::Low);
    assert_eq!(r.risk_reduction_level.label(), "Low Impact");
    assert_eq!(
        r.impact_description,
        "Minimal impact. Consider a more aggressive discount or direct outreach.",
    );
}

#[test]
fn impact_levels_follow_improvement() {
    let cfg = SimulationConfig::default();
    let value = CustomerValue { avg_order_value: 100.0, yearly_purchase_count: 26.0 };

    // 80% discount → 0.32 removed.
    let high = intervention::simulate(0.9, &InterventionConfig::new("deep", 80.0, 0), &value, &cfg);
    assert_eq!(high.risk_reduction_level, ImpactLevel::High);

    // 30% discount + 1000 points → 0.12 + 0.10.
    let moderate = intervention::simulate(0.6, &InterventionConfig::new("mixed", 30.0, 1000), &value, &cfg);
    assert_close(moderate.improvement, 0.22);
    assert_eq!(moderate.risk_reduction_level, ImpactLevel::Moderate);
}

#[test]
fn new_probability_is_floored() {
    let cfg = SimulationConfig::default();
    let value = CustomerValue { avg_order_value: 100.0, yearly_purchase_count: 26.0 };
    let r = intervention::simulate(0.05, &InterventionConfig::new("all-in", 100.0, 5000), &value, &cfg);

    assert_close(r.new_probability, 0.01);
    assert_close(r.improvement, 0.04);
}

#[test]
fn points_saturate_at_one_thousand() {
    let cfg = SimulationConfig::default();
    let value = CustomerValue { avg_order_value: 100.0, yearly_purchase_count: 26.0 };
    let a = intervention::evaluate(0.8, &InterventionConfig::new("a", 0.0, 1000), &value, &cfg);
    let b = intervention::evaluate(0.8, &InterventionConfig::new("b", 0.0, 4000), &value, &cfg);

    assert_close(a.new_churn_probability, b.new_churn_probability);
    assert!(b.intervention_cost > a.intervention_cost);
}

#[test]
fn cost_and_net_score_use_customer_value() {
    let cfg = SimulationConfig::default();
    let value = CustomerValue { avg_order_value: 100.0, yearly_purchase_count: 26.0 };
    let r = intervention::evaluate(0.5, &InterventionConfig::new("d", 10.0, 500), &value, &cfg);

    // 0.04 + 0.05 reduction, cost 10 + 5, annual value 2600.
    assert_close(r.churn_reduction_absolute, 0.09);
    assert_close(r.intervention_cost, 15.0);
    assert_close(r.net_retention_score, 0.09 * 2600.0 - 15.0);
}

#[test]
fn engine_simulation_uses_two_term_baseline() {
    let engine = RetentionEngine::build_test();
    let raw = shopper();

    // 45/90 × 0.5 + (1 − 26/52) × 0.3
    let expected = 0.25 + 0.15;
    assert_close(engine.simulation_baseline(&raw), expected);

    let f = normalize(&raw, &NormalizationCaps::default());
    let simulated = intervention::simulation_baseline_probability(&f, &SimulationConfig::default());
    assert_close(simulated, expected);

    let r = engine.simulate(&raw, 10.0, 0);
    assert_close(r.original_probability, expected);
    assert_close(r.new_probability, expected - 0.04);
}

// ── A/B comparison ───────────────────────────────────────────────────────────

#[test]
fn higher_net_score_wins() {
    let a = result("Strategy A", 120.0);
    let b = result("Strategy B", 80.0);
    assert_eq!(intervention::pick_winner(&a, &b), "Strategy A");
    assert_eq!(intervention::pick_winner(&b, &a), "Strategy A");
}

#[test]
fn exact_tie_goes_to_second_strategy() {
    let a = result("Strategy A", 100.0);
    let b = result("Strategy B", 100.0);
    assert_eq!(intervention::pick_winner(&a, &b), "Strategy B");
}

#[test]
fn compare_evaluates_both_against_one_baseline() {
    let engine = RetentionEngine::build_test();
    let a = InterventionConfig::new("Points only", 0.0, 1000);
    let b = InterventionConfig::new("Deep discount", 40.0, 0);

    let cmp = engine.compare(&shopper(), &a, &b);
    assert_eq!(cmp.customer_id, "I-1");
    assert_close(cmp.baseline_churn_probability, 0.4);
    assert_eq!(cmp.strategy_a.name, "Points only");
    assert_eq!(cmp.strategy_b.name, "Deep discount");

    let expected = intervention::pick_winner(&cmp.strategy_a, &cmp.strategy_b).to_string();
    assert_eq!(cmp.winner, expected);
}

#[test]
fn unknown_customer_is_reported_not_found() {
    let engine = RetentionEngine::build_test();
    let directory = InMemoryDirectory::new(vec![shopper()]);

    let err = engine.simulate_customer(&directory, "NOPE", 10.0, 0).unwrap_err();
    assert!(matches!(err, RetentionError::CustomerNotFound { ref customer_id } if customer_id == "NOPE"));

    let ok = engine.simulate_customer(&directory, "I-1", 10.0, 0).unwrap();
    assert_close(ok.original_probability, 0.4);

    let a = InterventionConfig::new("a", 5.0, 0);
    let b = InterventionConfig::new("b", 0.0, 100);
    assert!(engine.compare_customer(&directory, "NOPE", &a, &b).is_err());
    assert!(engine.score_customer(&directory, "NOPE").is_err());
}
