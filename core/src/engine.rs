//! The retention engine: the public operations.
//!
//! PIPELINE (fixed order):
//!   1. Normalize raw features
//!   2. Score (classifier, falling back to rules)
//!   3. Competitive adjustment
//!   4. Risk tier + confidence
//!   5. Attribution
//!   6. Explanation
//!
//! RULES:
//!   - Every operation normalizes its own input; nothing is shared per call.
//!   - Shared resources (config, classifier, competitor table) are read-only.
//!   - Scoring, simulation, comparison and ranking never return an error;
//!     only customer lookup can fail.

use crate::{
    attribution::{self, AttributionResult},
    batch::{self, BatchOutcome},
    competitor::{apply_competitive_adjustment, CompetitorGap, CompetitorTable},
    config::RetentionConfig,
    directory::{lookup, CustomerDirectory},
    error::RetentionResult,
    features::{normalize, CustomerFeatures},
    intervention::{self, ComparisonResult, CustomerValue, InterventionConfig, SimulationResult},
    model::{self, ChurnClassifier, ModelScorer, ScoreSource},
    narrative::{Explanation, ExplanationRequest, ExplanationSynthesizer, NarrativeGenerator, OutreachDraft},
    risk::{self, ChurnScore},
    types::{CustomerId, RiskTier},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub customer_id: CustomerId,
    pub score:       ChurnScore,
    pub source:      ScoreSource,
    /// Present only when the competitive-risk flag is set.
    pub competitor:  Option<CompetitorGap>,
    pub attribution: AttributionResult,
    pub explanation: Explanation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_customers:       usize,
    pub avg_churn_probability: f64,
    pub high_risk_count:       usize,
    pub medium_risk_count:     usize,
    pub low_risk_count:        usize,
    pub total_revenue_est:     f64,
}

pub struct RetentionEngine {
    config:      Arc<RetentionConfig>,
    scorer:      ModelScorer,
    competitors: Arc<CompetitorTable>,
    narrator:    ExplanationSynthesizer,
}

impl RetentionEngine {
    pub fn new(
        config: RetentionConfig,
        competitors: Arc<CompetitorTable>,
        classifier: Option<Arc<dyn ChurnClassifier>>,
        generator: Option<Arc<dyn NarrativeGenerator>>,
    ) -> Self {
        let scorer = ModelScorer::with_timeout(classifier, config.rules.clone(), config.classifier_timeout_ms);
        let narrator = ExplanationSynthesizer::new(generator, config.narrative.clone());
        Self {
            config: Arc::new(config),
            scorer,
            competitors,
            narrator,
        }
    }

    /// Build from the data/ directory: `retention.json`,
    /// `competitor_prices.json`, and the configured classifier artifact.
    /// Missing optional inputs degrade to rule-based scoring and an
    /// empty competitor table.
    pub fn build(data_dir: &str, generator: Option<Arc<dyn NarrativeGenerator>>) -> anyhow::Result<Self> {
        let config = RetentionConfig::load(data_dir)?;

        let competitor_path = format!("{data_dir}/competitor_prices.json");
        let competitors = match CompetitorTable::from_json_file(&competitor_path) {
            Ok(t) => t,
            Err(e) => {
                log::warn!("engine: no competitor data loaded from {competitor_path}: {e}");
                CompetitorTable::empty()
            }
        };

        let classifier = model::load_classifier(config.classifier_path.as_deref());
        Ok(Self::new(config, Arc::new(competitors), classifier, generator))
    }

    /// Default config, no competitors, no classifier, no narrative service.
    pub fn build_test() -> Self {
        Self::new(RetentionConfig::default(), Arc::new(CompetitorTable::empty()), None, None)
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    pub fn competitors(&self) -> &CompetitorTable {
        &self.competitors
    }

    // ── score ────────────────────────────────────────────────────────────

    pub fn score(&self, features: &CustomerFeatures) -> Prediction {
        self.score_with_reference(features, None)
    }

    /// Score against an explicit reference price for the competitor gap.
    pub fn score_with_reference(&self, features: &CustomerFeatures, reference_price: Option<f64>) -> Prediction {
        let cfg = &self.config;
        let f = normalize(features, &cfg.normalization);

        let scored = self.scorer.score(&f);
        let base = scored.probability.clamp(0.0, cfg.competitive.max_probability);

        let gap = self.competitors.gap(&f.primary_category, reference_price);
        let adjusted = apply_competitive_adjustment(base, gap, &cfg.competitive);
        let score = risk::churn_score(adjusted.probability, &cfg.risk);

        let classifier = self.scorer.classifier()
            .filter(|_| scored.source == ScoreSource::Model)
            .map(|c| &**c);
        let attribution = attribution::extract(&f, score.probability, classifier, &cfg.rules);

        let competitor = adjusted.competitive_risk.then_some(adjusted.gap);
        let explanation = self.narrator.explain(&ExplanationRequest {
            features,
            probability: score.probability,
            tier: score.tier,
            attribution: &attribution,
            competitor: competitor.as_ref(),
        });

        log::info!(
            "engine: scored {} p={:.3} tier={} source={:?} competitor_risk={}",
            f.customer_id, score.probability, score.tier, scored.source, competitor.is_some(),
        );

        Prediction {
            customer_id: f.customer_id,
            score,
            source: scored.source,
            competitor,
            attribution,
            explanation,
        }
    }

    // ── simulate / compare ──────────────────────────────────────────────

    pub fn simulation_baseline(&self, features: &CustomerFeatures) -> f64 {
        let f = normalize(features, &self.config.normalization);
        intervention::simulation_baseline_probability(&f, &self.config.simulation)
    }

    pub fn simulate(&self, features: &CustomerFeatures, planned_discount: f64, loyalty_points_bonus: u64) -> SimulationResult {
        let baseline = self.simulation_baseline(features);
        let strategy = InterventionConfig::new("simulation", planned_discount, loyalty_points_bonus);
        intervention::simulate(
            baseline,
            &strategy,
            &CustomerValue::from_features(features),
            &self.config.simulation,
        )
    }

    pub fn compare(
        &self,
        features: &CustomerFeatures,
        strategy_a: &InterventionConfig,
        strategy_b: &InterventionConfig,
    ) -> ComparisonResult {
        let baseline = self.simulation_baseline(features);
        intervention::compare(
            features.customer_id.trim(),
            baseline,
            strategy_a,
            strategy_b,
            &CustomerValue::from_features(features),
            &self.config.simulation,
        )
    }

    // ── batch ────────────────────────────────────────────────────────────

    pub fn rank_batch(&self, population: &[CustomerFeatures]) -> BatchOutcome {
        batch::rank_batch(population, &self.config)
    }

    /// Tier counts, mean probability and estimated annual revenue over a
    /// population, using the model scorer's batch path.
    pub fn portfolio_summary(&self, population: &[CustomerFeatures]) -> PortfolioSummary {
        let normalized: Vec<_> = population
            .iter()
            .map(|c| normalize(c, &self.config.normalization))
            .collect();
        let scores = self.scorer.score_batch(&normalized);

        let mut summary = PortfolioSummary {
            total_customers:       population.len(),
            avg_churn_probability: 0.0,
            high_risk_count:       0,
            medium_risk_count:     0,
            low_risk_count:        0,
            total_revenue_est:     0.0,
        };

        let mut total_probability = 0.0;
        for (raw, scored) in population.iter().zip(scores.iter()) {
            match risk::classify(scored.probability, &self.config.risk) {
                RiskTier::High   => summary.high_risk_count += 1,
                RiskTier::Medium => summary.medium_risk_count += 1,
                RiskTier::Low    => summary.low_risk_count += 1,
            }
            total_probability += scored.probability;
            summary.total_revenue_est += CustomerValue::from_features(raw).annual_value();
        }
        if !population.is_empty() {
            summary.avg_churn_probability = total_probability / population.len() as f64;
        }
        summary
    }

    // ── outreach ─────────────────────────────────────────────────────────

    pub fn draft_outreach(&self, features: &CustomerFeatures, intervention_type: &str, details: &str) -> OutreachDraft {
        self.narrator.draft_outreach(features, intervention_type, details)
    }

    // ── lookups ──────────────────────────────────────────────────────────

    pub fn score_customer(&self, directory: &dyn CustomerDirectory, customer_id: &str) -> RetentionResult<Prediction> {
        let features = lookup(directory, customer_id)?;
        Ok(self.score(&features))
    }

    pub fn simulate_customer(
        &self,
        directory: &dyn CustomerDirectory,
        customer_id: &str,
        planned_discount: f64,
        loyalty_points_bonus: u64,
    ) -> RetentionResult<SimulationResult> {
        let features = lookup(directory, customer_id)?;
        Ok(self.simulate(&features, planned_discount, loyalty_points_bonus))
    }

    pub fn compare_customer(
        &self,
        directory: &dyn CustomerDirectory,
        customer_id: &str,
        strategy_a: &InterventionConfig,
        strategy_b: &InterventionConfig,
    ) -> RetentionResult<ComparisonResult> {
        let features = lookup(directory, customer_id)?;
        Ok(self.compare(&features, strategy_a, strategy_b))
    }
}
