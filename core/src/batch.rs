//! Batch ranker: score a whole population and keep the riskiest.
//!
//! Uses the rule-based scorer (not the classifier) and heuristic reasons
//! for every record. Records are scored in parallel; a malformed record
//! is skipped and logged, never fatal to the batch. A customer id appears
//! at most once in the ranking: its highest-probability record wins.

use crate::{
    attribution,
    config::RetentionConfig,
    error::RetentionError,
    features::{normalize, CustomerFeatures},
    risk,
    rules,
    types::{CustomerId, RiskTier},
};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

pub const DUPLICATE_REASON: &str = "duplicate customer id";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedCustomer {
    pub customer_id:       CustomerId,
    pub churn_probability: f64,
    pub churn_risk:        RiskTier,
    pub factors:           Vec<String>,
    pub recommendations:   Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedRecord {
    pub customer_id: CustomerId,
    pub reason:      String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchOutcome {
    /// Descending by probability, at most `top_n` entries.
    pub ranked:       Vec<RankedCustomer>,
    pub scored_count: usize,
    pub skipped:      Vec<SkippedRecord>,
}

pub fn score_record(raw: &CustomerFeatures, config: &RetentionConfig) -> Result<RankedCustomer, RetentionError> {
    raw.validate()?;
    let f = normalize(raw, &config.normalization);
    let probability = rules::rule_based_probability(&f, &config.rules);
    let tier = risk::classify(probability, &config.risk);

    Ok(RankedCustomer {
        customer_id:       f.customer_id.clone(),
        churn_probability: probability,
        churn_risk:        tier,
        factors:           attribution::heuristic_reasons(&f, probability, &config.rules),
        recommendations:   rules::playbook_recommendations(&f, tier, &config.narrative.brand),
    })
}

pub fn rank_batch(population: &[CustomerFeatures], config: &RetentionConfig) -> BatchOutcome {
    let results: Vec<Result<RankedCustomer, SkippedRecord>> = population
        .par_iter()
        .map(|raw| {
            score_record(raw, config).map_err(|e| {
                log::warn!("batch: skipping record {:?}: {e}", raw.customer_id);
                SkippedRecord { customer_id: raw.customer_id.clone(), reason: e.to_string() }
            })
        })
        .collect();

    let mut ranked = Vec::with_capacity(results.len());
    let mut skipped = Vec::new();
    for r in results {
        match r {
            Ok(c) => ranked.push(c),
            Err(s) => skipped.push(s),
        }
    }

    ranked.par_sort_by(|a, b| {
        b.churn_probability
            .total_cmp(&a.churn_probability)
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });

    // Sorted, so the first occurrence of an id is its riskiest record.
    let mut seen = HashSet::with_capacity(ranked.len());
    ranked.retain(|c| {
        if seen.insert(c.customer_id.clone()) {
            return true;
        }
        log::warn!(
            "batch: dropping duplicate record for {} (p={:.3})",
            c.customer_id, c.churn_probability,
        );
        skipped.push(SkippedRecord { customer_id: c.customer_id.clone(), reason: DUPLICATE_REASON.into() });
        false
    });
    let scored_count = ranked.len();

    ranked.truncate(config.batch.top_n);

    log::info!(
        "batch: scored {scored_count} records, skipped {}, kept top {}",
        skipped.len(),
        ranked.len(),
    );

    BatchOutcome { ranked, scored_count, skipped }
}
