//! Competitive price adjustment.
//!
//! The competitor table is immutable after load and shared behind an
//! `Arc`. Gaps are recomputed per call and never cached.

use crate::{config::CompetitiveConfig, error::RetentionResult};
use serde::{Deserialize, Serialize};

/// One row of the category → competitor price table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorPrice {
    pub category:         String,
    /// Our own average price for the category.
    pub reference_price:  f64,
    pub competitor_name:  String,
    pub competitor_price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorGap {
    pub category:         String,
    /// (reference − cheapest) / reference. ≤ 0 means no disadvantage.
    pub gap:              f64,
    pub competitor_name:  Option<String>,
    pub competitor_price: f64,
    pub reference_price:  f64,
}

impl CompetitorGap {
    pub fn none(category: &str) -> Self {
        Self {
            category:         category.to_string(),
            gap:              0.0,
            competitor_name:  None,
            competitor_price: 0.0,
            reference_price:  0.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct CompetitorPricesFile {
    prices: Vec<CompetitorPrice>,
}

#[derive(Debug, Clone, Default)]
pub struct CompetitorTable {
    prices: Vec<CompetitorPrice>,
}

impl CompetitorTable {
    pub fn new(prices: Vec<CompetitorPrice>) -> Self {
        Self { prices }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Load `{ "prices": [...] }` from a JSON file.
    pub fn from_json_file(path: &str) -> RetentionResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let file: CompetitorPricesFile = serde_json::from_str(&content)?;
        log::info!("competitor: loaded {} price records from {path}", file.prices.len());
        Ok(Self::new(file.prices))
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    pub fn records(&self) -> &[CompetitorPrice] {
        &self.prices
    }

    /// Price gap against the cheapest competitor in `category`.
    /// Without `reference_price`, the first recorded reference for the
    /// category is used.
    pub fn gap(&self, category: &str, reference_price: Option<f64>) -> CompetitorGap {
        let key = category.trim().to_lowercase();
        let rows: Vec<&CompetitorPrice> = self.prices
            .iter()
            .filter(|p| p.category.trim().to_lowercase() == key)
            .collect();

        let Some(first) = rows.first() else {
            return CompetitorGap::none(category);
        };

        let cheapest = rows.iter()
            .filter(|p| p.competitor_price.is_finite())
            .min_by(|a, b| a.competitor_price.total_cmp(&b.competitor_price));
        let Some(cheapest) = cheapest else {
            return CompetitorGap::none(category);
        };

        let reference = reference_price.unwrap_or(first.reference_price);
        if !reference.is_finite() || reference <= 0.0 {
            return CompetitorGap::none(category);
        }

        CompetitorGap {
            category:         category.to_string(),
            gap:              (reference - cheapest.competitor_price) / reference,
            competitor_name:  Some(cheapest.competitor_name.clone()),
            competitor_price: cheapest.competitor_price,
            reference_price:  reference,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjustedProbability {
    pub probability:      f64,
    pub competitive_risk: bool,
    pub gap:              CompetitorGap,
}

/// Add the fixed bump when the competitor is materially cheaper, then
/// clamp to [0, max_probability].
pub fn apply_competitive_adjustment(
    probability: f64,
    gap: CompetitorGap,
    cfg: &CompetitiveConfig,
) -> AdjustedProbability {
    let competitive_risk = gap.gap > cfg.gap_threshold;
    let bumped = if competitive_risk { probability + cfg.probability_bump } else { probability };

    if competitive_risk {
        log::debug!(
            "competitor: {} is {:.1}% cheaper in {}, +{:.2}",
            gap.competitor_name.as_deref().unwrap_or("unknown"),
            gap.gap * 100.0,
            gap.category,
            cfg.probability_bump,
        );
    }

    AdjustedProbability {
        probability: bumped.clamp(0.0, cfg.max_probability),
        competitive_risk,
        gap,
    }
}
