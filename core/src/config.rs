//! Engine configuration.
//!
//! Every section carries serde defaults equal to the production constants,
//! so a partial `retention.json` only needs the keys it overrides.
//! In tests, use `RetentionConfig::default()`.

use serde::{Deserialize, Serialize};

// ── Normalization ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationCaps {
    pub max_days_since_last:  i64,
    pub max_avg_gap_days:     i64,
    pub max_yearly_purchases: i64,
    pub max_order_value:      f64,
}

impl Default for NormalizationCaps {
    fn default() -> Self {
        Self {
            max_days_since_last:  90,
            max_avg_gap_days:     30,
            max_yearly_purchases: 52,
            max_order_value:      200.0,
        }
    }
}

// ── Rule-based scorer ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleWeights {
    /// Days at which recency risk saturates.
    pub recency_horizon_days: f64,
    pub recency_weight:       f64,
    /// Gap at which frequency risk saturates.
    pub frequency_horizon_days: f64,
    pub frequency_weight:     f64,
    /// Yearly purchases at which volume risk reaches zero.
    pub volume_saturation:    f64,
    pub volume_weight:        f64,
    // Sensitivity terms are added as-is, not re-weighted.
    pub sensitivity_high:     f64,
    pub sensitivity_medium:   f64,
    pub sensitivity_low:      f64,
    pub online_threshold:     f64,
    pub online_factor:        f64,
    pub category_groups:      Vec<CategoryGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryGroup {
    pub label:      String,
    pub multiplier: f64,
    pub categories: Vec<String>,
}

impl RuleWeights {
    /// Multiplier for a normalized (lower-cased) category. Unlisted → 1.0.
    pub fn category_multiplier(&self, category: &str) -> f64 {
        self.category_group(category).map(|g| g.multiplier).unwrap_or(1.0)
    }

    pub fn category_group(&self, category: &str) -> Option<&CategoryGroup> {
        self.category_groups
            .iter()
            .find(|g| g.categories.iter().any(|c| c == category))
    }

    pub fn is_discretionary(&self, category: &str) -> bool {
        self.category_group(category)
            .map(|g| g.label == DISCRETIONARY)
            .unwrap_or(false)
    }
}

pub const ESSENTIAL:     &str = "essential";
pub const DISCRETIONARY: &str = "discretionary";
pub const GROCERY:       &str = "grocery";

impl Default for RuleWeights {
    fn default() -> Self {
        let group = |label: &str, multiplier: f64, categories: &[&str]| CategoryGroup {
            label: label.into(),
            multiplier,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        };
        Self {
            recency_horizon_days:   90.0,
            recency_weight:         0.40,
            frequency_horizon_days: 30.0,
            frequency_weight:       0.25,
            volume_saturation:      52.0,
            volume_weight:          0.20,
            sensitivity_high:       0.30,
            sensitivity_medium:     0.15,
            sensitivity_low:        0.0,
            online_threshold:       0.7,
            online_factor:          0.1,
            category_groups: vec![
                group(ESSENTIAL,     0.8, &["pharmacy", "personal care", "baby care"]),
                group(DISCRETIONARY, 1.2, &["household", "electronics", "fashion"]),
                group(GROCERY,       0.9, &["grocery", "fresh produce", "dairy"]),
            ],
        }
    }
}

// ── Competitive adjustment ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompetitiveConfig {
    /// Gap above which the competitor counts as materially cheaper.
    pub gap_threshold:    f64,
    pub probability_bump: f64,
    pub max_probability:  f64,
}

impl Default for CompetitiveConfig {
    fn default() -> Self {
        Self {
            gap_threshold:    0.10,
            probability_bump: 0.15,
            max_probability:  0.99,
        }
    }
}

// ── Risk classifier ───────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub high:              f64,
    pub medium:            f64,
    pub high_confidence:   f64,
    pub medium_confidence: f64,
    pub low_confidence:    f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            high:              0.7,
            medium:            0.4,
            high_confidence:   0.85,
            medium_confidence: 0.75,
            low_confidence:    0.80,
        }
    }
}

// ── Intervention simulation ───────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub baseline_recency_weight: f64,
    pub baseline_volume_weight:  f64,
    pub min_probability:         f64,
    pub max_probability:         f64,
    /// Probability removed by a 100% discount.
    pub discount_effect:         f64,
    /// Probability removed by a saturated points bonus.
    pub points_effect:           f64,
    pub points_saturation:       f64,
    pub cost_per_point:          f64,
    pub high_impact_threshold:     f64,
    pub moderate_impact_threshold: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            baseline_recency_weight:   0.5,
            baseline_volume_weight:    0.3,
            min_probability:           0.01,
            max_probability:           0.99,
            discount_effect:           0.4,
            points_effect:             0.1,
            points_saturation:         1000.0,
            cost_per_point:            0.01,
            high_impact_threshold:     0.3,
            moderate_impact_threshold: 0.1,
        }
    }
}

// ── Batch ranking ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub top_n: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self { top_n: 100 }
    }
}

// ── Narrative collaborator ────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeConfig {
    pub timeout_ms:            u64,
    pub temperature:           f64,
    pub outreach_temperature:  f64,
    pub brand:                 String,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            timeout_ms:           10_000,
            temperature:          0.7,
            outreach_temperature: 0.8,
            brand:                "FreshMart".into(),
        }
    }
}

// ── Root ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    pub normalization:   NormalizationCaps,
    pub rules:           RuleWeights,
    pub competitive:     CompetitiveConfig,
    pub risk:            RiskThresholds,
    pub simulation:      SimulationConfig,
    pub batch:           BatchConfig,
    pub narrative:       NarrativeConfig,
    /// Path of a trained classifier artifact. `None` → rule-based only.
    pub classifier_path: Option<String>,
    /// Upper bound on any single classifier call, batch calls included.
    pub classifier_timeout_ms: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            normalization:         NormalizationCaps::default(),
            rules:                 RuleWeights::default(),
            competitive:           CompetitiveConfig::default(),
            risk:                  RiskThresholds::default(),
            simulation:            SimulationConfig::default(),
            batch:                 BatchConfig::default(),
            narrative:             NarrativeConfig::default(),
            classifier_path:       None,
            classifier_timeout_ms: crate::model::DEFAULT_CLASSIFIER_TIMEOUT_MS,
        }
    }
}

impl RetentionConfig {
    /// Load from the data/ directory. A missing `retention.json`
    /// yields the defaults; a malformed one is an error.
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/retention.json");
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("config: {path} not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(anyhow::anyhow!("Cannot read {path}: {e}")),
        };
        let mut config: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;

        // Relative artifact paths resolve against the data dir.
        if let Some(p) = &config.classifier_path {
            if std::path::Path::new(p).is_relative() {
                config.classifier_path = Some(format!("{data_dir}/{p}"));
            }
        }
        Ok(config)
    }
}
