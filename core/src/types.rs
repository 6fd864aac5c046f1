//! Shared primitive types used across the scoring core.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable customer identifier, e.g. `FM_CUST_000010`.
pub type CustomerId = String;

/// Canonical discount sensitivity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSensitivity {
    Low,
    Medium,
    High,
}

impl DiscountSensitivity {
    /// Parse free text. Unknown or malformed values map to `Medium`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "high" | "very high" => Self::High,
            "low" | "very low"   => Self::Low,
            _                    => Self::Medium,
        }
    }

    /// Ordinal encoding used by the classifier feature vector.
    pub fn ordinal(self) -> f64 {
        match self {
            Self::Low    => 0.0,
            Self::Medium => 1.0,
            Self::High   => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low    => "low",
            Self::Medium => "medium",
            Self::High   => "high",
        }
    }
}

impl fmt::Display for DiscountSensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Discrete churn risk bucket. Ordered so that `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low    => "Low",
            Self::Medium => "Medium",
            Self::High   => "High",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "Low"    => Some(Self::Low),
            "Medium" => Some(Self::Medium),
            "High"   => Some(Self::High),
            _        => None,
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
