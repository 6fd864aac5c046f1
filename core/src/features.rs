//! Feature normalization.
//!
//! RULE: every probability in the crate is computed from a
//! `NormalizedFeatures` produced by `normalize()`. Never score raw input.

use crate::{
    config::NormalizationCaps,
    error::{RetentionError, RetentionResult},
    types::{CustomerId, DiscountSensitivity},
};
use serde::{Deserialize, Serialize};

const DEFAULT_DAYS_SINCE_LAST: i64 = 30;
const DEFAULT_YEARLY_COUNT:    i64 = 12;
const DEFAULT_AVG_GAP:         i64 = 30;
const DEFAULT_ONLINE_RATIO:    f64 = 0.5;
const DEFAULT_CATEGORY:        &str = "grocery";
const DEFAULT_SENSITIVITY:     &str = "medium";

/// Raw customer features as they arrive from the store or a caller.
/// Values outside their documented range are legal here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerFeatures {
    pub customer_id:              CustomerId,
    #[serde(default = "default_category")]
    pub primary_category:         String,
    #[serde(default = "default_yearly_count")]
    pub yearly_purchase_count:    i64,
    #[serde(default = "default_avg_gap")]
    pub avg_gap_days:             i64,
    #[serde(default)]
    pub avg_order_value:          f64,
    #[serde(default = "default_days_since_last")]
    pub days_since_last_purchase: i64,
    #[serde(default = "default_sensitivity")]
    pub discount_sensitivity:     String,
    #[serde(default = "default_online_ratio")]
    pub online_ratio:             f64,
}

fn default_category() -> String { DEFAULT_CATEGORY.into() }
fn default_sensitivity() -> String { DEFAULT_SENSITIVITY.into() }
fn default_yearly_count() -> i64 { DEFAULT_YEARLY_COUNT }
fn default_avg_gap() -> i64 { DEFAULT_AVG_GAP }
fn default_days_since_last() -> i64 { DEFAULT_DAYS_SINCE_LAST }
fn default_online_ratio() -> f64 { DEFAULT_ONLINE_RATIO }

impl CustomerFeatures {
    /// A record with every optional field at its default.
    pub fn with_defaults(customer_id: impl Into<CustomerId>) -> Self {
        Self {
            customer_id:              customer_id.into(),
            primary_category:         default_category(),
            yearly_purchase_count:    DEFAULT_YEARLY_COUNT,
            avg_gap_days:             DEFAULT_AVG_GAP,
            avg_order_value:          0.0,
            days_since_last_purchase: DEFAULT_DAYS_SINCE_LAST,
            discount_sensitivity:     default_sensitivity(),
            online_ratio:             DEFAULT_ONLINE_RATIO,
        }
    }

    /// Reject records that cannot be attributed to a customer or that
    /// carry non-finite reals. Used by the batch ranker, which skips
    /// such records instead of scoring them.
    pub fn validate(&self) -> RetentionResult<()> {
        let invalid = |reason: &str| RetentionError::InvalidRecord {
            customer_id: self.customer_id.clone(),
            reason:      reason.into(),
        };
        if self.customer_id.trim().is_empty() {
            return Err(invalid("empty customer id"));
        }
        if !self.avg_order_value.is_finite() {
            return Err(invalid("avg_order_value is not finite"));
        }
        if !self.online_ratio.is_finite() {
            return Err(invalid("online_ratio is not finite"));
        }
        Ok(())
    }
}

/// Clamped, canonicalized features. Created fresh per scoring call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedFeatures {
    pub customer_id:              CustomerId,
    pub primary_category:         String,
    pub yearly_purchase_count:    i64,
    pub avg_gap_days:             i64,
    pub avg_order_value:          f64,
    pub days_since_last_purchase: i64,
    pub discount_sensitivity:     DiscountSensitivity,
    pub online_ratio:             f64,
}

impl NormalizedFeatures {
    /// Re-express as raw input. `normalize(&n.to_raw())` returns `n`.
    pub fn to_raw(&self) -> CustomerFeatures {
        CustomerFeatures {
            customer_id:              self.customer_id.clone(),
            primary_category:         self.primary_category.clone(),
            yearly_purchase_count:    self.yearly_purchase_count,
            avg_gap_days:             self.avg_gap_days,
            avg_order_value:          self.avg_order_value,
            days_since_last_purchase: self.days_since_last_purchase,
            discount_sensitivity:     self.discount_sensitivity.as_str().into(),
            online_ratio:             self.online_ratio,
        }
    }
}

/// Clamp and canonicalize. Total: never fails, never rejects.
pub fn normalize(raw: &CustomerFeatures, caps: &NormalizationCaps) -> NormalizedFeatures {
    let category = raw.primary_category.trim().to_lowercase();

    NormalizedFeatures {
        customer_id:              raw.customer_id.trim().to_string(),
        primary_category:         if category.is_empty() { DEFAULT_CATEGORY.into() } else { category },
        yearly_purchase_count:    raw.yearly_purchase_count.clamp(0, caps.max_yearly_purchases),
        avg_gap_days:             raw.avg_gap_days.clamp(0, caps.max_avg_gap_days),
        avg_order_value:          finite_or(raw.avg_order_value, 0.0).clamp(0.0, caps.max_order_value),
        days_since_last_purchase: raw.days_since_last_purchase.clamp(0, caps.max_days_since_last),
        discount_sensitivity:     DiscountSensitivity::parse(&raw.discount_sensitivity),
        online_ratio:             finite_or(raw.online_ratio, DEFAULT_ONLINE_RATIO).clamp(0.0, 1.0),
    }
}

fn finite_or(v: f64, default: f64) -> f64 {
    if v.is_finite() { v } else { default }
}
