//! Synthetic customer population.
//!
//! Distributions mirror the retail data generator: uniform purchase
//! counts, gaps, order values and recency, three sensitivity levels, and
//! an online ratio rounded to two decimals.

use crate::{features::CustomerFeatures, rng::SeededRng};

pub const CATEGORIES: [&str; 10] = [
    "Grocery",
    "Pharmacy",
    "Personal Care",
    "Baby Care",
    "Household Essentials",
    "Dairy & Bakery",
    "Snacks & Beverages",
    "Electronics",
    "Home & Kitchen",
    "Seasonal Items",
];

const SENSITIVITIES: [&str; 3] = ["Low", "Medium", "High"];

const POPULATION_STREAM: u64 = 1;

pub fn customer_id(index: usize) -> String {
    format!("FM_CUST_{:06}", index + 1)
}

/// Generate `n` customers from `seed`. Same seed, same population.
pub fn generate(n: usize, seed: u64) -> Vec<CustomerFeatures> {
    let mut rng = SeededRng::new(seed, POPULATION_STREAM);
    (0..n).map(|i| generate_one(i, &mut rng)).collect()
}

fn generate_one(index: usize, rng: &mut SeededRng) -> CustomerFeatures {
    let online_ratio = (rng.next_f64() * 100.0).round() / 100.0;
    CustomerFeatures {
        customer_id:              customer_id(index),
        primary_category:         rng.choose(&CATEGORIES).to_string(),
        yearly_purchase_count:    rng.range_inclusive(1, 60),
        avg_gap_days:             rng.range_inclusive(3, 90),
        avg_order_value:          rng.range_inclusive(200, 3000) as f64,
        days_since_last_purchase: rng.range_inclusive(1, 180),
        discount_sensitivity:     rng.choose(&SENSITIVITIES).to_string(),
        online_ratio,
    }
}
