pub mod attribution;
pub mod batch;
pub mod competitor;
pub mod config;
pub mod directory;
pub mod engine;
pub mod error;
pub mod features;
pub mod intervention;
pub mod model;
pub mod narrative;
pub mod population;
pub mod risk;
pub mod rng;
pub mod rules;
pub mod store;
pub mod types;
