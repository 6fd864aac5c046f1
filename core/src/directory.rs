//! Customer lookup by identifier.
//!
//! The engine never owns customer records; it resolves them through a
//! `CustomerDirectory` supplied by the caller (SQLite store, in-memory map).

use crate::{
    error::{RetentionError, RetentionResult},
    features::CustomerFeatures,
};
use std::collections::HashMap;

pub trait CustomerDirectory {
    fn find(&self, customer_id: &str) -> RetentionResult<Option<CustomerFeatures>>;
}

/// Resolve `customer_id` or report it as not found.
pub fn lookup(directory: &dyn CustomerDirectory, customer_id: &str) -> RetentionResult<CustomerFeatures> {
    directory
        .find(customer_id.trim())?
        .ok_or_else(|| RetentionError::CustomerNotFound { customer_id: customer_id.to_string() })
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    customers: HashMap<String, CustomerFeatures>,
}

impl InMemoryDirectory {
    pub fn new(customers: impl IntoIterator<Item = CustomerFeatures>) -> Self {
        Self {
            customers: customers.into_iter().map(|c| (c.customer_id.clone(), c)).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.customers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.customers.is_empty()
    }
}

impl CustomerDirectory for InMemoryDirectory {
    fn find(&self, customer_id: &str) -> RetentionResult<Option<CustomerFeatures>> {
        Ok(self.customers.get(customer_id).cloned())
    }
}
