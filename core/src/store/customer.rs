use super::RetentionStore;
use crate::{
    directory::CustomerDirectory,
    error::RetentionResult,
    features::CustomerFeatures,
};
use rusqlite::{params, OptionalExtension, Row};

const CUSTOMER_COLUMNS: &str = "customer_id, primary_category, yearly_purchase_count, avg_gap_days,
     avg_order_value, days_since_last_purchase, discount_sensitivity, online_ratio";

fn customer_from_row(row: &Row<'_>) -> rusqlite::Result<CustomerFeatures> {
    Ok(CustomerFeatures {
        customer_id:              row.get(0)?,
        primary_category:         row.get(1)?,
        yearly_purchase_count:    row.get(2)?,
        avg_gap_days:             row.get(3)?,
        avg_order_value:          row.get(4)?,
        days_since_last_purchase: row.get(5)?,
        discount_sensitivity:     row.get(6)?,
        online_ratio:             row.get(7)?,
    })
}

impl RetentionStore {
    // ── Customer ──────────────────────────────────────────────────

    pub fn upsert_customer(&self, c: &CustomerFeatures) -> RetentionResult<()> {
        self.conn.execute(
            "INSERT INTO customer (
                customer_id, primary_category, yearly_purchase_count, avg_gap_days,
                avg_order_value, days_since_last_purchase, discount_sensitivity, online_ratio
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(customer_id) DO UPDATE SET
                primary_category         = excluded.primary_category,
                yearly_purchase_count    = excluded.yearly_purchase_count,
                avg_gap_days             = excluded.avg_gap_days,
                avg_order_value          = excluded.avg_order_value,
                days_since_last_purchase = excluded.days_since_last_purchase,
                discount_sensitivity     = excluded.discount_sensitivity,
                online_ratio             = excluded.online_ratio",
            params![
                &c.customer_id,
                &c.primary_category,
                c.yearly_purchase_count,
                c.avg_gap_days,
                c.avg_order_value,
                c.days_since_last_purchase,
                &c.discount_sensitivity,
                c.online_ratio,
            ],
        )?;
        Ok(())
    }

    /// Insert many customers in one transaction.
    pub fn upsert_customers(&self, customers: &[CustomerFeatures]) -> RetentionResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        for c in customers {
            self.upsert_customer(c)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn get_customer(&self, customer_id: &str) -> RetentionResult<Option<CustomerFeatures>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer WHERE customer_id = ?1");
        let customer = self.conn
            .query_row(&sql, params![customer_id], customer_from_row)
            .optional()?;
        Ok(customer)
    }

    pub fn all_customers(&self) -> RetentionResult<Vec<CustomerFeatures>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customer ORDER BY customer_id ASC");
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt.query_map([], customer_from_row)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn customer_count(&self) -> RetentionResult<i64> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM customer", [], |row| row.get(0))?;
        Ok(count)
    }
}

impl CustomerDirectory for RetentionStore {
    fn find(&self, customer_id: &str) -> RetentionResult<Option<CustomerFeatures>> {
        self.get_customer(customer_id)
    }
}
