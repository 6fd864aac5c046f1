use super::RetentionStore;
use crate::{
    batch::RankedCustomer,
    error::{RetentionError, RetentionResult},
    types::RiskTier,
};
use chrono::{DateTime, Utc};
use rusqlite::params;

impl RetentionStore {
    // ── At-risk ranking ───────────────────────────────────────────

    /// Replace the at-risk table with a fresh batch result.
    pub fn replace_at_risk_customers(
        &self,
        batch_id: &str,
        ranked: &[RankedCustomer],
        updated_at: DateTime<Utc>,
    ) -> RetentionResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute("DELETE FROM at_risk_customers", [])?;
        let stamp = updated_at.to_rfc3339();
        for c in ranked {
            self.conn.execute(
                "INSERT INTO at_risk_customers (
                    customer_id, batch_id, churn_probability, churn_risk,
                    factors, recommendations, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &c.customer_id,
                    batch_id,
                    c.churn_probability,
                    c.churn_risk.as_str(),
                    serde_json::to_string(&c.factors)?,
                    serde_json::to_string(&c.recommendations)?,
                    &stamp,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn top_at_risk(&self, limit: usize) -> RetentionResult<Vec<RankedCustomer>> {
        let mut stmt = self.conn.prepare(
            "SELECT customer_id, churn_probability, churn_risk, factors, recommendations
             FROM at_risk_customers
             ORDER BY churn_probability DESC, customer_id ASC
             LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, f64>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?.collect::<Result<Vec<_>, _>>()?;

        let mut out = Vec::with_capacity(rows.len());
        for (customer_id, churn_probability, risk, factors, recommendations) in rows {
            let churn_risk = RiskTier::parse(&risk).ok_or_else(|| RetentionError::InvalidRecord {
                customer_id: customer_id.clone(),
                reason:      format!("unknown risk tier '{risk}'"),
            })?;
            out.push(RankedCustomer {
                customer_id,
                churn_probability,
                churn_risk,
                factors:         serde_json::from_str(&factors)?,
                recommendations: serde_json::from_str(&recommendations)?,
            });
        }
        Ok(out)
    }

    pub fn at_risk_count(&self) -> RetentionResult<i64> {
        let count = self.conn.query_row("SELECT COUNT(*) FROM at_risk_customers", [], |row| row.get(0))?;
        Ok(count)
    }
}
