use super::RetentionStore;
use crate::{
    competitor::{CompetitorPrice, CompetitorTable},
    error::RetentionResult,
};
use rusqlite::params;

impl RetentionStore {
    // ── Competitor prices ─────────────────────────────────────────

    pub fn insert_competitor_price(&self, p: &CompetitorPrice) -> RetentionResult<()> {
        self.conn.execute(
            "INSERT INTO competitor_price (category, reference_price, competitor_name, competitor_price)
             VALUES (?1, ?2, ?3, ?4)",
            params![&p.category, p.reference_price, &p.competitor_name, p.competitor_price],
        )?;
        Ok(())
    }

    /// Replace the whole table. Row order is preserved, so "first recorded
    /// reference price" keeps its meaning after a reload.
    pub fn replace_competitor_prices(&self, prices: &[CompetitorPrice]) -> RetentionResult<()> {
        let tx = self.conn.unchecked_transaction()?;
        self.conn.execute("DELETE FROM competitor_price", [])?;
        for p in prices {
            self.insert_competitor_price(p)?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_competitor_table(&self) -> RetentionResult<CompetitorTable> {
        let mut stmt = self.conn.prepare(
            "SELECT category, reference_price, competitor_name, competitor_price
             FROM competitor_price ORDER BY id ASC",
        )?;
        let prices = stmt.query_map([], |row| {
            Ok(CompetitorPrice {
                category:         row.get(0)?,
                reference_price:  row.get(1)?,
                competitor_name:  row.get(2)?,
                competitor_price: row.get(3)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(CompetitorTable::new(prices))
    }
}
