//! Repository layer for journal database operations.
//!
//! Methods are organized across submodules by domain:
//! - `mod.rs` - Trade operations and the `JournalStore` implementation
//! - `capital.rs` - Capital changes, yearly capitals and monthly overrides

mod capital;

use crate::domain::{CapitalChange, MonthlyStartingCapitalOverride, Trade, YearlyStartingCapital};
use crate::store::{JournalStore, StoreError};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePool;
use sqlx::Row;
use tracing::{debug, warn};

/// Repository for database operations.
pub struct Repository {
    pool: SqlitePool,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    // =========================================================================
    // Trade operations
    // =========================================================================

    /// Replace the stored trade set, keeping the given order.
    ///
    /// Each trade is stored as its JSON payload. Derived fields are rewritten
    /// by the next recalculation after load.
    ///
    /// # Errors
    /// Returns an error if serialization or the transaction fails.
    pub async fn replace_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM trades").execute(&mut *tx).await?;

        for (position, trade) in trades.iter().enumerate() {
            let payload = serde_json::to_string(trade)?;
            sqlx::query(
                r#"
                INSERT INTO trades (id, trade_no, trade_date, position, payload)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    trade_no = excluded.trade_no,
                    trade_date = excluded.trade_date,
                    position = excluded.position,
                    payload = excluded.payload
                "#,
            )
            .bind(trade.id.as_str())
            .bind(trade.trade_no.as_str())
            .bind(trade.date.map(|d| d.format("%Y-%m-%d").to_string()))
            .bind(position as i64)
            .bind(payload)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        debug!(count = trades.len(), "Stored trades");
        Ok(())
    }

    /// Load trades in stored order. Rows whose payload cannot be decoded are skipped.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub async fn query_trades(&self) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, payload
            FROM trades
            ORDER BY position ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let trades = rows
            .iter()
            .filter_map(|row| {
                let id: String = row.get("id");
                let payload: String = row.get("payload");
                match serde_json::from_str::<Trade>(&payload) {
                    Ok(trade) => Some(trade),
                    Err(e) => {
                        warn!(trade_id = %id, error = %e, "Failed to decode stored trade, skipping");
                        None
                    }
                }
            })
            .collect();

        Ok(trades)
    }

    /// Count stored trades.
    pub async fn count_trades(&self) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM trades")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

#[async_trait]
impl JournalStore for Repository {
    async fn load_trades(&self) -> Result<Vec<Trade>, StoreError> {
        self.query_trades().await
    }

    async fn save_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        self.replace_trades(trades).await
    }

    async fn load_capital_changes(&self) -> Result<Vec<CapitalChange>, StoreError> {
        self.query_capital_changes().await
    }

    async fn save_capital_changes(&self, changes: &[CapitalChange]) -> Result<(), StoreError> {
        self.replace_capital_changes(changes).await
    }

    async fn load_yearly_capitals(&self) -> Result<Vec<YearlyStartingCapital>, StoreError> {
        self.query_yearly_capitals().await
    }

    async fn save_yearly_capitals(
        &self,
        capitals: &[YearlyStartingCapital],
    ) -> Result<(), StoreError> {
        self.replace_yearly_capitals(capitals).await
    }

    async fn load_monthly_overrides(
        &self,
    ) -> Result<Vec<MonthlyStartingCapitalOverride>, StoreError> {
        self.query_monthly_overrides().await
    }

    async fn save_monthly_overrides(
        &self,
        overrides: &[MonthlyStartingCapitalOverride],
    ) -> Result<(), StoreError> {
        self.replace_monthly_overrides(overrides).await
    }
}
