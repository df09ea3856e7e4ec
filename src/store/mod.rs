//! Persistence boundary for journal state.
//!
//! The engine never depends on a write landing. Loads go through
//! [`load_snapshot`], which logs failures and substitutes empty collections.

use crate::domain::{CapitalChange, MonthlyStartingCapitalOverride, Trade, YearlyStartingCapital};
use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::warn;

pub mod memory;

pub use memory::MemoryStore;

/// Storage for the four persisted journal collections.
///
/// Saves replace the whole collection.
#[async_trait]
pub trait JournalStore: Send + Sync + fmt::Debug {
    async fn load_trades(&self) -> Result<Vec<Trade>, StoreError>;
    async fn save_trades(&self, trades: &[Trade]) -> Result<(), StoreError>;

    async fn load_capital_changes(&self) -> Result<Vec<CapitalChange>, StoreError>;
    async fn save_capital_changes(&self, changes: &[CapitalChange]) -> Result<(), StoreError>;

    async fn load_yearly_capitals(&self) -> Result<Vec<YearlyStartingCapital>, StoreError>;
    async fn save_yearly_capitals(
        &self,
        capitals: &[YearlyStartingCapital],
    ) -> Result<(), StoreError>;

    async fn load_monthly_overrides(
        &self,
    ) -> Result<Vec<MonthlyStartingCapitalOverride>, StoreError>;
    async fn save_monthly_overrides(
        &self,
        overrides: &[MonthlyStartingCapitalOverride],
    ) -> Result<(), StoreError>;
}

/// Error type for store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Everything the journal persists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub trades: Vec<Trade>,
    pub capital_changes: Vec<CapitalChange>,
    pub yearly_capitals: Vec<YearlyStartingCapital>,
    pub monthly_overrides: Vec<MonthlyStartingCapitalOverride>,
}

fn or_empty<T>(collection: &str, result: Result<Vec<T>, StoreError>) -> Vec<T> {
    result.unwrap_or_else(|e| {
        warn!(collection, error = %e, "Failed to load collection, treating as empty");
        Vec::new()
    })
}

/// Load every collection, treating each failed load as empty.
pub async fn load_snapshot(store: &dyn JournalStore) -> Snapshot {
    Snapshot {
        trades: or_empty("trades", store.load_trades().await),
        capital_changes: or_empty("capital_changes", store.load_capital_changes().await),
        yearly_capitals: or_empty("yearly_capitals", store.load_yearly_capitals().await),
        monthly_overrides: or_empty("monthly_overrides", store.load_monthly_overrides().await),
    }
}

/// Write every collection. Stops at the first failure.
pub async fn save_snapshot(store: &dyn JournalStore, snapshot: &Snapshot) -> Result<(), StoreError> {
    store.save_trades(&snapshot.trades).await?;
    store.save_capital_changes(&snapshot.capital_changes).await?;
    store.save_yearly_capitals(&snapshot.yearly_capitals).await?;
    store
        .save_monthly_overrides(&snapshot.monthly_overrides)
        .await?;
    Ok(())
}
