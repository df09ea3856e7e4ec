//! In-memory journal store for tests and throwaway sessions.

use super::{JournalStore, Snapshot, StoreError};
use crate::domain::{CapitalChange, MonthlyStartingCapitalOverride, Trade, YearlyStartingCapital};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Store that keeps collections in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: Mutex<Snapshot>,
    failing: bool,
    trade_saves: AtomicUsize,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store whose every operation fails.
    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Seed the store with trades.
    pub fn with_trades(self, trades: Vec<Trade>) -> Self {
        self.lock().trades = trades;
        self
    }

    /// Seed the store with capital changes.
    pub fn with_capital_changes(self, changes: Vec<CapitalChange>) -> Self {
        self.lock().capital_changes = changes;
        self
    }

    /// Seed the store with yearly starting capitals.
    pub fn with_yearly_capitals(self, capitals: Vec<YearlyStartingCapital>) -> Self {
        self.lock().yearly_capitals = capitals;
        self
    }

    /// Seed the store with monthly overrides.
    pub fn with_monthly_overrides(self, overrides: Vec<MonthlyStartingCapitalOverride>) -> Self {
        self.lock().monthly_overrides = overrides;
        self
    }

    /// Current contents.
    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    /// Number of completed trade saves.
    pub fn trade_saves(&self) -> usize {
        self.trade_saves.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        // A poisoned lock still holds consistent data: every write is a whole-vector swap.
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing {
            Err(StoreError::Unavailable("memory store set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl JournalStore for MemoryStore {
    async fn load_trades(&self) -> Result<Vec<Trade>, StoreError> {
        self.check()?;
        Ok(self.lock().trades.clone())
    }

    async fn save_trades(&self, trades: &[Trade]) -> Result<(), StoreError> {
        self.check()?;
        self.lock().trades = trades.to_vec();
        self.trade_saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load_capital_changes(&self) -> Result<Vec<CapitalChange>, StoreError> {
        self.check()?;
        Ok(self.lock().capital_changes.clone())
    }

    async fn save_capital_changes(&self, changes: &[CapitalChange]) -> Result<(), StoreError> {
        self.check()?;
        self.lock().capital_changes = changes.to_vec();
        Ok(())
    }

    async fn load_yearly_capitals(&self) -> Result<Vec<YearlyStartingCapital>, StoreError> {
        self.check()?;
        Ok(self.lock().yearly_capitals.clone())
    }

    async fn save_yearly_capitals(
        &self,
        capitals: &[YearlyStartingCapital],
    ) -> Result<(), StoreError> {
        self.check()?;
        self.lock().yearly_capitals = capitals.to_vec();
        Ok(())
    }

    async fn load_monthly_overrides(
        &self,
    ) -> Result<Vec<MonthlyStartingCapitalOverride>, StoreError> {
        self.check()?;
        Ok(self.lock().monthly_overrides.clone())
    }

    async fn save_monthly_overrides(
        &self,
        overrides: &[MonthlyStartingCapitalOverride],
    ) -> Result<(), StoreError> {
        self.check()?;
        self.lock().monthly_overrides = overrides.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Decimal, Side};

    #[test]
    fn test_save_then_load_trades() {
        let store = MemoryStore::new();
        let trade = Trade::new("1", None, "ACME", Side::Buy, Decimal::from_i64(5), Decimal::from_i64(2));

        tokio_test::block_on(store.save_trades(std::slice::from_ref(&trade))).unwrap();
        let loaded = tokio_test::block_on(store.load_trades()).unwrap();

        assert_eq!(loaded, vec![trade]);
        assert_eq!(store.trade_saves(), 1);
    }

    #[test]
    fn test_failing_store_rejects_everything() {
        let store = MemoryStore::failing();
        assert!(tokio_test::block_on(store.load_capital_changes()).is_err());
        assert!(tokio_test::block_on(store.save_trades(&[])).is_err());
        assert_eq!(store.trade_saves(), 0);
    }
}
