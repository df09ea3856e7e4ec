//! Journal session service.
//!
//! Owns the trade set and capital ledger behind one async lock. Mutations get
//! a quick pass; the full recalculation runs later and its settled result goes
//! to the persistence writer.

use crate::compile::{Pipeline, PipelineContext, TradeSet};
use crate::config::Config;
use crate::domain::{AccountingBasis, CapitalChange, Decimal, Month, MonthKey, Trade};
use crate::engine::{MonthlyTruePortfolio, TruePortfolioLedger};
use crate::error::AppError;
use crate::orchestration::persist::PersistenceWriter;
use crate::store::{load_snapshot, JournalStore, Snapshot};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The journal session: trade set, capital ledger and background work.
///
/// Mutations apply immediately with a quick per-trade pass and leave the set
/// provisional; a delayed full recalculation settles it. A newer mutation
/// supersedes any settle still waiting.
#[derive(Clone)]
pub struct Journal {
    inner: Arc<Inner>,
}

struct Inner {
    state: Mutex<JournalState>,
    config: Config,
    writer: PersistenceWriter,
}

struct JournalState {
    trades: TradeSet,
    ledger: TruePortfolioLedger,
}

impl JournalState {
    fn context(&self, config: &Config) -> PipelineContext {
        PipelineContext::new(self.ledger.basis(), config.as_of_date())
    }

    fn recalculate(&self, config: &Config) -> Vec<Trade> {
        let view = self.ledger.view(&self.trades.trades);
        Pipeline::recalculate(&self.trades.trades, &view, self.context(config))
    }

    fn quick_pass(&self, trade: &Trade, config: &Config) -> Trade {
        let view = self.ledger.view(&self.trades.trades);
        Pipeline::quick_pass(trade, &view, self.context(config))
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            trades: self.trades.trades.clone(),
            capital_changes: self.ledger.capital_changes().to_vec(),
            yearly_capitals: self.ledger.yearly_capitals(),
            monthly_overrides: self.ledger.monthly_overrides(),
        }
    }

    /// Next sequential trade number: one past the largest numeric `trade_no`.
    fn next_trade_no(&self) -> String {
        let max = self
            .trades
            .trades
            .iter()
            .filter_map(|t| t.trade_no.trim().parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max + 1).to_string()
    }

    fn assign_identity(&self, trade: &mut Trade) {
        if trade.id.is_empty() {
            trade.id = uuid::Uuid::new_v4().to_string();
        }
        if trade.trade_no.trim().is_empty() {
            trade.trade_no = self.next_trade_no();
        }
    }

    /// Give loaded trades without an id, or sharing one, a fresh id, and
    /// number the unnumbered ones in stored order. Returns how many changed.
    fn assign_missing_identities(&mut self) -> usize {
        let mut seen = HashSet::new();
        let mut changed = 0;
        for idx in 0..self.trades.trades.len() {
            let mut trade = std::mem::take(&mut self.trades.trades[idx]);
            let duplicate = !seen.insert(trade.id.clone());
            if duplicate || trade.id.is_empty() || trade.trade_no.trim().is_empty() {
                if duplicate {
                    trade.id.clear();
                }
                self.assign_identity(&mut trade);
                seen.insert(trade.id.clone());
                changed += 1;
            }
            self.trades.trades[idx] = trade;
        }
        changed
    }
}

impl Journal {
    /// Load persisted state from `store` and settle it.
    ///
    /// Unreadable collections are treated as empty.
    pub async fn open(store: Arc<dyn JournalStore>, config: Config) -> Self {
        let snapshot = load_snapshot(store.as_ref()).await;
        let ledger = TruePortfolioLedger::from_parts(
            snapshot.yearly_capitals,
            snapshot.monthly_overrides,
            snapshot.capital_changes,
            config.basis,
        )
        .with_fallback_portfolio_size(config.default_portfolio_size);

        let mut state = JournalState {
            trades: TradeSet::settled(snapshot.trades, 0),
            ledger,
        };
        let assigned = state.assign_missing_identities();
        if assigned > 0 {
            warn!(trades = assigned, "Assigned identity to stored trades");
        }
        let derived = state.recalculate(&config);
        state.trades = TradeSet::settled(derived, 0);

        info!(
            trades = state.trades.trades.len(),
            capital_changes = state.ledger.capital_changes().len(),
            basis = %state.ledger.basis(),
            "Journal opened"
        );

        let writer = PersistenceWriter::spawn(store, config.persist_debounce());
        Journal {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                config,
                writer,
            }),
        }
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    // =========================================================================
    // Trades
    // =========================================================================

    /// Add a trade. Missing `id` and `trade_no` are assigned.
    ///
    /// Returns the trade with its quick-pass derived fields.
    pub async fn add_trade(&self, mut trade: Trade) -> Trade {
        let mut state = self.inner.state.lock().await;
        state.assign_identity(&mut trade);
        let derived = state.quick_pass(&trade, &self.inner.config);
        state.trades.trades.push(derived.clone());
        let generation = state.trades.touch();
        drop(state);

        debug!(trade_id = %derived.id, generation, "Trade added");
        self.schedule_settle(generation);
        derived
    }

    /// Replace the trade with the same `id`.
    ///
    /// # Errors
    /// Returns `AppError::NotFound` if no trade has that id.
    pub async fn update_trade(&self, mut trade: Trade) -> Result<Trade, AppError> {
        let mut state = self.inner.state.lock().await;
        let index = state
            .trades
            .trades
            .iter()
            .position(|t| t.id == trade.id)
            .ok_or_else(|| AppError::NotFound(format!("trade {}", trade.id)))?;

        if trade.trade_no.trim().is_empty() {
            trade.trade_no = state.trades.trades[index].trade_no.clone();
        }
        let derived = state.quick_pass(&trade, &self.inner.config);
        state.trades.trades[index] = derived.clone();
        let generation = state.trades.touch();
        drop(state);

        debug!(trade_id = %derived.id, generation, "Trade updated");
        self.schedule_settle(generation);
        Ok(derived)
    }

    /// Remove the trade with `id`. Returns false if it was not present.
    pub async fn delete_trade(&self, id: &str) -> bool {
        let mut state = self.inner.state.lock().await;
        let before = state.trades.trades.len();
        state.trades.trades.retain(|t| t.id != id);
        if state.trades.trades.len() == before {
            return false;
        }
        let generation = state.trades.touch();
        drop(state);

        debug!(trade_id = %id, generation, "Trade deleted");
        self.schedule_settle(generation);
        true
    }

    /// Append raw (possibly partial) records. Derived fields are filled in by
    /// the next settle.
    pub async fn import_trades(&self, records: Vec<Trade>) -> usize {
        let mut state = self.inner.state.lock().await;
        let count = records.len();
        for mut record in records {
            state.assign_identity(&mut record);
            state.trades.trades.push(record);
        }
        let generation = state.trades.touch();
        drop(state);

        info!(count, generation, "Trades imported");
        self.schedule_settle(generation);
        count
    }

    /// Current trade set with its recalculation status.
    pub async fn trades(&self) -> TradeSet {
        self.inner.state.lock().await.trades.clone()
    }

    // =========================================================================
    // Capital
    // =========================================================================

    pub async fn add_capital_change(&self, change: CapitalChange) {
        self.mutate_ledger(|ledger| {
            ledger.add_capital_change(change);
            true
        })
        .await;
    }

    /// Replace the capital change with the same `id`. Returns false if absent.
    pub async fn update_capital_change(&self, change: CapitalChange) -> bool {
        self.mutate_ledger(|ledger| ledger.update_capital_change(change))
            .await
    }

    pub async fn delete_capital_change(&self, id: &str) -> bool {
        self.mutate_ledger(|ledger| ledger.delete_capital_change(id))
            .await
    }

    pub async fn set_yearly_capital(&self, year: i32, starting_capital: Decimal) {
        self.mutate_ledger(|ledger| {
            ledger.set_yearly_capital(year, starting_capital);
            true
        })
        .await;
    }

    /// Pin the starting capital of `month` (three-letter token) in `year`.
    ///
    /// # Errors
    /// Returns `AppError::Ledger` for an unknown month token.
    pub async fn set_monthly_override(
        &self,
        month: &str,
        year: i32,
        starting_capital: Decimal,
    ) -> Result<(), AppError> {
        let mut result = Ok(());
        self.mutate_ledger(|ledger| {
            match ledger.set_monthly_override(month, year, starting_capital) {
                Ok(()) => true,
                Err(e) => {
                    result = Err(AppError::from(e));
                    false
                }
            }
        })
        .await;
        result
    }

    pub async fn remove_monthly_override(&self, month: &str, year: i32) -> Result<bool, AppError> {
        let month: Month = month.parse()?;
        let key = MonthKey::new(month, year);
        Ok(self
            .mutate_ledger(|ledger| ledger.remove_monthly_override(key))
            .await)
    }

    /// Switch the accounting basis. Every derived value is recomputed.
    pub async fn set_basis(&self, basis: AccountingBasis) {
        self.mutate_ledger(|ledger| {
            if ledger.basis() == basis {
                return false;
            }
            ledger.set_basis(basis);
            true
        })
        .await;
    }

    pub async fn basis(&self) -> AccountingBasis {
        self.inner.state.lock().await.ledger.basis()
    }

    /// Ledger series from the earliest data month through the evaluation month.
    pub async fn monthly_portfolios(&self) -> Result<Vec<MonthlyTruePortfolio>, AppError> {
        let state = self.inner.state.lock().await;
        let series = state
            .ledger
            .all_monthly_portfolios(&state.trades.trades, self.inner.config.as_of_date())?;
        Ok(series)
    }

    /// Ledger record for one month.
    pub async fn monthly_portfolio(
        &self,
        month: &str,
        year: i32,
    ) -> Result<MonthlyTruePortfolio, AppError> {
        let state = self.inner.state.lock().await;
        Ok(state
            .ledger
            .monthly_portfolio(&state.trades.trades, month, year)?)
    }

    /// True portfolio size (closing capital) for one month.
    pub async fn portfolio_size(&self, month: &str, year: i32) -> Result<Decimal, AppError> {
        let month: Month = month.parse()?;
        let state = self.inner.state.lock().await;
        Ok(state
            .ledger
            .true_portfolio_size(&state.trades.trades, MonthKey::new(month, year)))
    }

    // =========================================================================
    // Recalculation
    // =========================================================================

    /// Run the full pipeline now and mark the set settled.
    pub async fn settle(&self) -> TradeSet {
        let mut state = self.inner.state.lock().await;
        self.settle_locked(&mut state)
    }

    /// Settle if still provisional, then flush pending writes.
    pub async fn shutdown(&self) {
        {
            let mut state = self.inner.state.lock().await;
            if !state.trades.is_settled() {
                self.settle_locked(&mut state);
            }
        }
        self.inner.writer.shutdown().await;
        info!("Journal shut down");
    }

    fn settle_locked(&self, state: &mut JournalState) -> TradeSet {
        let generation = state.trades.generation;
        let derived = state.recalculate(&self.inner.config);
        state.trades = TradeSet::settled(derived, generation);
        self.inner.writer.enqueue(state.snapshot());
        debug!(generation, trades = state.trades.trades.len(), "Trade set settled");
        state.trades.clone()
    }

    async fn mutate_ledger<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut TruePortfolioLedger) -> bool,
    {
        let mut state = self.inner.state.lock().await;
        if !f(&mut state.ledger) {
            return false;
        }
        let generation = state.trades.touch();
        drop(state);

        self.schedule_settle(generation);
        true
    }

    fn schedule_settle(&self, generation: u64) {
        let journal = self.clone();
        let delay = self.inner.config.recalc_delay();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = journal.inner.state.lock().await;
            if state.trades.generation != generation {
                debug!(
                    scheduled = generation,
                    current = state.trades.generation,
                    "Settle superseded"
                );
                return;
            }
            if !state.trades.is_settled() {
                journal.settle_locked(&mut state);
            }
        });
    }
}

impl std::fmt::Debug for Journal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Journal")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}
