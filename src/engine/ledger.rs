//! True Portfolio ledger: month-by-month running capital.
//!
//! Each month opens with an override, the yearly seed (earliest data month
//! only) or the previous month's closing capital, then folds in capital
//! changes and the P/L attributed to it under the active basis.
//!
//! Memos never outlive a single top-level call.

use crate::domain::{
    AccountingBasis, CapitalChange, Decimal, Month, MonthKey, MonthParseError,
    MonthlyStartingCapitalOverride, Trade, YearlyStartingCapital,
};
use crate::engine::basis;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{debug, warn};

/// Portfolio size used when the ledger cannot produce one.
pub const DEFAULT_FALLBACK_PORTFOLIO_SIZE: i64 = 100_000;

/// Last calendar year the ledger will walk forward to.
pub const MAX_LEDGER_YEAR: i32 = 9999;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    InvalidMonth(#[from] MonthParseError),
    #[error("arithmetic overflow while closing {0}")]
    Overflow(MonthKey),
    #[error("month {0} is past the last supported ledger year")]
    OutOfRange(MonthKey),
}

/// Resolves the portfolio size for a calendar month.
pub trait PortfolioSizeLookup {
    fn portfolio_size(&self, month: MonthKey) -> Decimal;
}

/// Closing state of one ledger month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyTruePortfolio {
    pub month: Month,
    pub year: i32,
    /// Opening capital after this month's capital changes.
    pub starting_capital: Decimal,
    pub capital_changes: Decimal,
    pub pl: Decimal,
    pub final_capital: Decimal,
}

impl MonthlyTruePortfolio {
    pub fn zero(key: MonthKey) -> Self {
        Self {
            month: key.month,
            year: key.year,
            starting_capital: Decimal::zero(),
            capital_changes: Decimal::zero(),
            pl: Decimal::zero(),
            final_capital: Decimal::zero(),
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::new(self.month, self.year)
    }
}

/// Capital inputs plus the basis they are evaluated under.
#[derive(Debug, Clone)]
pub struct TruePortfolioLedger {
    yearly: BTreeMap<i32, YearlyStartingCapital>,
    overrides: BTreeMap<MonthKey, MonthlyStartingCapitalOverride>,
    changes: Vec<CapitalChange>,
    basis: AccountingBasis,
    fallback_portfolio_size: Decimal,
}

impl Default for TruePortfolioLedger {
    fn default() -> Self {
        Self::new(AccountingBasis::default())
    }
}

impl TruePortfolioLedger {
    pub fn new(basis: AccountingBasis) -> Self {
        Self {
            yearly: BTreeMap::new(),
            overrides: BTreeMap::new(),
            changes: Vec::new(),
            basis,
            fallback_portfolio_size: Decimal::from_i64(DEFAULT_FALLBACK_PORTFOLIO_SIZE),
        }
    }

    /// Build a ledger from persisted collections. Later duplicates win.
    pub fn from_parts(
        yearly: Vec<YearlyStartingCapital>,
        overrides: Vec<MonthlyStartingCapitalOverride>,
        changes: Vec<CapitalChange>,
        basis: AccountingBasis,
    ) -> Self {
        let mut ledger = Self::new(basis);
        for capital in yearly {
            ledger.yearly.insert(capital.year, capital);
        }
        for o in overrides {
            ledger.overrides.insert(o.key(), o);
        }
        ledger.changes = changes.into_iter().map(CapitalChange::normalized).collect();
        ledger
    }

    pub fn with_fallback_portfolio_size(mut self, size: Decimal) -> Self {
        self.fallback_portfolio_size = size;
        self
    }

    pub fn basis(&self) -> AccountingBasis {
        self.basis
    }

    pub fn set_basis(&mut self, basis: AccountingBasis) {
        self.basis = basis;
    }

    pub fn fallback_portfolio_size(&self) -> Decimal {
        self.fallback_portfolio_size
    }

    pub fn yearly_capitals(&self) -> Vec<YearlyStartingCapital> {
        self.yearly.values().cloned().collect()
    }

    pub fn monthly_overrides(&self) -> Vec<MonthlyStartingCapitalOverride> {
        self.overrides.values().cloned().collect()
    }

    pub fn capital_changes(&self) -> &[CapitalChange] {
        &self.changes
    }

    pub fn set_yearly_capital(&mut self, year: i32, starting_capital: Decimal) {
        self.yearly
            .insert(year, YearlyStartingCapital::new(year, starting_capital));
    }

    pub fn remove_yearly_capital(&mut self, year: i32) -> bool {
        self.yearly.remove(&year).is_some()
    }

    /// Upsert a starting-capital override for `month`/`year`.
    ///
    /// # Errors
    /// Returns `LedgerError::InvalidMonth` for an unknown month token.
    pub fn set_monthly_override(
        &mut self,
        month: &str,
        year: i32,
        starting_capital: Decimal,
    ) -> Result<(), LedgerError> {
        let month: Month = month.parse()?;
        let entry = MonthlyStartingCapitalOverride::new(month, year, starting_capital);
        self.overrides.insert(entry.key(), entry);
        Ok(())
    }

    pub fn remove_monthly_override(&mut self, key: MonthKey) -> bool {
        self.overrides.remove(&key).is_some()
    }

    pub fn add_capital_change(&mut self, change: CapitalChange) {
        self.changes.push(change.normalized());
    }

    /// Replace the change with the same id. Returns false if none matched.
    pub fn update_capital_change(&mut self, change: CapitalChange) -> bool {
        match self.changes.iter_mut().find(|c| c.id == change.id) {
            Some(existing) => {
                *existing = change.normalized();
                true
            }
            None => false,
        }
    }

    pub fn delete_capital_change(&mut self, id: &str) -> bool {
        let before = self.changes.len();
        self.changes.retain(|c| c.id != id);
        self.changes.len() != before
    }

    /// Earliest month with any trade, capital change or yearly seed.
    pub fn earliest_month(&self, trades: &[Trade]) -> Option<MonthKey> {
        let trade_months = trades.iter().filter_map(|t| t.date.map(MonthKey::of));
        let change_months = self.changes.iter().map(CapitalChange::month_key);
        let seed_months = self.yearly.keys().map(|y| MonthKey::january(*y));
        trade_months.chain(change_months).chain(seed_months).min()
    }

    /// Latest month any input touches under the active basis.
    pub fn latest_month(&self, trades: &[Trade]) -> Option<MonthKey> {
        let trade_months = trades
            .iter()
            .flat_map(|t| basis::attributed_months(t, self.basis));
        let change_months = self.changes.iter().map(CapitalChange::month_key);
        let seed_months = self.yearly.keys().map(|y| MonthKey::january(*y));
        trade_months.chain(change_months).chain(seed_months).max()
    }

    /// Ledger record for `month` (three-letter token) and `year`.
    ///
    /// # Errors
    /// Returns `LedgerError::InvalidMonth` for an unknown month token and
    /// `LedgerError::OutOfRange` for a year past `MAX_LEDGER_YEAR`.
    pub fn monthly_portfolio(
        &self,
        trades: &[Trade],
        month: &str,
        year: i32,
    ) -> Result<MonthlyTruePortfolio, LedgerError> {
        let month: Month = month.parse()?;
        self.monthly_portfolio_at(trades, MonthKey::new(month, year))
    }

    pub fn monthly_portfolio_at(
        &self,
        trades: &[Trade],
        key: MonthKey,
    ) -> Result<MonthlyTruePortfolio, LedgerError> {
        LedgerPass::new(self, trades).monthly(key)
    }

    /// Closing capital for `key`, or the fallback size if the ledger fails.
    pub fn true_portfolio_size(&self, trades: &[Trade], key: MonthKey) -> Decimal {
        match self.monthly_portfolio_at(trades, key) {
            Ok(record) => record.final_capital,
            Err(e) => {
                warn!(month = %key, error = %e, "True portfolio size unavailable, using fallback");
                self.fallback_portfolio_size
            }
        }
    }

    /// Every month from the earliest data month through the later of the
    /// latest data month and `as_of`'s month, sharing one memo.
    pub fn all_monthly_portfolios(
        &self,
        trades: &[Trade],
        as_of: NaiveDate,
    ) -> Result<Vec<MonthlyTruePortfolio>, LedgerError> {
        let mut pass = LedgerPass::new(self, trades);
        let Some(start) = pass.earliest else {
            return Ok(Vec::new());
        };
        let end = self
            .latest_month(trades)
            .map_or(MonthKey::of(as_of), |latest| latest.max(MonthKey::of(as_of)));
        check_range(end)?;

        let mut out = Vec::new();
        let mut key = start;
        while key <= end {
            out.push(pass.monthly(key)?);
            key = key.next();
        }
        debug!(
            months = out.len(),
            from = %start,
            to = %end,
            basis = %self.basis,
            "Enumerated true portfolio months"
        );
        Ok(out)
    }

    /// A call-scoped portfolio-size resolver over `trades`.
    pub fn view<'a>(&'a self, trades: &'a [Trade]) -> LedgerView<'a> {
        LedgerView {
            pass: RefCell::new(LedgerPass::new(self, trades)),
        }
    }
}

/// One top-level evaluation: inputs plus a memo that dies with it.
struct LedgerPass<'a> {
    ledger: &'a TruePortfolioLedger,
    trades: &'a [Trade],
    earliest: Option<MonthKey>,
    memo: HashMap<MonthKey, MonthlyTruePortfolio>,
}

impl<'a> LedgerPass<'a> {
    fn new(ledger: &'a TruePortfolioLedger, trades: &'a [Trade]) -> Self {
        Self {
            ledger,
            trades,
            earliest: ledger.earliest_month(trades),
            memo: HashMap::new(),
        }
    }

    /// Opening capital that does not depend on the previous month.
    fn seed(&self, key: MonthKey) -> Option<Decimal> {
        if let Some(o) = self.ledger.overrides.get(&key) {
            return Some(o.starting_capital);
        }
        if Some(key) == self.earliest {
            return Some(
                self.ledger
                    .yearly
                    .get(&key.year)
                    .map(|y| y.starting_capital)
                    .unwrap_or_default(),
            );
        }
        None
    }

    fn monthly(&mut self, target: MonthKey) -> Result<MonthlyTruePortfolio, LedgerError> {
        let Some(earliest) = self.earliest else {
            return Ok(MonthlyTruePortfolio::zero(target));
        };
        if target < earliest {
            return Ok(MonthlyTruePortfolio::zero(target));
        }
        if let Some(hit) = self.memo.get(&target) {
            return Ok(hit.clone());
        }
        check_range(target)?;

        // Walk back to a month whose opening is known: a seed or a memo hit.
        let mut chain = vec![target];
        let mut carried = Decimal::zero();
        loop {
            let first = chain[chain.len() - 1];
            if self.seed(first).is_some() {
                break;
            }
            let prev = first.previous();
            if let Some(hit) = self.memo.get(&prev) {
                carried = hit.final_capital;
                break;
            }
            chain.push(prev);
        }

        let mut record = MonthlyTruePortfolio::zero(target);
        for key in chain.into_iter().rev() {
            let opening = self.seed(key).unwrap_or(carried);
            record = self.close_month(key, opening)?;
            carried = record.final_capital;
            self.memo.insert(key, record.clone());
        }
        Ok(record)
    }

    fn close_month(
        &self,
        key: MonthKey,
        opening: Decimal,
    ) -> Result<MonthlyTruePortfolio, LedgerError> {
        let overflow = || LedgerError::Overflow(key);

        let capital_changes = self
            .ledger
            .changes
            .iter()
            .filter(|c| c.month_key() == key)
            .try_fold(Decimal::zero(), |acc, c| acc.checked_add(c.signed_amount()))
            .ok_or_else(overflow)?;
        let starting_capital = opening.checked_add(capital_changes).ok_or_else(overflow)?;

        let pl = self
            .trades
            .iter()
            .map(|t| basis::attributed_pl(t, self.ledger.basis, key))
            .try_fold(Decimal::zero(), |acc, pl| acc.checked_add(pl))
            .ok_or_else(overflow)?;
        let final_capital = starting_capital.checked_add(pl).ok_or_else(overflow)?;

        Ok(MonthlyTruePortfolio {
            month: key.month,
            year: key.year,
            starting_capital,
            capital_changes,
            pl,
            final_capital,
        })
    }
}

fn check_range(key: MonthKey) -> Result<(), LedgerError> {
    if key.year > MAX_LEDGER_YEAR {
        return Err(LedgerError::OutOfRange(key));
    }
    Ok(())
}

/// Portfolio-size lookup backed by one ledger pass.
///
/// Meant to live for a single pipeline run; drop it once the run finishes.
pub struct LedgerView<'a> {
    pass: RefCell<LedgerPass<'a>>,
}

impl PortfolioSizeLookup for LedgerView<'_> {
    fn portfolio_size(&self, month: MonthKey) -> Decimal {
        let mut pass = self.pass.borrow_mut();
        match pass.monthly(month) {
            Ok(record) => record.final_capital,
            Err(e) => {
                warn!(month = %month, error = %e, "True portfolio size unavailable, using fallback");
                pass.ledger.fallback_portfolio_size
            }
        }
    }
}
