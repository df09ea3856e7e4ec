//! Two-pass trade recalculation.

use crate::domain::{sort_trades_deterministic, AccountingBasis, Decimal, MonthKey, PositionStatus, Trade};
use crate::engine::ledger::PortfolioSizeLookup;
use crate::engine::{basis, lots};
use chrono::NaiveDate;
use tracing::debug;

/// Inputs that are the same for every trade in a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineContext {
    pub basis: AccountingBasis,
    /// Evaluation date for positions still held.
    pub as_of: NaiveDate,
}

impl PipelineContext {
    pub fn new(basis: AccountingBasis, as_of: NaiveDate) -> Self {
        Self { basis, as_of }
    }
}

/// Trade recalculation pipeline.
pub struct Pipeline;

impl Pipeline {
    /// Fully derive `trades`: sort, per-trade metrics, then the cumulative fold.
    ///
    /// # Arguments
    /// * `trades` - Raw or previously derived trades, in any order
    /// * `lookup` - Portfolio size per calendar month
    /// * `ctx` - Accounting basis and evaluation date
    ///
    /// # Returns
    /// The trades in deterministic order with every derived field rewritten
    pub fn recalculate(
        trades: &[Trade],
        lookup: &dyn PortfolioSizeLookup,
        ctx: PipelineContext,
    ) -> Vec<Trade> {
        let mut sorted = trades.to_vec();
        sort_trades_deterministic(&mut sorted);

        let mut derived: Vec<Trade> = sorted
            .iter()
            .map(|trade| Self::derive_trade(trade, lookup, ctx))
            .collect();
        Self::accumulate_pf(&mut derived);

        debug!(
            trades = derived.len(),
            basis = %ctx.basis,
            "Recalculated trade set"
        );
        derived
    }

    /// Pass 1 for a single trade. `cumm_pf` is left untouched.
    pub fn quick_pass(
        trade: &Trade,
        lookup: &dyn PortfolioSizeLookup,
        ctx: PipelineContext,
    ) -> Trade {
        Self::derive_trade(trade, lookup, ctx)
    }

    fn derive_trade(trade: &Trade, lookup: &dyn PortfolioSizeLookup, ctx: PipelineContext) -> Trade {
        let mut t = trade.clone();
        let side = t.buy_sell;
        t.name = t.name.to_uppercase();

        let entries = t.entry_lots();
        let exits = t.exit_lots();
        let total_qty = t.total_entry_qty();

        t.avg_entry = lots::avg_entry(&entries);
        t.position_size = lots::position_size(t.avg_entry, total_qty);

        let entry_pf = size_at(lookup, t.date);
        t.allocation = lots::allocation(t.position_size, entry_pf);
        t.sl_percent = lots::sl_percent(t.sl, t.entry);

        t.exited_qty = lots::exited_qty(&t.exit_qtys());
        t.open_qty = lots::open_qty(total_qty, t.exited_qty);
        t.avg_exit_price = lots::avg_exit_price(&exits);
        t.position_status = lots::position_status(t.open_qty, t.exited_qty);

        t.stock_move = lots::stock_move(
            t.avg_entry,
            t.avg_exit_price,
            t.cmp,
            t.open_qty,
            t.exited_qty,
            t.position_status,
            side,
        );
        let target = lots::reference_price(
            t.avg_entry,
            t.avg_exit_price,
            t.cmp,
            t.open_qty,
            t.exited_qty,
            t.position_status,
        );
        let risk_entry = if t.entry.is_positive() { t.entry } else { t.avg_entry };
        t.reward_risk = lots::reward_risk(risk_entry, t.sl, target, side);
        t.holding_days = lots::holding_days(&entries, &exits, ctx.as_of);
        t.realised_amount = lots::realised_amount(t.exited_qty, t.avg_exit_price);

        // Basis changes when P/L lands, never how much.
        t.pl_rs = lots::realized_pl_fifo(&entries, &exits, side);
        let basis_pf = size_at(lookup, basis::relevant_date(&t, ctx.basis));
        t.pf_impact = lots::pf_impact(basis::trade_pl(&t, ctx.basis), basis_pf);

        t.open_heat = lots::open_heat(t.avg_entry, t.sl, t.tsl, t.open_qty, side, entry_pf);
        t
    }

    /// Pass 2: strict left fold of `pf_impact` in the current order.
    fn accumulate_pf(trades: &mut [Trade]) {
        let mut running = Decimal::zero();
        for trade in trades.iter_mut() {
            if trade.position_status != PositionStatus::Open {
                running += trade.pf_impact;
            }
            trade.cumm_pf = running;
        }
    }
}

fn size_at(lookup: &dyn PortfolioSizeLookup, date: Option<NaiveDate>) -> Decimal {
    date.map(|d| lookup.portfolio_size(MonthKey::of(d)))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Side;

    struct FlatPortfolio(Decimal);

    impl PortfolioSizeLookup for FlatPortfolio {
        fn portfolio_size(&self, _month: MonthKey) -> Decimal {
            self.0
        }
    }

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn date(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, day)
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new(AccountingBasis::Accrual, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap())
    }

    #[test]
    fn test_derive_closed_trade() {
        let trade = Trade::new("1", date(2024, 1, 1), "reliance", Side::Buy, d("100"), d("10"))
            .with_stops(d("95"), Decimal::zero())
            .with_pyramid(1, d("110"), d("10"), date(2024, 1, 11))
            .with_exit(1, d("120"), d("20"), date(2024, 1, 21));
        let out = Pipeline::recalculate(&[trade], &FlatPortfolio(d("100000")), ctx());
        let t = &out[0];

        assert_eq!(t.name, "RELIANCE");
        assert_eq!(t.avg_entry, d("105"));
        assert_eq!(t.position_size, d("2100"));
        assert_eq!(t.allocation, d("2.1"));
        assert_eq!(t.sl_percent, d("5"));
        assert_eq!(t.position_status, PositionStatus::Closed);
        assert_eq!(t.pl_rs, d("300"));
        assert_eq!(t.pf_impact, d("0.3"));
        assert_eq!(t.cumm_pf, d("0.3"));
        assert_eq!(t.realised_amount, d("2400"));
        // 10 units held 20 days, 10 units held 10 days.
        assert_eq!(t.holding_days, 15);
        assert_eq!(t.open_heat, Decimal::zero());
    }

    #[test]
    fn test_open_trade_not_accumulated() {
        let trade = Trade::new("1", date(2024, 1, 1), "abc", Side::Buy, d("100"), d("10"))
            .with_stops(d("90"), Decimal::zero())
            .with_cmp(d("110"));
        let out = Pipeline::recalculate(&[trade], &FlatPortfolio(d("10000")), ctx());
        let t = &out[0];

        assert_eq!(t.position_status, PositionStatus::Open);
        assert_eq!(t.cumm_pf, Decimal::zero());
        assert_eq!(t.stock_move, d("10"));
        assert_eq!(t.reward_risk, d("1"));
        // (100 - 90) * 10 / 10000 * 100
        assert_eq!(t.open_heat, d("1"));
    }

    #[test]
    fn test_quick_pass_keeps_cumm_pf() {
        let mut trade = Trade::new("1", date(2024, 1, 1), "abc", Side::Buy, d("100"), d("10"))
            .with_exit(1, d("110"), d("10"), date(2024, 1, 5));
        trade.cumm_pf = d("42");
        let out = Pipeline::quick_pass(&trade, &FlatPortfolio(d("10000")), ctx());
        assert_eq!(out.pl_rs, d("100"));
        assert_eq!(out.cumm_pf, d("42"));
    }

    #[test]
    fn test_zero_portfolio_degrades_to_zero() {
        let trade = Trade::new("1", date(2024, 1, 1), "abc", Side::Buy, d("100"), d("10"))
            .with_exit(1, d("110"), d("10"), date(2024, 1, 5));
        let out = Pipeline::recalculate(&[trade], &FlatPortfolio(Decimal::zero()), ctx());
        assert_eq!(out[0].allocation, Decimal::zero());
        assert_eq!(out[0].pf_impact, Decimal::zero());
        assert_eq!(out[0].pl_rs, d("100"));
    }

    #[test]
    fn test_extreme_values_degrade_instead_of_panicking() {
        let huge = d("1000000000000000");
        let trade = Trade::new("1", date(2024, 1, 1), "big", Side::Buy, huge, huge)
            .with_stops(d("1"), Decimal::zero())
            .with_cmp(huge)
            .with_exit(1, d("2000000000000000"), huge, date(2024, 1, 5));

        for basis in [AccountingBasis::Accrual, AccountingBasis::Cash] {
            let ctx = PipelineContext::new(basis, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
            let out = Pipeline::recalculate(&[trade.clone()], &FlatPortfolio(d("100000")), ctx);
            let t = &out[0];

            assert_eq!(t.position_status, PositionStatus::Closed);
            assert_eq!(t.position_size, Decimal::zero());
            assert_eq!(t.pl_rs, Decimal::zero());
            assert_eq!(t.cumm_pf, t.pf_impact);
            assert_eq!(t.holding_days, 4);
        }
    }
}
