//! Accounting basis resolution: which date and which P/L a trade contributes.
//!
//! Accrual attributes the whole realized P/L to the trade's initiation date.
//! Cash attributes each exit lot separately to the date it was executed.
//! Everything here works from raw trade fields, so callers may pass trades
//! that have not been through the pipeline yet.

use crate::domain::{AccountingBasis, Decimal, MonthKey, PositionStatus, Trade};
use crate::engine::lots;
use chrono::NaiveDate;

/// One realized exit under cash basis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CashExit {
    pub date: Option<NaiveDate>,
    pub qty: Decimal,
    pub price: Decimal,
    pub pl: Decimal,
}

/// Aggregates the resolver needs, computed from raw fields.
struct RawPosition {
    realized: Decimal,
    status: PositionStatus,
}

fn raw_position(trade: &Trade) -> RawPosition {
    let entries = trade.entry_lots();
    let exits = trade.exit_lots();
    let exited = lots::exited_qty(&trade.exit_qtys());
    let open = lots::open_qty(trade.total_entry_qty(), exited);
    RawPosition {
        realized: lots::realized_pl_fifo(&entries, &exits, trade.buy_sell),
        status: lots::position_status(open, exited),
    }
}

/// Per-exit P/L observations, one per exit lot with positive price and quantity.
///
/// Exit quantities are clamped in slot order to the total entry quantity, the
/// same way FIFO matching ignores the excess. Exits left with nothing to close
/// are dropped.
pub fn cash_exits(trade: &Trade) -> Vec<CashExit> {
    let avg_entry = lots::avg_entry(&trade.entry_lots());
    let mut available = trade.total_entry_qty();
    trade
        .exit_lots()
        .into_iter()
        .filter_map(|exit| {
            let qty = exit.qty.min(available);
            if !qty.is_positive() {
                return None;
            }
            available = available - qty;
            Some(CashExit {
                date: exit.date,
                qty,
                price: exit.price,
                pl: lots::exit_pl(exit.price, qty, avg_entry, trade.buy_sell),
            })
        })
        .collect()
}

/// Date whose month a trade's P/L is attributed to when viewed as a whole.
///
/// Cash basis uses the latest dated exit and falls back to the trade date.
pub fn relevant_date(trade: &Trade, basis: AccountingBasis) -> Option<NaiveDate> {
    match basis {
        AccountingBasis::Accrual => trade.date,
        AccountingBasis::Cash => trade
            .exit_lots()
            .iter()
            .filter_map(|exit| exit.date)
            .max()
            .or(trade.date),
    }
}

/// A trade's whole P/L under `basis`.
pub fn trade_pl(trade: &Trade, basis: AccountingBasis) -> Decimal {
    let position = raw_position(trade);
    match (basis, position.status) {
        (_, PositionStatus::Open) => Decimal::zero(),
        (AccountingBasis::Accrual, _) => position.realized,
        (AccountingBasis::Cash, PositionStatus::Closed) => position.realized,
        (AccountingBasis::Cash, PositionStatus::Partial) => {
            cash_exits(trade).into_iter().map(|exit| exit.pl).sum()
        }
    }
}

/// P/L a trade contributes to one calendar month under `basis`.
pub fn attributed_pl(trade: &Trade, basis: AccountingBasis, month: MonthKey) -> Decimal {
    match basis {
        AccountingBasis::Accrual => match trade.date {
            Some(date) if month.contains(date) => trade_pl(trade, basis),
            _ => Decimal::zero(),
        },
        AccountingBasis::Cash => cash_exits(trade)
            .into_iter()
            .filter(|exit| exit.date.is_some_and(|date| month.contains(date)))
            .map(|exit| exit.pl)
            .sum(),
    }
}

/// Months a trade can touch under `basis`, used to bound the ledger.
pub fn attributed_months(trade: &Trade, basis: AccountingBasis) -> Vec<MonthKey> {
    let mut months: Vec<MonthKey> = trade.date.map(MonthKey::of).into_iter().collect();
    if basis.is_cash() {
        months.extend(
            trade
                .exit_lots()
                .iter()
                .filter_map(|exit| exit.date.map(MonthKey::of)),
        );
    }
    months
}
