//! Lot arithmetic: weighted averages, FIFO realized P/L, sizing and percentage metrics.
//!
//! Every function here is total. Zero or negative denominators yield 0.

use crate::domain::{Decimal, Lot, PositionStatus, Side};
use chrono::NaiveDate;

/// Quantity-weighted average price over qualifying lots.
fn weighted_average(lots: &[Lot]) -> Decimal {
    let (value, qty) = lots
        .iter()
        .filter(|lot| lot.is_qualifying())
        .fold((Decimal::zero(), Decimal::zero()), |(value, qty), lot| {
            (value + lot.price * lot.qty, qty + lot.qty)
        });
    value.safe_div(qty)
}

/// Weighted average entry price; 0 if no lot has positive price and quantity.
pub fn avg_entry(lots: &[Lot]) -> Decimal {
    weighted_average(lots)
}

/// Weighted average exit price; 0 if no lot has positive price and quantity.
pub fn avg_exit_price(lots: &[Lot]) -> Decimal {
    weighted_average(lots)
}

pub fn position_size(avg_price: Decimal, total_qty: Decimal) -> Decimal {
    avg_price * total_qty
}

/// Position size as a percentage of the portfolio.
pub fn allocation(position_size: Decimal, portfolio_size: Decimal) -> Decimal {
    percent_of(position_size, portfolio_size)
}

/// Stop distance as a percentage of the entry price.
pub fn sl_percent(sl: Decimal, entry: Decimal) -> Decimal {
    if !sl.is_positive() || !entry.is_positive() {
        return Decimal::zero();
    }
    (entry - sl).abs().safe_div(entry) * Decimal::hundred()
}

/// Sum of exit quantities; negative quantities count as 0.
pub fn exited_qty(qtys: &[Decimal]) -> Decimal {
    qtys.iter().map(|q| q.floor_zero()).sum()
}

/// Remaining quantity, clamped at 0 when exits exceed entries.
pub fn open_qty(total_entry_qty: Decimal, exited_qty: Decimal) -> Decimal {
    (total_entry_qty - exited_qty).floor_zero()
}

pub fn position_status(open_qty: Decimal, exited_qty: Decimal) -> PositionStatus {
    if !exited_qty.is_positive() {
        PositionStatus::Open
    } else if open_qty.is_zero() {
        PositionStatus::Closed
    } else {
        PositionStatus::Partial
    }
}

/// P/L of `qty` units bought at `entry` and closed at `exit` on `side`.
fn unit_pl(entry: Decimal, exit: Decimal, side: Side) -> Decimal {
    match side {
        Side::Buy => exit - entry,
        Side::Sell => entry - exit,
    }
}

/// Realized P/L matching exits against entry lots oldest first.
///
/// Lots are split as needed. Exit quantity beyond the available entry
/// quantity is ignored.
pub fn realized_pl_fifo(entry_lots: &[Lot], exit_lots: &[Lot], side: Side) -> Decimal {
    let entries: Vec<&Lot> = entry_lots.iter().filter(|l| l.is_qualifying()).collect();
    let mut remaining: Vec<Decimal> = entries.iter().map(|l| l.qty).collect();
    let mut idx = 0;
    let mut total = Decimal::zero();

    for exit in exit_lots.iter().filter(|l| l.is_qualifying()) {
        let mut to_match = exit.qty;
        while to_match.is_positive() && idx < entries.len() {
            let take = remaining[idx].min(to_match);
            total += unit_pl(entries[idx].price, exit.price, side) * take;
            remaining[idx] = remaining[idx] - take;
            to_match = to_match - take;
            if !remaining[idx].is_positive() {
                idx += 1;
            }
        }
    }

    total
}

/// P/L of a single exit lot measured against the average entry price.
pub fn exit_pl(exit_price: Decimal, exit_qty: Decimal, avg_entry: Decimal, side: Side) -> Decimal {
    unit_pl(avg_entry, exit_price, side) * exit_qty
}

/// Price the position is marked at for move and reward figures.
///
/// Closed positions use the average exit, open ones the live price, partial
/// ones a quantity-weighted blend. A missing live price falls back to the
/// average entry.
pub fn reference_price(
    avg_entry: Decimal,
    avg_exit: Decimal,
    cmp: Decimal,
    open_qty: Decimal,
    exited_qty: Decimal,
    status: PositionStatus,
) -> Decimal {
    let live = if cmp.is_positive() { cmp } else { avg_entry };
    let realized = if avg_exit.is_positive() { avg_exit } else { avg_entry };
    match status {
        PositionStatus::Open => live,
        PositionStatus::Closed => realized,
        PositionStatus::Partial => {
            (realized * exited_qty + live * open_qty).safe_div(exited_qty + open_qty)
        }
    }
}

/// Percentage price move from the average entry in the trade's favour.
pub fn stock_move(
    avg_entry: Decimal,
    avg_exit: Decimal,
    cmp: Decimal,
    open_qty: Decimal,
    exited_qty: Decimal,
    status: PositionStatus,
    side: Side,
) -> Decimal {
    if !avg_entry.is_positive() {
        return Decimal::zero();
    }
    let price = reference_price(avg_entry, avg_exit, cmp, open_qty, exited_qty, status);
    unit_pl(avg_entry, price, side).safe_div(avg_entry) * Decimal::hundred()
}

/// Reward multiple of the initial risk (`|entry - sl|`).
pub fn reward_risk(entry: Decimal, sl: Decimal, target: Decimal, side: Side) -> Decimal {
    if !entry.is_positive() || !sl.is_positive() || !target.is_positive() {
        return Decimal::zero();
    }
    unit_pl(entry, target, side).safe_div((entry - sl).abs())
}

fn days_between(start: Option<NaiveDate>, end: NaiveDate) -> Decimal {
    match start {
        Some(start) => Decimal::from_i64((end - start).num_days().max(0)),
        None => Decimal::zero(),
    }
}

/// Quantity-weighted average holding period in whole days.
///
/// Entry tranches are matched FIFO against exits; each matched chunk is held
/// from its entry date to its exit date, unmatched quantity to `as_of`. Exits
/// without a date count as `as_of`; entries without a date contribute 0 days.
pub fn holding_days(entry_lots: &[Lot], exit_lots: &[Lot], as_of: NaiveDate) -> i64 {
    let entries: Vec<&Lot> = entry_lots.iter().filter(|l| l.is_qualifying()).collect();
    let mut remaining: Vec<Decimal> = entries.iter().map(|l| l.qty).collect();
    let total_qty: Decimal = remaining.iter().copied().sum();
    let mut weighted = Decimal::zero();
    let mut idx = 0;

    for exit in exit_lots.iter().filter(|l| l.qty.is_positive()) {
        let exit_date = exit.date.unwrap_or(as_of);
        let mut to_match = exit.qty;
        while to_match.is_positive() && idx < entries.len() {
            let take = remaining[idx].min(to_match);
            weighted += take * days_between(entries[idx].date, exit_date);
            remaining[idx] = remaining[idx] - take;
            to_match = to_match - take;
            if !remaining[idx].is_positive() {
                idx += 1;
            }
        }
    }

    for (lot, qty) in entries.iter().zip(remaining.iter()).skip(idx) {
        weighted += *qty * days_between(lot.date, as_of);
    }

    weighted.safe_div(total_qty).round_to_i64()
}

pub fn realised_amount(exited_qty: Decimal, avg_exit: Decimal) -> Decimal {
    exited_qty * avg_exit
}

/// P/L as a percentage of the portfolio.
pub fn pf_impact(pl: Decimal, portfolio_size: Decimal) -> Decimal {
    percent_of(pl, portfolio_size)
}

/// Open risk to the stop as a percentage of the portfolio.
///
/// The trailing stop wins over the initial stop when set.
pub fn open_heat(
    avg_entry: Decimal,
    sl: Decimal,
    tsl: Decimal,
    open_qty: Decimal,
    side: Side,
    portfolio_size: Decimal,
) -> Decimal {
    let stop = if tsl.is_positive() { tsl } else { sl };
    if !stop.is_positive() || !avg_entry.is_positive() || !open_qty.is_positive() {
        return Decimal::zero();
    }
    let risk_per_unit = unit_pl(stop, avg_entry, side).floor_zero();
    percent_of(risk_per_unit * open_qty, portfolio_size)
}

fn percent_of(value: Decimal, base: Decimal) -> Decimal {
    if !base.is_positive() {
        return Decimal::zero();
    }
    value.safe_div(base) * Decimal::hundred()
}
