//! Stable trade ordering for the cumulative pass.

use crate::domain::Trade;
use chrono::NaiveDate;
use std::cmp::Ordering;

/// Stable ordering key for trades.
///
/// Ordering: dated trades by date, then undated trades; ties by `trade_no`
/// (lexical), then `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeOrderingKey {
    /// Trade date (primary sort). `None` sorts after every date.
    pub date: Option<NaiveDate>,
    /// Trade number (secondary sort, lexical).
    pub trade_no: String,
    /// Trade id (fallback sort).
    pub id: String,
}

impl TradeOrderingKey {
    /// Create an ordering key from a Trade.
    pub fn from_trade(trade: &Trade) -> Self {
        TradeOrderingKey {
            date: trade.date,
            trade_no: trade.trade_no.clone(),
            id: trade.id.clone(),
        }
    }
}

impl Ord for TradeOrderingKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let by_date = match (self.date, other.date) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date
            .then_with(|| self.trade_no.cmp(&other.trade_no))
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for TradeOrderingKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Sort trades deterministically.
pub fn sort_trades_deterministic(trades: &mut [Trade]) {
    trades.sort_by_cached_key(TradeOrderingKey::from_trade);
}
