//! Domain types and determinism layer for the trading journal.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Side, PositionStatus, AccountingBasis, Month, MonthKey
//! - Trade and capital-ledger records with camelCase JSON serialization
//! - Stable trade ordering key for the cumulative fold

pub mod capital;
pub mod decimal;
pub mod ordering;
pub mod primitives;
pub mod trade;

pub use capital::{
    CapitalChange, CapitalChangeKind, MonthlyStartingCapitalOverride, YearlyStartingCapital,
};
pub use decimal::Decimal;
pub use ordering::{sort_trades_deterministic, TradeOrderingKey};
pub use primitives::{AccountingBasis, Month, MonthKey, MonthParseError, PositionStatus, Side};
pub use trade::{parse_journal_date, Lot, Trade, MAX_EXITS, MAX_PYRAMIDS};
