//! Pure computation engine(s) for deterministic journal metrics.

pub mod basis;
pub mod ledger;
pub mod lots;

pub use basis::{attributed_pl, cash_exits, relevant_date, trade_pl, CashExit};
pub use ledger::{
    LedgerError, LedgerView, MonthlyTruePortfolio, PortfolioSizeLookup, TruePortfolioLedger,
    DEFAULT_FALLBACK_PORTFOLIO_SIZE, MAX_LEDGER_YEAR,
};
