pub mod compile;
pub mod config;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod store;

pub use compile::{Pipeline, PipelineContext, RecalcStatus, TradeSet};
pub use config::Config;
pub use db::{init_db, Repository};
pub use domain::{
    AccountingBasis, CapitalChange, CapitalChangeKind, Decimal, Month, MonthKey,
    MonthlyStartingCapitalOverride, PositionStatus, Side, Trade, YearlyStartingCapital,
};
pub use engine::{MonthlyTruePortfolio, PortfolioSizeLookup, TruePortfolioLedger};
pub use error::AppError;
pub use orchestration::Journal;
pub use store::{JournalStore, MemoryStore, Snapshot, StoreError};
