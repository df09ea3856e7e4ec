use crate::config::ConfigError;
use crate::engine::LedgerError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Store(StoreError::Db(err))
    }
}

impl From<crate::domain::MonthParseError> for AppError {
    fn from(err: crate::domain::MonthParseError) -> Self {
        AppError::Ledger(LedgerError::InvalidMonth(err))
    }
}
