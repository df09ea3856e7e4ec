use crate::domain::{AccountingBasis, Decimal};
use crate::engine::ledger::DEFAULT_FALLBACK_PORTFOLIO_SIZE;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub basis: AccountingBasis,
    /// Portfolio size used when the ledger cannot produce one.
    pub default_portfolio_size: Decimal,
    pub recalc_delay_ms: u64,
    pub persist_debounce_ms: u64,
    /// Evaluation date for open positions; `None` means today.
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let basis = match env_map
            .get("ACCOUNTING_BASIS")
            .map(|s| s.as_str())
            .unwrap_or("accrual")
        {
            "accrual" => AccountingBasis::Accrual,
            "cash" => AccountingBasis::Cash,
            other => {
                return Err(ConfigError::InvalidValue(
                    "ACCOUNTING_BASIS".to_string(),
                    format!("must be accrual or cash, got {}", other),
                ))
            }
        };

        let default_portfolio_size = match env_map.get("DEFAULT_PORTFOLIO_SIZE") {
            Some(raw) => Decimal::from_str(raw)
                .ok()
                .filter(|size| size.is_positive())
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "DEFAULT_PORTFOLIO_SIZE".to_string(),
                        "must be a positive decimal".to_string(),
                    )
                })?,
            None => Decimal::from_i64(DEFAULT_FALLBACK_PORTFOLIO_SIZE),
        };

        let recalc_delay_ms = parse_ms(&env_map, "RECALC_DELAY_MS", 250)?;
        let persist_debounce_ms = parse_ms(&env_map, "PERSIST_DEBOUNCE_MS", 500)?;

        let as_of = env_map
            .get("AS_OF_DATE")
            .map(|s| {
                NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                    ConfigError::InvalidValue(
                        "AS_OF_DATE".to_string(),
                        "must be a YYYY-MM-DD date".to_string(),
                    )
                })
            })
            .transpose()?;

        Ok(Config {
            database_path,
            basis,
            default_portfolio_size,
            recalc_delay_ms,
            persist_debounce_ms,
            as_of,
        })
    }

    pub fn recalc_delay(&self) -> Duration {
        Duration::from_millis(self.recalc_delay_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }

    /// The configured evaluation date, or today (UTC).
    pub fn as_of_date(&self) -> NaiveDate {
        self.as_of
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_path: ":memory:".to_string(),
            basis: AccountingBasis::Accrual,
            default_portfolio_size: Decimal::from_i64(DEFAULT_FALLBACK_PORTFOLIO_SIZE),
            recalc_delay_ms: 250,
            persist_debounce_ms: 500,
            as_of: None,
        }
    }
}

fn parse_ms(
    env_map: &HashMap<String, String>,
    key: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match env_map.get(key) {
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(key.to_string(), "must be a valid u64".to_string())
        }),
        None => Ok(default),
    }
}
