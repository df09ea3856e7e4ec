//! Domain primitives: Side, PositionStatus, AccountingBasis, Month, MonthKey.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Trade side: Buy (long) or Sell (short).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "Buy"),
            Side::Sell => write!(f, "Sell"),
        }
    }
}

/// Lifecycle state of a position, derived from entered vs exited quantity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionStatus {
    #[default]
    Open,
    Partial,
    Closed,
}

/// Accounting convention deciding *when* realized P/L is attributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountingBasis {
    /// P/L belongs to the month the trade was initiated.
    #[default]
    Accrual,
    /// P/L belongs to the month each exit lot was executed.
    Cash,
}

impl AccountingBasis {
    pub fn from_cash_flag(use_cash_basis: bool) -> Self {
        if use_cash_basis {
            AccountingBasis::Cash
        } else {
            AccountingBasis::Accrual
        }
    }

    pub fn is_cash(&self) -> bool {
        matches!(self, AccountingBasis::Cash)
    }
}

impl fmt::Display for AccountingBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountingBasis::Accrual => write!(f, "accrual"),
            AccountingBasis::Cash => write!(f, "cash"),
        }
    }
}

/// Unrecognized month token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid month token: {0:?}")]
pub struct MonthParseError(pub String);

/// Calendar month, written as a three-letter token (`Jan` .. `Dec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Month {
    Jan,
    Feb,
    Mar,
    Apr,
    May,
    Jun,
    Jul,
    Aug,
    Sep,
    Oct,
    Nov,
    Dec,
}

impl Month {
    pub const ALL: [Month; 12] = [
        Month::Jan,
        Month::Feb,
        Month::Mar,
        Month::Apr,
        Month::May,
        Month::Jun,
        Month::Jul,
        Month::Aug,
        Month::Sep,
        Month::Oct,
        Month::Nov,
        Month::Dec,
    ];

    /// 1-based month number.
    pub fn number(&self) -> u32 {
        *self as u32 + 1
    }

    /// Month from a 1-based number; `None` outside 1..=12.
    pub fn from_number(n: u32) -> Option<Self> {
        if (1..=12).contains(&n) {
            Some(Self::ALL[(n - 1) as usize])
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Month::Jan => "Jan",
            Month::Feb => "Feb",
            Month::Mar => "Mar",
            Month::Apr => "Apr",
            Month::May => "May",
            Month::Jun => "Jun",
            Month::Jul => "Jul",
            Month::Aug => "Aug",
            Month::Sep => "Sep",
            Month::Oct => "Oct",
            Month::Nov => "Nov",
            Month::Dec => "Dec",
        }
    }
}

impl fmt::Display for Month {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Month {
    type Err = MonthParseError;

    /// Accepts the three-letter token case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        Month::ALL
            .iter()
            .copied()
            .find(|m| m.as_str().eq_ignore_ascii_case(token))
            .ok_or_else(|| MonthParseError(s.to_string()))
    }
}

impl TryFrom<String> for Month {
    type Error = MonthParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Month> for String {
    fn from(value: Month) -> Self {
        value.as_str().to_string()
    }
}

/// A (year, month) calendar key. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MonthKey {
    pub year: i32,
    pub month: Month,
}

impl MonthKey {
    pub fn new(month: Month, year: i32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        let month = Month::from_number(date.month()).unwrap_or(Month::Jan);
        Self::new(month, date.year())
    }

    pub fn january(year: i32) -> Self {
        Self::new(Month::Jan, year)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        Self::of(date) == *self
    }

    pub fn previous(&self) -> Self {
        match self.month {
            Month::Jan => Self::new(Month::Dec, self.year - 1),
            m => Self::new(Month::ALL[(m.number() - 2) as usize], self.year),
        }
    }

    pub fn next(&self) -> Self {
        match self.month {
            Month::Dec => Self::new(Month::Jan, self.year + 1),
            m => Self::new(Month::ALL[m.number() as usize], self.year),
        }
    }
}

impl fmt::Display for MonthKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.month, self.year)
    }
}
