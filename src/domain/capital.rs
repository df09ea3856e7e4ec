//! Capital ledger inputs: deposits/withdrawals and starting-capital seeds.

use crate::domain::{Decimal, Month, MonthKey};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapitalChangeKind {
    Deposit,
    Withdrawal,
}

/// A dated deposit or withdrawal.
///
/// `kind` decides the direction. Records built here carry a signed `amount`
/// (withdrawals negative); imported records may carry a bare magnitude, so
/// the ledger reads `signed_amount` rather than `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapitalChange {
    pub id: String,
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(rename = "type")]
    pub kind: CapitalChangeKind,
    #[serde(default)]
    pub description: String,
}

impl CapitalChange {
    /// Record a deposit of `amount` (magnitude).
    pub fn deposit(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        Self::signed(date, amount.abs(), description)
    }

    /// Record a withdrawal of `amount` (magnitude).
    pub fn withdrawal(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        Self::signed(date, -amount.abs(), description)
    }

    /// Record a change from a signed amount; the kind follows the sign.
    pub fn signed(date: NaiveDate, amount: Decimal, description: impl Into<String>) -> Self {
        let kind = if amount.is_negative() {
            CapitalChangeKind::Withdrawal
        } else {
            CapitalChangeKind::Deposit
        };
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            date,
            amount,
            kind,
            description: description.into(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey::of(self.date)
    }

    /// Amount with the sign implied by `kind`.
    pub fn signed_amount(&self) -> Decimal {
        match self.kind {
            CapitalChangeKind::Deposit => self.amount.abs(),
            CapitalChangeKind::Withdrawal => -self.amount.abs(),
        }
    }

    /// Rewrite `amount` so its sign agrees with `kind`.
    pub fn normalized(mut self) -> Self {
        self.amount = self.signed_amount();
        self
    }
}

/// Capital base for January of `year`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YearlyStartingCapital {
    pub year: i32,
    pub starting_capital: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl YearlyStartingCapital {
    pub fn new(year: i32, starting_capital: Decimal) -> Self {
        Self {
            year,
            starting_capital,
            updated_at: Utc::now(),
        }
    }
}

/// Replaces the derived starting capital of one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyStartingCapitalOverride {
    pub month: Month,
    pub year: i32,
    pub starting_capital: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl MonthlyStartingCapitalOverride {
    pub fn new(month: Month, year: i32, starting_capital: Decimal) -> Self {
        Self {
            month,
            year,
            starting_capital,
            updated_at: Utc::now(),
        }
    }

    pub fn key(&self) -> MonthKey {
        MonthKey::new(self.month, self.year)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn withdrawal_is_stored_negative() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let w = CapitalChange::withdrawal(date, d("5000"), "rent");
        assert_eq!(w.amount, d("-5000"));
        assert_eq!(w.kind, CapitalChangeKind::Withdrawal);

        let dep = CapitalChange::deposit(date, d("-20000"), "bonus");
        assert_eq!(dep.amount, d("20000"));
        assert_eq!(dep.kind, CapitalChangeKind::Deposit);
    }

    #[test]
    fn signed_change_kind_follows_sign() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        assert_eq!(
            CapitalChange::signed(date, d("-1"), "").kind,
            CapitalChangeKind::Withdrawal
        );
        assert_ne!(
            CapitalChange::signed(date, d("1"), "").id,
            CapitalChange::signed(date, d("1"), "").id
        );
    }

    #[test]
    fn capital_change_json_uses_type_field() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let change = CapitalChange::deposit(date, d("100"), "").with_id("c1");
        let value = serde_json::to_value(&change).unwrap();
        assert_eq!(value["type"], "deposit");
        assert_eq!(value["date"], "2024-02-01");
        assert_eq!(value["id"], "c1");
    }

    #[test]
    fn override_key() {
        let o = MonthlyStartingCapitalOverride::new(Month::Jun, 2024, d("500000"));
        assert_eq!(o.key(), MonthKey::new(Month::Jun, 2024));
    }

    #[test]
    fn kind_decides_the_sign() {
        let imported: CapitalChange = serde_json::from_str(
            r#"{"id":"w","date":"2024-02-10","amount":5000,"type":"withdrawal"}"#,
        )
        .unwrap();
        assert_eq!(imported.amount, d("5000"));
        assert_eq!(imported.signed_amount(), d("-5000"));
        assert_eq!(imported.normalized().amount, d("-5000"));

        let date = NaiveDate::from_ymd_opt(2024, 2, 1).unwrap();
        let mut edited = CapitalChange::withdrawal(date, d("10"), "");
        edited.kind = CapitalChangeKind::Deposit;
        assert_eq!(edited.signed_amount(), d("10"));
    }
}
