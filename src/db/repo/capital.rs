//! Capital ledger input operations.

use super::Repository;
use crate::domain::{
    CapitalChange, CapitalChangeKind, Decimal, Month, MonthlyStartingCapitalOverride,
    YearlyStartingCapital,
};
use crate::store::StoreError;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::Row;
use std::str::FromStr;
use tracing::warn;

fn parse_amount(column: &str, key: &str, raw: &str) -> Decimal {
    Decimal::from_str(raw).unwrap_or_else(|e| {
        warn!(
            column,
            key,
            value = %raw,
            error = %e,
            "Failed to parse stored decimal, using default"
        );
        Decimal::default()
    })
}

fn parse_updated_at(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

impl Repository {
    // =========================================================================
    // Capital change operations
    // =========================================================================

    /// Replace every stored capital change.
    pub async fn replace_capital_changes(&self, changes: &[CapitalChange]) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM capital_changes")
            .execute(&mut *tx)
            .await?;

        for change in changes {
            let kind = match change.kind {
                CapitalChangeKind::Deposit => "deposit",
                CapitalChangeKind::Withdrawal => "withdrawal",
            };
            sqlx::query(
                r#"
                INSERT INTO capital_changes (id, date, amount, kind, description)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    date = excluded.date,
                    amount = excluded.amount,
                    kind = excluded.kind,
                    description = excluded.description
                "#,
            )
            .bind(change.id.as_str())
            .bind(change.date.format("%Y-%m-%d").to_string())
            .bind(change.amount.to_canonical_string())
            .bind(kind)
            .bind(change.description.as_str())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load capital changes ordered by date. Rows with an unreadable date are skipped.
    pub async fn query_capital_changes(&self) -> Result<Vec<CapitalChange>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, date, amount, kind, description
            FROM capital_changes
            ORDER BY date ASC, id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let changes = rows
            .iter()
            .filter_map(|row| {
                let id: String = row.get("id");
                let date_str: String = row.get("date");
                let amount_str: String = row.get("amount");
                let kind_str: String = row.get("kind");
                let description: String = row.get("description");

                let date = match NaiveDate::parse_from_str(&date_str, "%Y-%m-%d") {
                    Ok(date) => date,
                    Err(e) => {
                        warn!(id = %id, date = %date_str, error = %e, "Skipping capital change with invalid date");
                        return None;
                    }
                };
                let kind = match kind_str.as_str() {
                    "withdrawal" => CapitalChangeKind::Withdrawal,
                    _ => CapitalChangeKind::Deposit,
                };

                let change = CapitalChange {
                    amount: parse_amount("amount", &id, &amount_str),
                    id,
                    date,
                    kind,
                    description,
                };
                Some(change.normalized())
            })
            .collect();

        Ok(changes)
    }

    // =========================================================================
    // Starting capital operations
    // =========================================================================

    /// Replace every stored yearly starting capital.
    pub async fn replace_yearly_capitals(
        &self,
        capitals: &[YearlyStartingCapital],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM yearly_capitals")
            .execute(&mut *tx)
            .await?;

        for capital in capitals {
            sqlx::query(
                r#"
                INSERT INTO yearly_capitals (year, starting_capital, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(year) DO UPDATE SET
                    starting_capital = excluded.starting_capital,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(capital.year)
            .bind(capital.starting_capital.to_canonical_string())
            .bind(capital.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn query_yearly_capitals(&self) -> Result<Vec<YearlyStartingCapital>, StoreError> {
        let rows = sqlx::query(
            "SELECT year, starting_capital, updated_at FROM yearly_capitals ORDER BY year ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let year: i32 = row.get("year");
                let capital_str: String = row.get("starting_capital");
                let updated_at: String = row.get("updated_at");
                YearlyStartingCapital {
                    year,
                    starting_capital: parse_amount(
                        "starting_capital",
                        &year.to_string(),
                        &capital_str,
                    ),
                    updated_at: parse_updated_at(&updated_at),
                }
            })
            .collect())
    }

    /// Replace every stored monthly override.
    pub async fn replace_monthly_overrides(
        &self,
        overrides: &[MonthlyStartingCapitalOverride],
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM monthly_overrides")
            .execute(&mut *tx)
            .await?;

        for o in overrides {
            sqlx::query(
                r#"
                INSERT INTO monthly_overrides (month, year, starting_capital, updated_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT(month, year) DO UPDATE SET
                    starting_capital = excluded.starting_capital,
                    updated_at = excluded.updated_at
                "#,
            )
            .bind(o.month.as_str())
            .bind(o.year)
            .bind(o.starting_capital.to_canonical_string())
            .bind(o.updated_at.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Load monthly overrides. Rows with an unknown month token are skipped.
    pub async fn query_monthly_overrides(
        &self,
    ) -> Result<Vec<MonthlyStartingCapitalOverride>, StoreError> {
        let rows = sqlx::query(
            "SELECT month, year, starting_capital, updated_at FROM monthly_overrides ORDER BY year ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut overrides: Vec<MonthlyStartingCapitalOverride> = rows
            .iter()
            .filter_map(|row| {
                let month_str: String = row.get("month");
                let year: i32 = row.get("year");
                let capital_str: String = row.get("starting_capital");
                let updated_at: String = row.get("updated_at");

                let month = match Month::from_str(&month_str) {
                    Ok(month) => month,
                    Err(e) => {
                        warn!(year, error = %e, "Skipping monthly override with invalid month");
                        return None;
                    }
                };
                Some(MonthlyStartingCapitalOverride {
                    month,
                    year,
                    starting_capital: parse_amount(
                        "starting_capital",
                        &format!("{}-{}", month, year),
                        &capital_str,
                    ),
                    updated_at: parse_updated_at(&updated_at),
                })
            })
            .collect();
        overrides.sort_by_key(|o| o.key());

        Ok(overrides)
    }
}
