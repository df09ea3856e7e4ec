//! True portfolio ledger tests.
//!
//! Covers:
//! - Month-to-month carry of capital changes and P/L
//! - Yearly seeds and monthly overrides
//! - Accrual vs cash attribution
//! - Enumeration bounds and error handling

use chrono::NaiveDate;
use truefolio::domain::{
    AccountingBasis, CapitalChange, Decimal, Month, MonthKey, MonthlyStartingCapitalOverride,
    Side, Trade, YearlyStartingCapital,
};
use truefolio::engine::{LedgerError, TruePortfolioLedger};

// =============================================================================
// Test Infrastructure
// =============================================================================

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn date(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn seeded(basis: AccountingBasis, year: i32, capital: &str) -> TruePortfolioLedger {
    let mut ledger = TruePortfolioLedger::new(basis);
    ledger.set_yearly_capital(year, d(capital));
    ledger
}

/// Bought in January, half sold in February, rest in March. FIFO P/L 300.
fn staggered_exit_trade() -> Trade {
    Trade::new("1", Some(date(2024, 1, 10)), "lt", Side::Buy, d("100"), d("20"))
        .with_id("t1")
        .with_exit(1, d("110"), d("10"), Some(date(2024, 2, 5)))
        .with_exit(2, d("120"), d("10"), Some(date(2024, 3, 5)))
}

// =============================================================================
// Carry
// =============================================================================

#[test]
fn test_capital_changes_carry_forward() {
    let mut ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    ledger.add_capital_change(CapitalChange::deposit(date(2024, 2, 1), d("20000"), "feb"));
    ledger.add_capital_change(CapitalChange::deposit(date(2024, 3, 15), d("5000"), "mar"));

    let feb = ledger.monthly_portfolio(&[], "Feb", 2024).unwrap();
    assert_eq!(feb.starting_capital, d("120000"));
    assert_eq!(feb.capital_changes, d("20000"));
    assert_eq!(feb.final_capital, d("120000"));

    let mar = ledger.monthly_portfolio(&[], "Mar", 2024).unwrap();
    assert_eq!(mar.final_capital, d("125000"));
}

#[test]
fn test_withdrawal_reduces_capital() {
    let mut ledger = seeded(AccountingBasis::Accrual, 2024, "50000");
    ledger.add_capital_change(CapitalChange::withdrawal(date(2024, 1, 20), d("8000"), "fees"));

    let jan = ledger.monthly_portfolio(&[], "Jan", 2024).unwrap();
    assert_eq!(jan.capital_changes, d("-8000"));
    assert_eq!(jan.final_capital, d("42000"));
}

#[test]
fn test_pl_flows_into_next_month() {
    let ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let trades = vec![staggered_exit_trade()];

    let jan = ledger.monthly_portfolio(&trades, "Jan", 2024).unwrap();
    assert_eq!(jan.pl, d("300"));
    assert_eq!(jan.final_capital, d("100300"));

    let feb = ledger.monthly_portfolio(&trades, "Feb", 2024).unwrap();
    assert_eq!(feb.starting_capital, d("100300"));
    assert_eq!(feb.pl, Decimal::zero());
}

#[test]
fn test_long_chain_does_not_recurse() {
    let ledger = seeded(AccountingBasis::Accrual, 1990, "1000");
    let dec = ledger.monthly_portfolio(&[], "Dec", 2024).unwrap();
    assert_eq!(dec.final_capital, d("1000"));
}

// =============================================================================
// Seeds and overrides
// =============================================================================

#[test]
fn test_override_pins_month_and_feeds_next() {
    let mut ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    ledger.set_monthly_override("Jun", 2024, d("500000")).unwrap();

    let trades = vec![
        Trade::new("1", Some(date(2024, 6, 3)), "sbin", Side::Buy, d("500"), d("10"))
            .with_id("jun")
            .with_exit(1, d("600"), d("10"), Some(date(2024, 6, 20))),
    ];

    let jun = ledger.monthly_portfolio(&trades, "Jun", 2024).unwrap();
    assert_eq!(jun.starting_capital, d("500000"));
    assert_eq!(jun.final_capital, d("501000"));

    let jul = ledger.monthly_portfolio(&trades, "Jul", 2024).unwrap();
    assert_eq!(jul.starting_capital, d("501000"));
    assert_eq!(jul.final_capital, d("501000"));

    // Months before the override are untouched.
    let may = ledger.monthly_portfolio(&trades, "May", 2024).unwrap();
    assert_eq!(may.final_capital, d("100000"));
}

#[test]
fn test_override_wins_over_yearly_seed() {
    let ledger = TruePortfolioLedger::from_parts(
        vec![YearlyStartingCapital::new(2024, d("100000"))],
        vec![MonthlyStartingCapitalOverride::new(Month::Jan, 2024, d("75000"))],
        Vec::new(),
        AccountingBasis::Accrual,
    );
    let jan = ledger.monthly_portfolio(&[], "Jan", 2024).unwrap();
    assert_eq!(jan.starting_capital, d("75000"));
}

#[test]
fn test_yearly_seed_only_applies_to_earliest_month() {
    let mut ledger = seeded(AccountingBasis::Accrual, 2023, "100000");
    ledger.set_yearly_capital(2024, d("999999"));

    // 2024 continues from December 2023 instead of re-seeding.
    let jan = ledger.monthly_portfolio(&[], "Jan", 2024).unwrap();
    assert_eq!(jan.final_capital, d("100000"));
}

#[test]
fn test_month_before_any_data_is_zero() {
    let ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let dec = ledger.monthly_portfolio(&[], "Dec", 2023).unwrap();
    assert_eq!(dec.final_capital, Decimal::zero());
    assert_eq!(dec.key(), MonthKey::new(Month::Dec, 2023));
}

#[test]
fn test_imported_withdrawal_magnitude_is_booked_negative() {
    let change: CapitalChange = serde_json::from_value(serde_json::json!({
        "id": "w", "date": "2024-02-10", "amount": 5000, "type": "withdrawal"
    }))
    .unwrap();
    let mut ledger = TruePortfolioLedger::from_parts(
        vec![YearlyStartingCapital::new(2024, d("100000"))],
        Vec::new(),
        vec![change],
        AccountingBasis::Accrual,
    );
    assert_eq!(ledger.capital_changes()[0].amount, d("-5000"));

    let feb = ledger.monthly_portfolio(&[], "Feb", 2024).unwrap();
    assert_eq!(feb.capital_changes, d("-5000"));
    assert_eq!(feb.final_capital, d("95000"));

    // Flipping the kind on update flips the booking.
    let mut edited = ledger.capital_changes()[0].clone();
    edited.kind = truefolio::domain::CapitalChangeKind::Deposit;
    assert!(ledger.update_capital_change(edited));
    let feb = ledger.monthly_portfolio(&[], "Feb", 2024).unwrap();
    assert_eq!(feb.final_capital, d("105000"));
}

// =============================================================================
// Basis
// =============================================================================

#[test]
fn test_same_month_trade_is_basis_independent() {
    let trades = vec![
        Trade::new("1", Some(date(2024, 4, 2)), "itc", Side::Sell, d("400"), d("50"))
            .with_id("s")
            .with_exit(1, d("380"), d("50"), Some(date(2024, 4, 25))),
        // Exits more than was entered; the excess 5 units carry no P/L.
        Trade::new("2", Some(date(2024, 4, 3)), "over", Side::Buy, d("100"), d("10"))
            .with_id("o")
            .with_exit(1, d("120"), d("15"), Some(date(2024, 4, 20))),
        // Pyramided and closed in two exits: FIFO 200 + 50 + 100.
        Trade::new("3", Some(date(2024, 4, 4)), "pyr", Side::Buy, d("100"), d("10"))
            .with_id("p")
            .with_pyramid(1, d("110"), d("10"), Some(date(2024, 4, 8)))
            .with_exit(1, d("120"), d("15"), Some(date(2024, 4, 15)))
            .with_exit(2, d("130"), d("5"), Some(date(2024, 4, 22))),
    ];
    let accrual = seeded(AccountingBasis::Accrual, 2024, "100000");
    let cash = seeded(AccountingBasis::Cash, 2024, "100000");

    let a = accrual.all_monthly_portfolios(&trades, date(2024, 6, 30)).unwrap();
    let c = cash.all_monthly_portfolios(&trades, date(2024, 6, 30)).unwrap();
    assert_eq!(a, c);
    assert_eq!(a[3].pl, d("1550"));

    for trade in &trades {
        let month = |basis| {
            seeded(basis, 2024, "100000")
                .monthly_portfolio(std::slice::from_ref(trade), "Apr", 2024)
                .unwrap()
                .pl
        };
        assert_eq!(month(AccountingBasis::Accrual), month(AccountingBasis::Cash));
    }
}

#[test]
fn test_cash_basis_attributes_each_exit() {
    let trades = vec![staggered_exit_trade()];
    let ledger = seeded(AccountingBasis::Cash, 2024, "100000");

    let jan = ledger.monthly_portfolio(&trades, "Jan", 2024).unwrap();
    let feb = ledger.monthly_portfolio(&trades, "Feb", 2024).unwrap();
    let mar = ledger.monthly_portfolio(&trades, "Mar", 2024).unwrap();

    assert_eq!(jan.pl, Decimal::zero());
    assert_eq!(feb.pl, d("100"));
    assert_eq!(mar.pl, d("200"));
    assert_eq!(mar.final_capital, d("100300"));
}

#[test]
fn test_switching_basis_moves_pl_not_total() {
    let trades = vec![staggered_exit_trade()];
    let mut ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let accrual_mar = ledger.monthly_portfolio(&trades, "Mar", 2024).unwrap();

    ledger.set_basis(AccountingBasis::Cash);
    let cash_mar = ledger.monthly_portfolio(&trades, "Mar", 2024).unwrap();

    assert_eq!(accrual_mar.final_capital, cash_mar.final_capital);
}

// =============================================================================
// Enumeration and errors
// =============================================================================

#[test]
fn test_enumeration_runs_through_as_of_month() {
    let ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let series = ledger.all_monthly_portfolios(&[], date(2024, 6, 15)).unwrap();

    let months: Vec<MonthKey> = series.iter().map(|m| m.key()).collect();
    assert_eq!(months.len(), 6);
    assert_eq!(months[0], MonthKey::new(Month::Jan, 2024));
    assert_eq!(months[5], MonthKey::new(Month::Jun, 2024));
    assert!(series.iter().all(|m| m.final_capital == d("100000")));
}

#[test]
fn test_enumeration_extends_to_cash_exit_month() {
    let trades = vec![staggered_exit_trade()];
    let ledger = seeded(AccountingBasis::Cash, 2024, "100000");
    let series = ledger.all_monthly_portfolios(&trades, date(2024, 1, 31)).unwrap();
    assert_eq!(series.last().unwrap().key(), MonthKey::new(Month::Mar, 2024));
}

#[test]
fn test_empty_ledger_enumerates_nothing() {
    let ledger = TruePortfolioLedger::new(AccountingBasis::Accrual);
    let series = ledger.all_monthly_portfolios(&[], date(2024, 6, 15)).unwrap();
    assert!(series.is_empty());
}

#[test]
fn test_invalid_month_is_an_error() {
    let ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let result = ledger.monthly_portfolio(&[], "Foo", 2024);
    assert!(matches!(result, Err(LedgerError::InvalidMonth(_))));

    let mut ledger = ledger;
    assert!(ledger.set_monthly_override("June", 2024, d("1")).is_err());
}

#[test]
fn test_far_future_month_is_rejected() {
    let ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    let result = ledger.monthly_portfolio(&[], "Jan", 2_000_000_000);
    assert!(matches!(result, Err(LedgerError::OutOfRange(_))));

    let far = MonthKey::new(Month::Jan, 2_000_000_000);
    assert_eq!(
        ledger.true_portfolio_size(&[], far),
        ledger.fallback_portfolio_size()
    );
    assert!(ledger.monthly_portfolio(&[], "Dec", 9999).is_ok());
}

#[test]
fn test_true_portfolio_size_matches_final_capital() {
    let mut ledger = seeded(AccountingBasis::Accrual, 2024, "100000");
    ledger.add_capital_change(CapitalChange::deposit(date(2024, 2, 1), d("20000"), "feb"));
    let size = ledger.true_portfolio_size(&[], MonthKey::new(Month::Feb, 2024));
    assert_eq!(size, d("120000"));
}
