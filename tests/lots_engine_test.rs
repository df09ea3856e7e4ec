//! Lot engine tests for the metrics that depend on dates and live prices.

use chrono::NaiveDate;
use truefolio::domain::{Decimal, Lot, PositionStatus, Side};
use truefolio::engine::lots;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn date(y: i32, m: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, day)
}

fn dated(price: &str, qty: &str, on: Option<NaiveDate>) -> Lot {
    Lot::new(d(price), d(qty), on)
}

fn as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 31).unwrap()
}

#[test]
fn test_holding_days_closed_fifo() {
    let entries = [
        dated("100", "10", date(2024, 1, 1)),
        dated("110", "10", date(2024, 1, 11)),
    ];
    let exits = [dated("120", "20", date(2024, 1, 21))];
    assert_eq!(lots::holding_days(&entries, &exits, as_of()), 15);
}

#[test]
fn test_holding_days_open_runs_to_as_of() {
    let entries = [dated("100", "10", date(2024, 1, 1))];
    assert_eq!(lots::holding_days(&entries, &[], as_of()), 30);
}

#[test]
fn test_holding_days_partial_blends() {
    let entries = [dated("100", "10", date(2024, 1, 1))];
    let exits = [dated("105", "4", date(2024, 1, 11))];
    // (4 * 10 + 6 * 30) / 10
    assert_eq!(lots::holding_days(&entries, &exits, as_of()), 22);
}

#[test]
fn test_holding_days_rounds_half_away_from_zero() {
    let entries = [dated("100", "2", date(2024, 1, 1))];
    let exits = [dated("105", "1", date(2024, 1, 2))];
    let as_of = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
    assert_eq!(lots::holding_days(&entries, &exits, as_of), 2);
}

#[test]
fn test_holding_days_without_entries() {
    assert_eq!(lots::holding_days(&[], &[], as_of()), 0);
}

#[test]
fn test_reward_risk_both_sides() {
    assert_eq!(lots::reward_risk(d("100"), d("95"), d("115"), Side::Buy), d("3"));
    assert_eq!(lots::reward_risk(d("100"), d("105"), d("90"), Side::Sell), d("2"));
    assert_eq!(
        lots::reward_risk(d("100"), Decimal::zero(), d("115"), Side::Buy),
        Decimal::zero()
    );
}

#[test]
fn test_stock_move_partial_blends_exit_and_live_price() {
    let mv = lots::stock_move(
        d("100"),
        d("110"),
        d("120"),
        d("5"),
        d("5"),
        PositionStatus::Partial,
        Side::Buy,
    );
    assert_eq!(mv, d("15"));
}

#[test]
fn test_stock_move_open_without_live_price_is_flat() {
    let mv = lots::stock_move(
        d("100"),
        Decimal::zero(),
        Decimal::zero(),
        d("10"),
        Decimal::zero(),
        PositionStatus::Open,
        Side::Buy,
    );
    assert_eq!(mv, Decimal::zero());
}

#[test]
fn test_open_heat_prefers_trailing_stop() {
    let heat = lots::open_heat(d("100"), d("90"), d("98"), d("10"), Side::Buy, d("1000"));
    assert_eq!(heat, d("2"));

    // A stop locked above entry carries no risk.
    let locked = lots::open_heat(d("100"), d("90"), d("105"), d("10"), Side::Buy, d("1000"));
    assert_eq!(locked, Decimal::zero());

    let short = lots::open_heat(d("100"), d("104"), Decimal::zero(), d("10"), Side::Sell, d("1000"));
    assert_eq!(short, d("4"));
}

#[test]
fn test_position_status_transitions() {
    assert_eq!(lots::position_status(d("10"), Decimal::zero()), PositionStatus::Open);
    assert_eq!(lots::position_status(d("6"), d("4")), PositionStatus::Partial);
    assert_eq!(lots::position_status(Decimal::zero(), d("10")), PositionStatus::Closed);
}
