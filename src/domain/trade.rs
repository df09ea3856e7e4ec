//! Trade record: raw journal fields plus the derived metric block.

use crate::domain::{Decimal, PositionStatus, Side};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of pyramid (add-on) entry lots a trade can carry.
pub const MAX_PYRAMIDS: usize = 2;
/// Number of exit lots a trade can carry.
pub const MAX_EXITS: usize = 3;

/// One priced quantity tranche: an entry lot or an exit lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Lot {
    pub price: Decimal,
    pub qty: Decimal,
    pub date: Option<NaiveDate>,
}

impl Lot {
    pub fn new(price: Decimal, qty: Decimal, date: Option<NaiveDate>) -> Self {
        Self { price, qty, date }
    }

    /// A lot counts toward averages and matching only with positive price and quantity.
    pub fn is_qualifying(&self) -> bool {
        self.price.is_positive() && self.qty.is_positive()
    }
}

/// A journaled position.
///
/// Every derived field is always present (zero by default) and is only ever
/// written by the recalculation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Trade {
    pub id: String,
    pub trade_no: String,
    #[serde(with = "lenient_date")]
    pub date: Option<NaiveDate>,
    pub name: String,
    pub buy_sell: Side,
    pub entry: Decimal,
    pub initial_qty: Decimal,
    pub sl: Decimal,
    pub tsl: Decimal,
    /// Current market price, supplied by an external feed.
    pub cmp: Decimal,

    pub pyramid1_price: Decimal,
    pub pyramid1_qty: Decimal,
    #[serde(with = "lenient_date")]
    pub pyramid1_date: Option<NaiveDate>,
    pub pyramid2_price: Decimal,
    pub pyramid2_qty: Decimal,
    #[serde(with = "lenient_date")]
    pub pyramid2_date: Option<NaiveDate>,

    pub exit1_price: Decimal,
    pub exit1_qty: Decimal,
    #[serde(with = "lenient_date")]
    pub exit1_date: Option<NaiveDate>,
    pub exit2_price: Decimal,
    pub exit2_qty: Decimal,
    #[serde(with = "lenient_date")]
    pub exit2_date: Option<NaiveDate>,
    pub exit3_price: Decimal,
    pub exit3_qty: Decimal,
    #[serde(with = "lenient_date")]
    pub exit3_date: Option<NaiveDate>,

    // Derived
    pub avg_entry: Decimal,
    pub position_size: Decimal,
    pub allocation: Decimal,
    pub sl_percent: Decimal,
    pub open_qty: Decimal,
    pub exited_qty: Decimal,
    pub avg_exit_price: Decimal,
    pub stock_move: Decimal,
    pub reward_risk: Decimal,
    pub holding_days: i64,
    pub realised_amount: Decimal,
    pub pl_rs: Decimal,
    pub pf_impact: Decimal,
    pub cumm_pf: Decimal,
    pub open_heat: Decimal,
    pub position_status: PositionStatus,
}

impl Trade {
    /// Create a trade with its initial entry lot.
    pub fn new(
        trade_no: impl Into<String>,
        date: Option<NaiveDate>,
        name: impl Into<String>,
        buy_sell: Side,
        entry: Decimal,
        initial_qty: Decimal,
    ) -> Self {
        Trade {
            trade_no: trade_no.into(),
            date,
            name: name.into(),
            buy_sell,
            entry,
            initial_qty,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_stops(mut self, sl: Decimal, tsl: Decimal) -> Self {
        self.sl = sl;
        self.tsl = tsl;
        self
    }

    pub fn with_cmp(mut self, cmp: Decimal) -> Self {
        self.cmp = cmp;
        self
    }

    /// Set pyramid lot `n` (1-based). Out-of-range slots are ignored.
    pub fn with_pyramid(mut self, n: usize, price: Decimal, qty: Decimal, date: Option<NaiveDate>) -> Self {
        match n {
            1 => {
                self.pyramid1_price = price;
                self.pyramid1_qty = qty;
                self.pyramid1_date = date;
            }
            2 => {
                self.pyramid2_price = price;
                self.pyramid2_qty = qty;
                self.pyramid2_date = date;
            }
            _ => {}
        }
        self
    }

    /// Set exit lot `n` (1-based). Out-of-range slots are ignored.
    pub fn with_exit(mut self, n: usize, price: Decimal, qty: Decimal, date: Option<NaiveDate>) -> Self {
        match n {
            1 => {
                self.exit1_price = price;
                self.exit1_qty = qty;
                self.exit1_date = date;
            }
            2 => {
                self.exit2_price = price;
                self.exit2_qty = qty;
                self.exit2_date = date;
            }
            3 => {
                self.exit3_price = price;
                self.exit3_qty = qty;
                self.exit3_date = date;
            }
            _ => {}
        }
        self
    }

    /// Update the live price from a numeric feed value.
    pub fn set_cmp(&mut self, cmp: f64) {
        self.cmp = Decimal::from_f64_lossy(cmp);
    }

    /// Initial entry followed by the pyramid lots, unfiltered.
    ///
    /// Pyramid lots without their own date inherit the trade date.
    pub fn raw_entry_lots(&self) -> [Lot; 1 + MAX_PYRAMIDS] {
        [
            Lot::new(self.entry, self.initial_qty, self.date),
            Lot::new(
                self.pyramid1_price,
                self.pyramid1_qty,
                self.pyramid1_date.or(self.date),
            ),
            Lot::new(
                self.pyramid2_price,
                self.pyramid2_qty,
                self.pyramid2_date.or(self.date),
            ),
        ]
    }

    /// Exit lots in slot order, unfiltered.
    pub fn raw_exit_lots(&self) -> [Lot; MAX_EXITS] {
        [
            Lot::new(self.exit1_price, self.exit1_qty, self.exit1_date),
            Lot::new(self.exit2_price, self.exit2_qty, self.exit2_date),
            Lot::new(self.exit3_price, self.exit3_qty, self.exit3_date),
        ]
    }

    /// Entry lots with positive price and quantity, in entry order.
    pub fn entry_lots(&self) -> Vec<Lot> {
        self.raw_entry_lots()
            .into_iter()
            .filter(Lot::is_qualifying)
            .collect()
    }

    /// Exit lots with positive price and quantity, in slot order.
    pub fn exit_lots(&self) -> Vec<Lot> {
        self.raw_exit_lots()
            .into_iter()
            .filter(Lot::is_qualifying)
            .collect()
    }

    /// Raw exit quantities, including slots without a price.
    pub fn exit_qtys(&self) -> [Decimal; MAX_EXITS] {
        [self.exit1_qty, self.exit2_qty, self.exit3_qty]
    }

    /// Total quantity across qualifying entry lots.
    pub fn total_entry_qty(&self) -> Decimal {
        self.entry_lots().iter().map(|lot| lot.qty).sum()
    }
}

/// Parse a journal date: `YYYY-MM-DD`, or an RFC 3339 / ISO timestamp whose
/// first ten characters are a date. Anything else is `None`.
pub fn parse_journal_date(input: &str) -> Option<NaiveDate> {
    let s = input.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            s.get(..10)
                .and_then(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok())
        })
}

/// Serde adapter for optional dates that tolerates corrupt input.
mod lenient_date {
    use super::parse_journal_date;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(date: &Option<NaiveDate>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match date {
            Some(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
        Ok(raw.and_then(|v| v.as_str().and_then(parse_journal_date)))
    }
}
