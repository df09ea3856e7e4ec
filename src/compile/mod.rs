//! Recalculation pipeline for turning raw journal trades into derived trades.
//!
//! This module provides:
//! - Per-trade metric derivation (pass 1)
//! - The cumulative portfolio-impact fold over date-ordered trades (pass 2)
//! - Settled vs provisional tracking for staged recalculation

use crate::domain::Trade;
use serde::{Deserialize, Serialize};

pub mod pipeline;

pub use pipeline::{Pipeline, PipelineContext};

/// Whether a trade set reflects a full recalculation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecalcStatus {
    /// Every derived field, including `cumm_pf`, is final.
    #[default]
    Settled,
    /// Some trades were derived in isolation; running totals may be stale.
    Provisional,
}

/// The journal's trade set together with its recalculation state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeSet {
    pub trades: Vec<Trade>,
    pub status: RecalcStatus,
    /// Bumped on every mutation; a settle only lands for the latest generation.
    pub generation: u64,
}

impl TradeSet {
    /// Create a settled set at `generation`.
    pub fn settled(trades: Vec<Trade>, generation: u64) -> Self {
        Self {
            trades,
            status: RecalcStatus::Settled,
            generation,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.status == RecalcStatus::Settled
    }

    /// Record a mutation: the set becomes provisional and moves to a new generation.
    pub fn touch(&mut self) -> u64 {
        self.status = RecalcStatus::Provisional;
        self.generation += 1;
        self.generation
    }

    pub fn find(&self, id: &str) -> Option<&Trade> {
        self.trades.iter().find(|t| t.id == id)
    }
}
