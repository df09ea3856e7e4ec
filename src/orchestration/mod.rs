//! Journal session orchestration.
//!
//! This module provides:
//! - The `Journal` service that applies mutations and schedules recalculation
//! - A debounced background writer for persistence

pub mod journal;
pub mod persist;

pub use journal::Journal;
pub use persist::PersistenceWriter;
