//! Database module for the SQLite-backed journal store.
//!
//! This module provides:
//! - Database initialization and migrations
//! - SQLite pragma configuration
//! - Repository layer implementing `JournalStore`

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
