//! Database module for SQLite operations.
//!
//! This module provides:
//! - Database initialization and idempotent schema migrations
//! - SQLite pragma configuration (WAL, busy_timeout)
//! - Repository layer for ledger, counterparty, position, and break rows

pub mod migrations;
pub mod repo;

pub use migrations::init_db;
pub use repo::Repository;
