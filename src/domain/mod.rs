//! Domain value types for the reconciliation pipeline.
//!
//! This module provides:
//! - Domain primitives: Symbol, Side
//! - Trade and TradeInput with ingestion-time validation
//! - CounterpartyTrade, Position, and Break records
//!
//! All quantities and prices are `rust_decimal::Decimal` to avoid
//! floating-point drift in reconciliation arithmetic.

pub mod breaks;
pub mod counterparty;
pub mod position;
pub mod primitives;
pub mod trade;

pub use breaks::{Break, BreakReason};
pub use counterparty::CounterpartyTrade;
pub use position::Position;
pub use primitives::{Side, SideParseError, Symbol};
pub use trade::{NewTrade, Trade, TradeInput, ValidationError};
