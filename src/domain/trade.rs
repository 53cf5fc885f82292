//! Booked trade types and ingestion-time validation.

use crate::domain::{Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// A trade as submitted by a caller, before validation.
///
/// Side and timestamp arrive as raw strings so that validation failures
/// surface as [`ValidationError`] rather than deserialization errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeInput {
    pub symbol: String,
    pub side: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub qty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    /// ISO-8601 timestamp of the trade.
    pub trade_ts: String,
}

/// A validated trade that has not yet been appended to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTrade {
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub trade_ts: DateTime<Utc>,
}

/// A booked trade. Immutable once appended; the id is assigned by the
/// ledger and strictly increasing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trade {
    pub id: i64,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub trade_ts: DateTime<Utc>,
}

impl Trade {
    /// Signed quantity: +qty for BUY, -qty for SELL.
    pub fn signed_qty(&self) -> Decimal {
        match self.side {
            Side::Buy => self.qty,
            Side::Sell => -self.qty,
        }
    }
}

/// A trade input that violates an ingestion invariant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("symbol must be non-empty")]
    EmptySymbol,
    #[error("unrecognized side: {0}")]
    UnrecognizedSide(String),
    #[error("qty must be > 0, got {0}")]
    NonPositiveQty(Decimal),
    #[error("price must be > 0, got {0}")]
    NonPositivePrice(Decimal),
    #[error("trade_ts is not a valid ISO-8601 timestamp: {0}")]
    InvalidTimestamp(String),
}

impl TradeInput {
    /// Validate this input against the trade invariants.
    ///
    /// Invariants are enforced here, at ingestion, never at rest.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<NewTrade, ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        let side = Side::from_str(&self.side)
            .map_err(|e| ValidationError::UnrecognizedSide(e.0))?;
        if self.qty <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQty(self.qty));
        }
        if self.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice(self.price));
        }
        let trade_ts = DateTime::parse_from_rfc3339(&self.trade_ts)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| ValidationError::InvalidTimestamp(self.trade_ts.clone()))?;

        Ok(NewTrade {
            symbol: Symbol::new(self.symbol.clone()),
            side,
            qty: self.qty,
            price: self.price,
            trade_ts,
        })
    }
}
