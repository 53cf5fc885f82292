//! Simulated counterparty confirmation records.

use crate::domain::{Side, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// A counterparty confirmation for a booked trade.
///
/// `trade_id` is a weak reference: it may point at a trade that was later
/// purged by an administrative clear. At most one confirmation exists per
/// trade id, and a confirmation may be entirely absent (a missing trade).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterpartyTrade {
    pub trade_id: i64,
    pub symbol: Symbol,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub trade_ts: DateTime<Utc>,
}
