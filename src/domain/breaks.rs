//! Reconciliation breaks: detected discrepancies between internal and
//! counterparty records, or structurally invalid aggregate positions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Why a break was raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakReason {
    /// Counterparty reported more quantity than booked.
    QuantityOverstated,
    /// Counterparty reported less quantity than booked.
    QuantityUnderstated,
    /// No counterparty confirmation exists for the trade.
    MissingTrade,
    /// The trade contributes to a symbol whose net position is negative.
    NegativePosition,
}

impl BreakReason {
    /// Whether breaks of this reason are replaced wholesale on every
    /// detection run. NegativePosition breaks accumulate instead.
    pub fn is_replaceable(&self) -> bool {
        !matches!(self, BreakReason::NegativePosition)
    }
}

impl std::fmt::Display for BreakReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BreakReason::QuantityOverstated => "QUANTITY_OVERSTATED",
            BreakReason::QuantityUnderstated => "QUANTITY_UNDERSTATED",
            BreakReason::MissingTrade => "MISSING_TRADE",
            BreakReason::NegativePosition => "NEGATIVE_POSITION",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized break reason: {0}")]
pub struct BreakReasonParseError(pub String);

impl FromStr for BreakReason {
    type Err = BreakReasonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "QUANTITY_OVERSTATED" => Ok(BreakReason::QuantityOverstated),
            "QUANTITY_UNDERSTATED" => Ok(BreakReason::QuantityUnderstated),
            "MISSING_TRADE" => Ok(BreakReason::MissingTrade),
            "NEGATIVE_POSITION" => Ok(BreakReason::NegativePosition),
            other => Err(BreakReasonParseError(other.to_string())),
        }
    }
}

/// A persisted break row.
///
/// `trade_id` is a weak reference to the trade that existed at detection
/// time; referential integrity after a ledger clear is not maintained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Break {
    pub id: i64,
    pub trade_id: i64,
    pub reason: BreakReason,
    pub detected_ts: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_roundtrip() {
        for reason in [
            BreakReason::QuantityOverstated,
            BreakReason::QuantityUnderstated,
            BreakReason::MissingTrade,
            BreakReason::NegativePosition,
        ] {
            let parsed = BreakReason::from_str(&reason.to_string()).unwrap();
            assert_eq!(parsed, reason);
        }
    }

    #[test]
    fn test_reason_parse_rejects_unknown() {
        assert!(BreakReason::from_str("PRICE_MISMATCH").is_err());
    }

    #[test]
    fn test_only_negative_position_accumulates() {
        assert!(BreakReason::QuantityOverstated.is_replaceable());
        assert!(BreakReason::QuantityUnderstated.is_replaceable());
        assert!(BreakReason::MissingTrade.is_replaceable());
        assert!(!BreakReason::NegativePosition.is_replaceable());
    }

    #[test]
    fn test_reason_json_serialization() {
        let json = serde_json::to_string(&BreakReason::MissingTrade).unwrap();
        assert_eq!(json, "\"MISSING_TRADE\"");
    }
}
