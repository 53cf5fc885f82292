//! Aggregated net positions.

use crate::domain::Symbol;
use rust_decimal::Decimal;

/// Net position for a symbol, fully derived from the ledger.
///
/// Recomputed and overwritten wholesale on every aggregation pass, never
/// incrementally patched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub symbol: Symbol,
    /// Signed sum of quantities: positive = net long, negative = net short.
    pub net_qty: Decimal,
    /// Volume-weighted average price over unsigned quantities.
    ///
    /// `None` when the unsigned quantity sum is zero; never approximated
    /// as zero.
    pub vwap: Option<Decimal>,
}

impl Position {
    pub fn is_net_short(&self) -> bool {
        self.net_qty < Decimal::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_is_net_short() {
        let mut pos = Position {
            symbol: Symbol::new("TSLA".to_string()),
            net_qty: dec!(-25),
            vwap: Some(dec!(100)),
        };
        assert!(pos.is_net_short());

        pos.net_qty = dec!(0);
        assert!(!pos.is_net_short());
    }
}
