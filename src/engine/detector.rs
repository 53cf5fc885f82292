//! Break detection over trades, counterparty records, and positions.

use crate::domain::{BreakReason, CounterpartyTrade, Position, Symbol, Trade};
use std::collections::{HashMap, HashSet};

/// A break produced by a detection run, before persistence assigns an id
/// and a detection timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectedBreak {
    pub trade_id: i64,
    pub reason: BreakReason,
}

/// Classify discrepancies across the full trade set.
///
/// `already_flagged` holds trade ids that carry a NegativePosition break
/// from an earlier run; those are not flagged again. Callers applying the
/// clear-all break policy pass an empty set.
///
/// Quantity and missing-trade breaks are emitted for every occurrence on
/// every run; the replace-wholesale semantics for those categories are the
/// caller's responsibility. Exact quantity equality produces no break, and
/// a trade with both a quantity mismatch and a negative-position symbol
/// produces two independent breaks.
pub fn detect(
    trades: &[Trade],
    counterparty_trades: &[CounterpartyTrade],
    positions: &[Position],
    already_flagged: &HashSet<i64>,
) -> Vec<DetectedBreak> {
    // At most one confirmation exists per trade id.
    let by_trade_id: HashMap<i64, &CounterpartyTrade> = counterparty_trades
        .iter()
        .map(|cp| (cp.trade_id, cp))
        .collect();

    let short_symbols: HashSet<&Symbol> = positions
        .iter()
        .filter(|p| p.is_net_short())
        .map(|p| &p.symbol)
        .collect();

    let mut breaks = Vec::new();

    for trade in trades {
        match by_trade_id.get(&trade.id) {
            Some(cp) if cp.qty > trade.qty => breaks.push(DetectedBreak {
                trade_id: trade.id,
                reason: BreakReason::QuantityOverstated,
            }),
            Some(cp) if cp.qty < trade.qty => breaks.push(DetectedBreak {
                trade_id: trade.id,
                reason: BreakReason::QuantityUnderstated,
            }),
            Some(_) => {}
            None => breaks.push(DetectedBreak {
                trade_id: trade.id,
                reason: BreakReason::MissingTrade,
            }),
        }
    }

    for trade in trades {
        if short_symbols.contains(&trade.symbol) && !already_flagged.contains(&trade.id) {
            breaks.push(DetectedBreak {
                trade_id: trade.id,
                reason: BreakReason::NegativePosition,
            });
        }
    }

    breaks
}
