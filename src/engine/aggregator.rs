//! Position aggregation over the full trade set.

use crate::domain::{Position, Symbol, Trade};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

#[derive(Debug, Default)]
struct SymbolTotals {
    net_qty: Decimal,
    gross_qty: Decimal,
    notional: Decimal,
}

/// Recompute net positions from the entire trade set.
///
/// One entry per distinct symbol, ordered by symbol. The result is meant
/// to replace prior positions wholesale; symbols with no trades are absent.
///
/// - `net_qty` = Σ qty(BUY) − Σ qty(SELL)
/// - `vwap` = Σ(price·qty) / Σ(qty), where the denominator is the
///   **unsigned** quantity sum; `None` when that sum is zero.
///
/// Input order is irrelevant; callers must not rely on ledger scan order.
pub fn aggregate(trades: &[Trade]) -> Vec<Position> {
    let mut totals: BTreeMap<Symbol, SymbolTotals> = BTreeMap::new();

    for trade in trades {
        let entry = totals.entry(trade.symbol.clone()).or_default();
        entry.net_qty += trade.signed_qty();
        entry.gross_qty += trade.qty;
        entry.notional += trade.price * trade.qty;
    }

    totals
        .into_iter()
        .map(|(symbol, t)| {
            let vwap = if t.gross_qty.is_zero() {
                None
            } else {
                Some(t.notional / t.gross_qty)
            };
            Position {
                symbol,
                net_qty: t.net_qty,
                vwap,
            }
        })
        .collect()
}
