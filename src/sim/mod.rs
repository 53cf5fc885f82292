//! Counterparty confirmation simulator.
//!
//! Produces a synthetic, possibly-divergent counterparty record per booked
//! trade. Pure function of its inputs and the injected RNG; persistence is
//! the caller's concern.

use crate::domain::{CounterpartyTrade, Trade};
use rand::Rng;
use rust_decimal::Decimal;
use thiserror::Error;

/// Divergence tuning for the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorParams {
    /// Probability that a trade gets no confirmation at all.
    pub missing_rate: f64,
    /// Probability that a confirmed trade's quantity is altered.
    pub alter_rate: f64,
    /// Inclusive range the integer quantity delta is drawn from.
    pub delta_lo: i64,
    pub delta_hi: i64,
}

impl SimulatorParams {
    /// Validate rates and the delta range.
    ///
    /// # Errors
    /// Returns an error if a rate is outside `[0, 1]` or `delta_lo > delta_hi`.
    pub fn validated(self) -> Result<Self, SimulatorParamsError> {
        if !(0.0..=1.0).contains(&self.missing_rate) {
            return Err(SimulatorParamsError::RateOutOfRange(
                "missing_rate",
                self.missing_rate,
            ));
        }
        if !(0.0..=1.0).contains(&self.alter_rate) {
            return Err(SimulatorParamsError::RateOutOfRange(
                "alter_rate",
                self.alter_rate,
            ));
        }
        if self.delta_lo > self.delta_hi {
            return Err(SimulatorParamsError::EmptyDeltaRange(
                self.delta_lo,
                self.delta_hi,
            ));
        }
        Ok(self)
    }
}

impl Default for SimulatorParams {
    /// Production defaults: 10% missing, 10% altered, delta in [-20, 20].
    fn default() -> Self {
        SimulatorParams {
            missing_rate: 0.10,
            alter_rate: 0.10,
            delta_lo: -20,
            delta_hi: 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimulatorParamsError {
    #[error("{0} must be within [0, 1], got {1}")]
    RateOutOfRange(&'static str, f64),
    #[error("delta range is empty: lo {0} > hi {1}")]
    EmptyDeltaRange(i64, i64),
}

/// Simulate counterparty confirmations for a set of trades.
///
/// Applied independently per trade:
/// 1. With probability `missing_rate` the trade is omitted entirely.
/// 2. Otherwise, with probability `alter_rate`, an integer delta drawn
///    uniformly from `[delta_lo, delta_hi]` is applied to the quantity,
///    floored at 1.
/// 3. Symbol, side, price, and timestamp are copied from the source trade.
///
/// Randomness is injected so detection runs are reproducible in tests;
/// production callers seed from system entropy.
pub fn simulate<R: Rng + ?Sized>(
    trades: &[Trade],
    params: &SimulatorParams,
    rng: &mut R,
) -> Vec<CounterpartyTrade> {
    let mut confirmations = Vec::with_capacity(trades.len());

    for trade in trades {
        if rng.gen_bool(params.missing_rate) {
            continue;
        }

        let qty = if rng.gen_bool(params.alter_rate) {
            let delta = rng.gen_range(params.delta_lo..=params.delta_hi);
            (trade.qty + Decimal::from(delta)).max(Decimal::ONE)
        } else {
            trade.qty
        };

        confirmations.push(CounterpartyTrade {
            trade_id: trade.id,
            symbol: trade.symbol.clone(),
            side: trade.side,
            qty,
            price: trade.price,
            trade_ts: trade.trade_ts,
        });
    }

    confirmations
}
