//! Synthetic trade generation for seeding and demos.

use crate::domain::TradeInput;
use chrono::{Duration, Utc};
use rand::Rng;
use rust_decimal::Decimal;

const SYMBOLS: &[&str] = &["AAPL", "MSFT", "NVDA", "META", "TSLA"];

/// Generate one random trade input: qty in 1..=1000, price in 50.00..1000.00,
/// timestamp within the last hour.
pub fn random_trade_input<R: Rng + ?Sized>(rng: &mut R) -> TradeInput {
    let symbol = SYMBOLS[rng.gen_range(0..SYMBOLS.len())];
    let side = if rng.gen_bool(0.5) { "BUY" } else { "SELL" };

    let qty = Decimal::from(rng.gen_range(1..=1000));
    // Price in whole cents to keep the decimal exact.
    let price = Decimal::new(rng.gen_range(5_000..100_000), 2);

    let trade_ts = Utc::now() - Duration::seconds(rng.gen_range(0..3_600));

    TradeInput {
        symbol: symbol.to_string(),
        side: side.to_string(),
        qty,
        price,
        trade_ts: trade_ts.to_rfc3339(),
    }
}

/// Generate a batch of random trade inputs.
pub fn random_batch<R: Rng + ?Sized>(rng: &mut R, count: usize) -> Vec<TradeInput> {
    (0..count).map(|_| random_trade_input(rng)).collect()
}
