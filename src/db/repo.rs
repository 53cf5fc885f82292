//! Repository layer for database operations.
//!
//! Write operations that participate in the atomic ingestion unit take an
//! explicit transaction; the orchestrator owns the commit boundary. Reads
//! for the query surface go through the pool and, under WAL, observe either
//! the pre- or post-batch state of an in-flight ingestion, never a partial
//! one.
//!
//! Decimals are stored as canonical TEXT and timestamps as RFC3339 TEXT.
//! Row decoding is tolerant: invariants are enforced at ingestion, never at
//! rest, so a corrupt stored value logs a warning instead of failing reads.

use crate::domain::{
    Break, BreakReason, CounterpartyTrade, NewTrade, Position, Side, Symbol, Trade,
};
use crate::engine::DetectedBreak;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqlitePool;
use sqlx::{Row, Sqlite, Transaction};
use std::collections::HashSet;
use std::str::FromStr;
use tracing::warn;

/// Repository for ledger, counterparty, position, and break rows.
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }

    /// Begin a transaction covering one atomic unit of work.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>, sqlx::Error> {
        self.pool.begin().await
    }

    // =========================================================================
    // Ledger operations
    // =========================================================================

    /// Append validated trades to the ledger, returning them with their
    /// freshly assigned ids. Ids are strictly increasing (AUTOINCREMENT).
    pub async fn append_trades(
        tx: &mut Transaction<'_, Sqlite>,
        new_trades: &[NewTrade],
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let mut appended = Vec::with_capacity(new_trades.len());

        for t in new_trades {
            let result = sqlx::query(
                r#"
                INSERT INTO trades (symbol, side, qty, price, trade_ts)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(t.symbol.as_str())
            .bind(t.side.to_string())
            .bind(canonical(&t.qty))
            .bind(canonical(&t.price))
            .bind(t.trade_ts.to_rfc3339())
            .execute(&mut **tx)
            .await?;

            appended.push(Trade {
                id: result.last_insert_rowid(),
                symbol: t.symbol.clone(),
                side: t.side,
                qty: t.qty,
                price: t.price,
                trade_ts: t.trade_ts,
            });
        }

        Ok(appended)
    }

    /// Full scan of the ledger inside the ingestion transaction.
    ///
    /// No ordering is guaranteed; downstream logic must not rely on it.
    pub async fn all_trades(
        tx: &mut Transaction<'_, Sqlite>,
    ) -> Result<Vec<Trade>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT trade_id, symbol, side, qty, price, trade_ts FROM trades",
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let id: i64 = row.get("trade_id");
                Trade {
                    id,
                    symbol: Symbol::new(row.get("symbol")),
                    side: decode_side(row.get("side"), id),
                    qty: decode_decimal(row.get("qty"), "qty", id),
                    price: decode_decimal(row.get("price"), "price", id),
                    trade_ts: decode_ts(row.get("trade_ts"), id),
                }
            })
            .collect())
    }

    /// Administrative clear: wipe all trades and all derived state.
    pub async fn clear_all(&self) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM breaks").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM positions").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM counterparty_trades")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM trades").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }

    // =========================================================================
    // Counterparty operations
    // =========================================================================

    /// Persist counterparty confirmations produced by the simulator.
    pub async fn insert_counterparty_trades(
        tx: &mut Transaction<'_, Sqlite>,
        confirmations: &[CounterpartyTrade],
    ) -> Result<usize, sqlx::Error> {
        for cp in confirmations {
            sqlx::query(
                r#"
                INSERT INTO counterparty_trades (trade_id, symbol, side, qty, price, trade_ts)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(cp.trade_id)
            .bind(cp.symbol.as_str())
            .bind(cp.side.to_string())
            .bind(canonical(&cp.qty))
            .bind(canonical(&cp.price))
            .bind(cp.trade_ts.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        }
        Ok(confirmations.len())
    }

    /// Full scan of the counterparty set inside the ingestion transaction.
    pub async fn all_counterparty_trades(
        tx: &mut Transaction<'_, Sqlite>,
    ) -> Result<Vec<CounterpartyTrade>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT trade_id, symbol, side, qty, price, trade_ts FROM counterparty_trades",
        )
        .fetch_all(&mut **tx)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let trade_id: i64 = row.get("trade_id");
                CounterpartyTrade {
                    trade_id,
                    symbol: Symbol::new(row.get("symbol")),
                    side: decode_side(row.get("side"), trade_id),
                    qty: decode_decimal(row.get("qty"), "qty", trade_id),
                    price: decode_decimal(row.get("price"), "price", trade_id),
                    trade_ts: decode_ts(row.get("trade_ts"), trade_id),
                }
            })
            .collect())
    }

    // =========================================================================
    // Position operations
    // =========================================================================

    /// Replace all position rows with the fresh aggregation result.
    ///
    /// Positions are fully derived, so stale rows for symbols with no
    /// remaining trades are removed rather than kept.
    pub async fn replace_positions(
        tx: &mut Transaction<'_, Sqlite>,
        positions: &[Position],
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM positions").execute(&mut **tx).await?;

        for p in positions {
            sqlx::query(
                r#"
                INSERT INTO positions (symbol, net_qty, vwap)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(p.symbol.as_str())
            .bind(canonical(&p.net_qty))
            .bind(p.vwap.as_ref().map(canonical))
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }

    /// List current positions, ordered by symbol.
    pub async fn list_positions(&self) -> Result<Vec<Position>, sqlx::Error> {
        let rows = sqlx::query("SELECT symbol, net_qty, vwap FROM positions ORDER BY symbol")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let symbol: String = row.get("symbol");
                let net_qty_str: String = row.get("net_qty");
                let net_qty = Decimal::from_str(&net_qty_str).unwrap_or_else(|e| {
                    warn!(symbol = %symbol, net_qty = %net_qty_str, error = %e,
                        "Failed to parse net_qty decimal, using zero");
                    Decimal::ZERO
                });
                let vwap = row
                    .get::<Option<String>, _>("vwap")
                    .and_then(|s| match Decimal::from_str(&s) {
                        Ok(d) => Some(d),
                        Err(e) => {
                            warn!(symbol = %symbol, vwap = %s, error = %e,
                                "Failed to parse vwap decimal, treating as undefined");
                            None
                        }
                    });

                Position {
                    symbol: Symbol::new(symbol),
                    net_qty,
                    vwap,
                }
            })
            .collect())
    }

    // =========================================================================
    // Break operations
    // =========================================================================

    /// Trade ids that already carry a NegativePosition break.
    pub async fn negative_break_trade_ids(
        tx: &mut Transaction<'_, Sqlite>,
    ) -> Result<HashSet<i64>, sqlx::Error> {
        let rows = sqlx::query("SELECT DISTINCT trade_id FROM breaks WHERE reason = ?")
            .bind(BreakReason::NegativePosition.to_string())
            .fetch_all(&mut **tx)
            .await?;

        Ok(rows.iter().map(|row| row.get("trade_id")).collect())
    }

    /// Clear break categories ahead of a detection run.
    ///
    /// With `clear_all` false (the mixed policy), NegativePosition rows
    /// survive and accumulate; everything else is replaced wholesale.
    pub async fn clear_breaks(
        tx: &mut Transaction<'_, Sqlite>,
        clear_all: bool,
    ) -> Result<(), sqlx::Error> {
        if clear_all {
            sqlx::query("DELETE FROM breaks").execute(&mut **tx).await?;
        } else {
            sqlx::query("DELETE FROM breaks WHERE reason <> ?")
                .bind(BreakReason::NegativePosition.to_string())
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    /// Persist breaks from a detection run.
    pub async fn insert_breaks(
        tx: &mut Transaction<'_, Sqlite>,
        breaks: &[DetectedBreak],
        detected_ts: DateTime<Utc>,
    ) -> Result<usize, sqlx::Error> {
        for b in breaks {
            sqlx::query(
                r#"
                INSERT INTO breaks (trade_id, reason, detected_ts)
                VALUES (?, ?, ?)
                "#,
            )
            .bind(b.trade_id)
            .bind(b.reason.to_string())
            .bind(detected_ts.to_rfc3339())
            .execute(&mut **tx)
            .await?;
        }
        Ok(breaks.len())
    }

    /// List all breaks, oldest first.
    pub async fn list_breaks(&self) -> Result<Vec<Break>, sqlx::Error> {
        let rows = sqlx::query(
            "SELECT break_id, trade_id, reason, detected_ts FROM breaks ORDER BY break_id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| {
                let id: i64 = row.get("break_id");
                let reason_str: String = row.get("reason");
                let reason = match BreakReason::from_str(&reason_str) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!(break_id = id, error = %e, "Skipping break row with unknown reason");
                        return None;
                    }
                };
                Some(Break {
                    id,
                    trade_id: row.get("trade_id"),
                    reason,
                    detected_ts: decode_ts(row.get("detected_ts"), id),
                })
            })
            .collect())
    }
}

/// Canonical TEXT form for stored decimals: normalized, no exponent.
fn canonical(d: &Decimal) -> String {
    d.normalize().to_string()
}

fn decode_decimal(s: String, field: &str, row_id: i64) -> Decimal {
    Decimal::from_str(&s).unwrap_or_else(|e| {
        warn!(row_id, field, value = %s, error = %e, "Failed to parse stored decimal, using zero");
        Decimal::ZERO
    })
}

fn decode_side(s: String, row_id: i64) -> Side {
    Side::from_str(&s).unwrap_or_else(|e| {
        warn!(row_id, error = %e, "Failed to parse stored side, defaulting to BUY");
        Side::Buy
    })
}

fn decode_ts(s: String, row_id: i64) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            warn!(row_id, value = %s, error = %e, "Failed to parse stored timestamp, using epoch");
            DateTime::<Utc>::UNIX_EPOCH
        })
}
