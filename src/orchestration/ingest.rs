//! The atomic ingestion unit: append, simulate, aggregate, detect, commit.

use crate::config::{BreakClearPolicy, Config, ValidationMode};
use crate::db::Repository;
use crate::domain::{NewTrade, TradeInput, ValidationError};
use crate::engine::{aggregate, detect};
use crate::sim::{simulate, SimulatorParams};
use chrono::Utc;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Orchestrates one ingestion batch as a single unit of work.
///
/// The RNG lives inside a tokio mutex that doubles as the single-writer
/// lock: holding it across the whole transaction serializes concurrent
/// ingest calls, so the aggregator and detector never observe a
/// partially-committed write from another batch. Readers go through the
/// pool and see pre- or post-batch state only.
pub struct IngestOrchestrator {
    repo: Arc<Repository>,
    params: SimulatorParams,
    validation_mode: ValidationMode,
    break_clear_policy: BreakClearPolicy,
    rng: tokio::sync::Mutex<ChaCha8Rng>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestResult {
    /// Trades appended to the ledger by this batch.
    pub inserted: usize,
    /// Invalid inputs skipped (always 0 under the reject-batch policy).
    pub skipped: usize,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid trade at index {index}: {source}")]
    InvalidTrade {
        index: usize,
        source: ValidationError,
    },
    #[error(transparent)]
    Storage(#[from] sqlx::Error),
}

impl IngestOrchestrator {
    pub fn new(repo: Arc<Repository>, config: &Config) -> Self {
        let rng = match config.sim_seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        Self {
            repo,
            params: config.simulator,
            validation_mode: config.validation_mode,
            break_clear_policy: config.break_clear_policy,
            rng: tokio::sync::Mutex::new(rng),
        }
    }

    /// Ingest a batch of trade inputs.
    ///
    /// Either every effect of the batch (ledger rows, counterparty rows,
    /// position changes, break changes) becomes durably visible, or none
    /// does. If the returned future is dropped mid-flight, the open
    /// transaction rolls back on drop; no intermediate state is ever
    /// observable.
    ///
    /// # Errors
    /// `InvalidTrade` under the reject-batch policy (nothing was written);
    /// `Storage` when the unit of work cannot be committed (the caller may
    /// retry the whole batch).
    pub async fn ingest(&self, batch: &[TradeInput]) -> Result<IngestResult, IngestError> {
        let (new_trades, skipped) = self.validate_batch(batch)?;

        let mut rng = self.rng.lock().await;
        let mut tx = self.repo.begin().await?;

        let appended = Repository::append_trades(&mut tx, &new_trades).await?;

        // Simulate over exactly the newly appended trades, not the whole
        // ledger; earlier trades already have their confirmations.
        let confirmations = simulate(&appended, &self.params, &mut *rng);
        Repository::insert_counterparty_trades(&mut tx, &confirmations).await?;

        // Full recompute over the entire ledger is the contract, not an
        // optimization opportunity.
        let all_trades = Repository::all_trades(&mut tx).await?;
        let positions = aggregate(&all_trades);
        Repository::replace_positions(&mut tx, &positions).await?;

        let all_confirmations = Repository::all_counterparty_trades(&mut tx).await?;
        let already_flagged = match self.break_clear_policy {
            BreakClearPolicy::Mixed => Repository::negative_break_trade_ids(&mut tx).await?,
            BreakClearPolicy::ClearAll => HashSet::new(),
        };
        Repository::clear_breaks(
            &mut tx,
            self.break_clear_policy == BreakClearPolicy::ClearAll,
        )
        .await?;

        let breaks = detect(&all_trades, &all_confirmations, &positions, &already_flagged);
        Repository::insert_breaks(&mut tx, &breaks, Utc::now()).await?;

        tx.commit().await?;

        info!(
            inserted = appended.len(),
            skipped,
            confirmations = confirmations.len(),
            positions = positions.len(),
            breaks = breaks.len(),
            "Ingestion batch committed"
        );

        Ok(IngestResult {
            inserted: appended.len(),
            skipped,
        })
    }

    fn validate_batch(
        &self,
        batch: &[TradeInput],
    ) -> Result<(Vec<NewTrade>, usize), IngestError> {
        let mut new_trades = Vec::with_capacity(batch.len());
        let mut skipped = 0usize;

        for (index, input) in batch.iter().enumerate() {
            match input.validate() {
                Ok(t) => new_trades.push(t),
                Err(source) => match self.validation_mode {
                    ValidationMode::RejectBatch => {
                        return Err(IngestError::InvalidTrade { index, source })
                    }
                    ValidationMode::SkipInvalid => {
                        warn!(index, error = %source, "Skipping invalid trade input");
                        skipped += 1;
                    }
                },
            }
        }

        Ok((new_trades, skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::db::init_db;
    use crate::domain::BreakReason;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn setup(overrides: &[(&str, &str)]) -> (IngestOrchestrator, Arc<Repository>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        let repo = Arc::new(Repository::new(pool));

        let config = test_config(&db_path, overrides).expect("config failed");
        let orchestrator = IngestOrchestrator::new(repo.clone(), &config);
        (orchestrator, repo, temp_dir)
    }

    fn test_config(db_path: &str, overrides: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let mut env_map = HashMap::new();
        env_map.insert("DATABASE_PATH".to_string(), db_path.to_string());
        // Faithful simulator unless a test overrides it.
        env_map.insert("SIM_MISSING_RATE".to_string(), "0".to_string());
        env_map.insert("SIM_ALTER_RATE".to_string(), "0".to_string());
        env_map.insert("SIM_SEED".to_string(), "42".to_string());
        for (k, v) in overrides {
            env_map.insert(k.to_string(), v.to_string());
        }
        Config::from_env_map(env_map)
    }

    fn input(symbol: &str, side: &str, qty: f64, price: f64) -> TradeInput {
        TradeInput {
            symbol: symbol.to_string(),
            side: side.to_string(),
            qty: rust_decimal::Decimal::try_from(qty).unwrap(),
            price: rust_decimal::Decimal::try_from(price).unwrap(),
            trade_ts: "2024-01-15T09:30:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_single_buy_scenario() {
        let (orchestrator, repo, _temp) = setup(&[]).await;

        let result = orchestrator
            .ingest(&[input("AAPL", "BUY", 100.0, 10.0)])
            .await
            .unwrap();
        assert_eq!(result.inserted, 1);
        assert_eq!(result.skipped, 0);

        let positions = repo.list_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol.as_str(), "AAPL");
        assert_eq!(positions[0].net_qty, dec!(100));
        assert_eq!(positions[0].vwap, Some(dec!(10)));

        assert!(repo.list_breaks().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_buy_and_sell_vwap() {
        let (orchestrator, repo, _temp) = setup(&[]).await;

        orchestrator
            .ingest(&[
                input("AAPL", "BUY", 100.0, 10.0),
                input("AAPL", "SELL", 50.0, 20.0),
            ])
            .await
            .unwrap();

        let positions = repo.list_positions().await.unwrap();
        assert_eq!(positions[0].net_qty, dec!(50));
        assert_eq!(positions[0].vwap.unwrap().round_dp(2), dec!(13.33));
    }

    #[tokio::test]
    async fn test_missing_confirmation_produces_missing_trade_break() {
        let (orchestrator, repo, _temp) =
            setup(&[("SIM_MISSING_RATE", "1")]).await;

        orchestrator
            .ingest(&[input("AAPL", "BUY", 100.0, 10.0)])
            .await
            .unwrap();

        let breaks = repo.list_breaks().await.unwrap();
        assert_eq!(breaks.len(), 1);
        assert_eq!(breaks[0].reason, BreakReason::MissingTrade);
        assert_eq!(breaks[0].trade_id, 1);
    }

    #[tokio::test]
    async fn test_negative_position_breaks_do_not_duplicate() {
        let (orchestrator, repo, _temp) = setup(&[]).await;

        orchestrator
            .ingest(&[input("TSLA", "BUY", 10.0, 200.0)])
            .await
            .unwrap();
        orchestrator
            .ingest(&[input("TSLA", "SELL", 40.0, 210.0)])
            .await
            .unwrap();

        let breaks = repo.list_breaks().await.unwrap();
        let negatives: Vec<_> = breaks
            .iter()
            .filter(|b| b.reason == BreakReason::NegativePosition)
            .collect();
        // One per contributing trade on the net-short symbol.
        assert_eq!(negatives.len(), 2);

        // Re-running detection (empty batch) must not add more.
        let result = orchestrator.ingest(&[]).await.unwrap();
        assert_eq!(result.inserted, 0);

        let breaks = repo.list_breaks().await.unwrap();
        let negatives: Vec<_> = breaks
            .iter()
            .filter(|b| b.reason == BreakReason::NegativePosition)
            .collect();
        assert_eq!(negatives.len(), 2);
    }

    #[tokio::test]
    async fn test_clear_all_policy_reclears_negative_positions() {
        let (orchestrator, repo, _temp) =
            setup(&[("BREAK_CLEAR_POLICY", "all")]).await;

        orchestrator
            .ingest(&[input("TSLA", "SELL", 40.0, 210.0)])
            .await
            .unwrap();
        orchestrator.ingest(&[]).await.unwrap();

        // The single negative-position break is rebuilt each run, not
        // accumulated: still exactly one row after the second run.
        let breaks = repo.list_breaks().await.unwrap();
        let negatives: Vec<_> = breaks
            .iter()
            .filter(|b| b.reason == BreakReason::NegativePosition)
            .collect();
        assert_eq!(negatives.len(), 1);
    }

    #[tokio::test]
    async fn test_reject_batch_is_atomic() {
        let (orchestrator, repo, _temp) = setup(&[]).await;

        let result = orchestrator
            .ingest(&[
                input("AAPL", "BUY", 100.0, 10.0),
                input("MSFT", "HOLD", 5.0, 300.0),
            ])
            .await;

        match result {
            Err(IngestError::InvalidTrade { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected InvalidTrade, got {:?}", other),
        }

        // Nothing from the batch was written.
        assert!(repo.list_positions().await.unwrap().is_empty());
        let mut tx = repo.begin().await.unwrap();
        assert!(Repository::all_trades(&mut tx).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_skip_invalid_mode_continues() {
        let (orchestrator, repo, _temp) =
            setup(&[("VALIDATION_MODE", "skip")]).await;

        let result = orchestrator
            .ingest(&[
                input("AAPL", "BUY", 100.0, 10.0),
                input("", "BUY", 5.0, 300.0),
            ])
            .await
            .unwrap();

        assert_eq!(result.inserted, 1);
        assert_eq!(result.skipped, 1);

        let positions = repo.list_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol.as_str(), "AAPL");
    }

    #[tokio::test]
    async fn test_quantity_mismatch_breaks_replaced_not_duplicated() {
        // Force every confirmation to overstate by a fixed delta.
        let (orchestrator, repo, _temp) = setup(&[
            ("SIM_ALTER_RATE", "1"),
            ("SIM_DELTA_LO", "15"),
            ("SIM_DELTA_HI", "15"),
        ])
        .await;

        orchestrator
            .ingest(&[input("AAPL", "BUY", 100.0, 10.0)])
            .await
            .unwrap();
        orchestrator.ingest(&[]).await.unwrap();

        let breaks = repo.list_breaks().await.unwrap();
        let overstated: Vec<_> = breaks
            .iter()
            .filter(|b| b.reason == BreakReason::QuantityOverstated)
            .collect();
        assert_eq!(overstated.len(), 1);
        assert_eq!(overstated[0].trade_id, 1);
    }

    #[tokio::test]
    async fn test_net_position_matches_signed_sum_across_batches() {
        let (orchestrator, repo, _temp) = setup(&[]).await;

        orchestrator
            .ingest(&[
                input("AAPL", "BUY", 100.0, 10.0),
                input("MSFT", "BUY", 30.0, 300.0),
            ])
            .await
            .unwrap();
        orchestrator
            .ingest(&[
                input("AAPL", "SELL", 25.0, 12.0),
                input("MSFT", "SELL", 30.0, 310.0),
            ])
            .await
            .unwrap();

        let positions = repo.list_positions().await.unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].symbol.as_str(), "AAPL");
        assert_eq!(positions[0].net_qty, dec!(75));
        // MSFT is flat but still has trades, so it stays with a defined
        // vwap over unsigned volume.
        assert_eq!(positions[1].symbol.as_str(), "MSFT");
        assert_eq!(positions[1].net_qty, dec!(0));
        assert!(positions[1].vwap.is_some());
    }

    #[tokio::test]
    async fn test_concurrent_ingests_serialize() {
        let (orchestrator, repo, _temp) = setup(&[]).await;
        let orchestrator = Arc::new(orchestrator);

        let mut handles = Vec::new();
        for i in 0..8 {
            let orch = orchestrator.clone();
            handles.push(tokio::spawn(async move {
                orch.ingest(&[input("AAPL", "BUY", 10.0, 100.0 + i as f64)])
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let positions = repo.list_positions().await.unwrap();
        assert_eq!(positions[0].net_qty, dec!(80));
    }
}
