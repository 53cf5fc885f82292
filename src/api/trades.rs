use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;
use crate::domain::TradeInput;
use crate::error::AppError;

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub inserted: usize,
}

/// Ingest a batch of trades through the full reconciliation pipeline.
pub async fn ingest_trades(
    State(state): State<AppState>,
    Json(batch): Json<Vec<TradeInput>>,
) -> Result<Json<IngestResponse>, AppError> {
    let result = state.orchestrator.ingest(&batch).await?;
    Ok(Json(IngestResponse {
        inserted: result.inserted,
    }))
}

/// Administrative clear: wipe the ledger and all derived state.
pub async fn clear_trades(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    state.repo.clear_all().await?;
    Ok(Json(serde_json::json!({"cleared": true})))
}
