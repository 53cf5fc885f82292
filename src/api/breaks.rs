use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::domain::BreakReason;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct BreaksResponse {
    pub breaks: Vec<BreakDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakDto {
    pub trade_id: i64,
    pub reason: BreakReason,
    /// ISO-8601 detection timestamp.
    pub detected_ts: String,
}

/// List breaks detected by reconciliation, oldest first.
pub async fn get_breaks(State(state): State<AppState>) -> Result<Json<BreaksResponse>, AppError> {
    let breaks = state
        .repo
        .list_breaks()
        .await?
        .into_iter()
        .map(|b| BreakDto {
            trade_id: b.trade_id,
            reason: b.reason,
            detected_ts: b.detected_ts.to_rfc3339(),
        })
        .collect();

    Ok(Json(BreaksResponse { breaks }))
}
