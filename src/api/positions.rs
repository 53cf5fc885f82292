use axum::extract::State;
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::error::AppError;

#[derive(Debug, Serialize, Deserialize)]
pub struct PositionsResponse {
    pub positions: Vec<PositionDto>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionDto {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub net_qty: Decimal,
    /// Undefined (null) when the symbol's unsigned volume is zero.
    #[serde(with = "rust_decimal::serde::float_option")]
    pub vwap: Option<Decimal>,
}

/// List current net positions, one per symbol with trades.
pub async fn get_positions(
    State(state): State<AppState>,
) -> Result<Json<PositionsResponse>, AppError> {
    let positions = state
        .repo
        .list_positions()
        .await?
        .into_iter()
        .map(|p| PositionDto {
            symbol: p.symbol.as_str().to_string(),
            net_qty: p.net_qty,
            vwap: p.vwap,
        })
        .collect();

    Ok(Json(PositionsResponse { positions }))
}
