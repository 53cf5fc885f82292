use axum::http::StatusCode;
use reconciler::api::{self, AppState};
use reconciler::config::Config;
use reconciler::db::init_db;
use reconciler::orchestration::IngestOrchestrator;
use reconciler::Repository;
use std::collections::HashMap;
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

async fn setup_test_app(overrides: &[(&str, &str)]) -> (axum::Router, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));

    let mut env_map = HashMap::new();
    env_map.insert("DATABASE_PATH".to_string(), db_path);
    env_map.insert("SIM_MISSING_RATE".to_string(), "0".to_string());
    env_map.insert("SIM_ALTER_RATE".to_string(), "0".to_string());
    env_map.insert("SIM_SEED".to_string(), "42".to_string());
    for (k, v) in overrides {
        env_map.insert(k.to_string(), v.to_string());
    }
    let config = Config::from_env_map(env_map).expect("config failed");

    let orchestrator = Arc::new(IngestOrchestrator::new(repo.clone(), &config));
    let state = AppState::new(repo, orchestrator);

    (api::create_router(state), temp_dir)
}

async fn ingest(app: &axum::Router, batch: serde_json::Value) {
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/v1/trades")
        .header("content-type", "application/json")
        .body(axum::body::Body::from(batch.to_string()))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

async fn get_breaks(app: &axum::Router) -> Vec<serde_json::Value> {
    let request = axum::http::Request::builder()
        .method("GET")
        .uri("/v1/breaks")
        .body(axum::body::Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    body["breaks"].as_array().unwrap().clone()
}

#[tokio::test]
async fn test_faithful_confirmations_produce_no_breaks() {
    let (app, _temp) = setup_test_app(&[]).await;

    ingest(
        &app,
        serde_json::json!([
            {"symbol": "AAPL", "side": "BUY", "qty": 100.0, "price": 10.0,
             "trade_ts": "2024-01-15T09:30:00Z"}
        ]),
    )
    .await;

    assert!(get_breaks(&app).await.is_empty());
}

#[tokio::test]
async fn test_dropped_confirmation_yields_one_missing_trade_break() {
    let (app, _temp) = setup_test_app(&[("SIM_MISSING_RATE", "1")]).await;

    ingest(
        &app,
        serde_json::json!([
            {"symbol": "AAPL", "side": "BUY", "qty": 100.0, "price": 10.0,
             "trade_ts": "2024-01-15T09:30:00Z"}
        ]),
    )
    .await;

    let breaks = get_breaks(&app).await;
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0]["reason"], "MISSING_TRADE");
    assert_eq!(breaks[0]["tradeId"], 1);
    // detectedTs is ISO-8601
    let ts = breaks[0]["detectedTs"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
}

#[tokio::test]
async fn test_overstated_quantity_break() {
    let (app, _temp) = setup_test_app(&[
        ("SIM_ALTER_RATE", "1"),
        ("SIM_DELTA_LO", "15"),
        ("SIM_DELTA_HI", "15"),
    ])
    .await;

    ingest(
        &app,
        serde_json::json!([
            {"symbol": "AAPL", "side": "BUY", "qty": 100.0, "price": 10.0,
             "trade_ts": "2024-01-15T09:30:00Z"}
        ]),
    )
    .await;

    let breaks = get_breaks(&app).await;
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0]["reason"], "QUANTITY_OVERSTATED");
}

#[tokio::test]
async fn test_understated_quantity_break() {
    let (app, _temp) = setup_test_app(&[
        ("SIM_ALTER_RATE", "1"),
        ("SIM_DELTA_LO", "-15"),
        ("SIM_DELTA_HI", "-15"),
    ])
    .await;

    ingest(
        &app,
        serde_json::json!([
            {"symbol": "AAPL", "side": "BUY", "qty": 100.0, "price": 10.0,
             "trade_ts": "2024-01-15T09:30:00Z"}
        ]),
    )
    .await;

    let breaks = get_breaks(&app).await;
    assert_eq!(breaks.len(), 1);
    assert_eq!(breaks[0]["reason"], "QUANTITY_UNDERSTATED");
}

#[tokio::test]
async fn test_net_short_symbol_flags_each_contributing_trade_once() {
    let (app, _temp) = setup_test_app(&[]).await;

    ingest(
        &app,
        serde_json::json!([
            {"symbol": "TSLA", "side": "BUY", "qty": 10.0, "price": 200.0,
             "trade_ts": "2024-01-15T09:30:00Z"}
        ]),
    )
    .await;
    ingest(
        &app,
        serde_json::json!([
            {"symbol": "TSLA", "side": "SELL", "qty": 40.0, "price": 210.0,
             "trade_ts": "2024-01-15T09:31:00Z"}
        ]),
    )
    .await;

    let breaks = get_breaks(&app).await;
    let negatives: Vec<_> = breaks
        .iter()
        .filter(|b| b["reason"] == "NEGATIVE_POSITION")
        .collect();
    assert_eq!(negatives.len(), 2);

    // Another detection pass over unchanged state adds nothing.
    ingest(&app, serde_json::json!([])).await;
    let breaks = get_breaks(&app).await;
    let negatives: Vec<_> = breaks
        .iter()
        .filter(|b| b["reason"] == "NEGATIVE_POSITION")
        .collect();
    assert_eq!(negatives.len(), 2);
}
