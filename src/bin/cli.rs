//! Operator CLI for the reconciliation service.
//!
//! Generates and ingests random trades over HTTP and renders positions and
//! breaks as tables.

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use reconciler::api::breaks::BreaksResponse;
use reconciler::api::positions::PositionsResponse;
use reconciler::gen::random_batch;

#[derive(Parser)]
#[command(name = "reconciler-cli", about = "Drive the trade reconciliation service")]
struct Cli {
    /// Base URL of the running service.
    #[arg(long, default_value = "http://127.0.0.1:8080")]
    url: String,

    /// Seed for trade generation; defaults to entropy.
    #[arg(long)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate and ingest random trades.
    Ingest {
        /// Number of random trades to send.
        #[arg(default_value_t = 20)]
        count: usize,
    },
    /// Seed the ledger with 50 random trades.
    Seed,
    /// Display current net positions.
    Positions,
    /// Show breaks detected by reconciliation.
    Breaks,
    /// Wipe the ledger and all derived state.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut rng = match cli.seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };

    match cli.command {
        Command::Ingest { count } => ingest(&client, &cli.url, &mut rng, count).await,
        Command::Seed => ingest(&client, &cli.url, &mut rng, 50).await,
        Command::Positions => positions(&client, &cli.url).await,
        Command::Breaks => breaks(&client, &cli.url).await,
        Command::Clear => clear(&client, &cli.url).await,
    }
}

async fn ingest(
    client: &reqwest::Client,
    url: &str,
    rng: &mut ChaCha8Rng,
    count: usize,
) -> anyhow::Result<()> {
    let batch = random_batch(rng, count);
    let response = client
        .post(format!("{}/v1/trades", url))
        .json(&batch)
        .send()
        .await
        .context("ingest request failed")?
        .error_for_status()
        .context("service rejected the batch")?;

    let body: serde_json::Value = response.json().await?;
    println!("Inserted {} trades", body["inserted"]);
    Ok(())
}

async fn positions(client: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    let response: PositionsResponse = client
        .get(format!("{}/v1/positions", url))
        .send()
        .await
        .context("positions request failed")?
        .error_for_status()?
        .json()
        .await?;

    let mut table = Table::new();
    table.set_header(["Symbol", "Net Qty", "VWAP"]);
    for p in response.positions {
        let vwap = p
            .vwap
            .map(|v| v.round_dp(2).to_string())
            .unwrap_or_else(|| "-".to_string());
        table.add_row([p.symbol, p.net_qty.to_string(), vwap]);
    }
    println!("{table}");
    Ok(())
}

async fn breaks(client: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    let response: BreaksResponse = client
        .get(format!("{}/v1/breaks", url))
        .send()
        .await
        .context("breaks request failed")?
        .error_for_status()?
        .json()
        .await?;

    let mut table = Table::new();
    table.set_header(["Trade ID", "Reason", "Detected"]);
    for b in response.breaks {
        table.add_row([b.trade_id.to_string(), b.reason.to_string(), b.detected_ts]);
    }
    println!("{table}");
    Ok(())
}

async fn clear(client: &reqwest::Client, url: &str) -> anyhow::Result<()> {
    client
        .delete(format!("{}/v1/trades", url))
        .send()
        .await
        .context("clear request failed")?
        .error_for_status()?;
    println!("Ledger cleared");
    Ok(())
}
