//! Hookline CLI - Operator commands against the daemon's JSON-RPC API

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9630";

#[derive(Parser)]
#[command(name = "hookline")]
#[command(about = "Hookline webhook delivery CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "HOOKLINE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a signed test event to a subscription and show the response
    TestWebhook {
        #[arg(short, long)]
        workspace: String,

        #[arg(short, long)]
        subscription: String,
    },

    /// Show delivery counters for a subscription
    SubscriptionStats {
        #[arg(short, long)]
        workspace: String,

        #[arg(short, long)]
        subscription: String,
    },

    /// Show delivery counts per status for a workspace
    DeliveryStats {
        #[arg(short, long)]
        workspace: String,
    },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: serde_json::Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    result: Option<serde_json::Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct TestWebhookResult {
    status_code: u16,
    body: String,
}

#[derive(Deserialize, Tabled)]
struct SubscriptionStats {
    subscription_id: String,
    url: String,
    enabled: bool,
    success_count: i64,
    failure_count: i64,
    #[tabled(display_with = "display_last_delivery")]
    last_delivery_at: Option<i64>,
}

#[derive(Deserialize, Tabled)]
struct DeliveryStats {
    workspace_id: String,
    pending: i64,
    delivered: i64,
    failed: i64,
}

fn display_last_delivery(at: &Option<i64>) -> String {
    format_millis(*at)
}

/// Epoch ms as RFC 3339, "never" when unset
fn format_millis(at: Option<i64>) -> String {
    match at.and_then(chrono::DateTime::from_timestamp_millis) {
        Some(dt) => dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => "never".to_string(),
    }
}

async fn call_rpc(url: &str, method: &str, params: serde_json::Value) -> Result<serde_json::Value> {
    let request = JsonRpcRequest {
        jsonrpc: "2.0".to_string(),
        method: method.to_string(),
        params,
        id: 1,
    };

    let client = reqwest::Client::new();
    let response: JsonRpcResponse = client
        .post(url)
        .json(&request)
        .send()
        .await
        .context("Failed to connect to daemon")?
        .json()
        .await
        .context("Failed to parse response")?;

    if let Some(error) = response.error {
        anyhow::bail!("RPC error ({}): {}", error.code, error.message);
    }

    response
        .result
        .ok_or_else(|| anyhow::anyhow!("No result in response"))
}

fn status_label(status_code: u16) -> colored::ColoredString {
    let label = status_code.to_string();
    match status_code {
        200..=299 => label.green().bold(),
        400..=499 => label.yellow().bold(),
        _ => label.red().bold(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::TestWebhook {
            workspace,
            subscription,
        } => {
            let params = json!({
                "workspace_id": workspace,
                "subscription_id": subscription,
            });

            let result = call_rpc(&cli.rpc_url, "webhooks.test.v1", params).await?;
            let test: TestWebhookResult = serde_json::from_value(result)?;

            println!("{}", "Test webhook sent".cyan().bold());
            println!();
            println!("  {} {}", "Status:".bold(), status_label(test.status_code));
            if test.body.is_empty() {
                println!("  {} {}", "Body:".bold(), "(empty)".dimmed());
            } else {
                println!("  {}", "Body:".bold());
                println!("{}", test.body);
            }
        }

        Commands::SubscriptionStats {
            workspace,
            subscription,
        } => {
            let params = json!({
                "workspace_id": workspace,
                "subscription_id": subscription,
            });

            let result = call_rpc(&cli.rpc_url, "webhooks.stats.v1", params).await?;
            let stats: SubscriptionStats = serde_json::from_value(result)?;

            if !stats.enabled {
                println!("{}", "Subscription is disabled".yellow());
                println!();
            }
            println!("{}", Table::new(vec![stats]));
        }

        Commands::DeliveryStats { workspace } => {
            let params = json!({ "workspace_id": workspace });

            let result = call_rpc(&cli.rpc_url, "deliveries.stats.v1", params).await?;
            let stats: DeliveryStats = serde_json::from_value(result)?;

            if stats.failed > 0 {
                println!(
                    "{}",
                    format!("{} deliveries failed permanently", stats.failed).red()
                );
                println!();
            }
            println!("{}", Table::new(vec![stats]));
        }
    }

    Ok(())
}
