//! QueueDesk CLI - Command-line interface for the QueueDesk daemon

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tabled::{Table, Tabled};

const DEFAULT_RPC_URL: &str = "http://127.0.0.1:9530";

#[derive(Parser)]
#[command(name = "queuedesk")]
#[command(about = "QueueDesk access-code queue CLI", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// RPC server URL
    #[arg(long, env = "QUEUEDESK_RPC_URL", default_value = DEFAULT_RPC_URL)]
    rpc_url: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage queues
    #[command(subcommand)]
    Queue(QueueCommand),

    /// Manage access codes
    #[command(subcommand)]
    Code(CodeCommand),

    /// Show daemon statistics
    #[command(alias = "status")]
    Stats,
}

#[derive(Subcommand)]
enum QueueCommand {
    /// Create a queue
    Create {
        name: String,

        /// Expected seconds per visitor, used for wait estimates
        #[arg(short, long)]
        min_attention: Option<i64>,
    },

    /// List queues
    List,

    /// Open a queue for the day
    Start { id: i64 },

    /// Delete a queue without codes
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum CodeCommand {
    /// Get (or create) the code of a visitor; a random visitor id when omitted
    Resolve {
        visitor_id: Option<String>,

        #[arg(short, long)]
        queue: i64,
    },

    /// Call the next waiting code
    Next { queue: i64 },

    /// Show the code being attended
    Current { queue: i64 },

    /// Count codes still to be served
    Remaining { queue: i64 },

    /// Estimate the wait of a code
    Estimate { id: i64 },

    /// Show one code
    Get { id: i64 },

    /// Search codes
    Search {
        #[arg(short, long)]
        queue: Option<i64>,

        /// WAITING, ATTENDING or ATTENDED
        #[arg(short, long)]
        status: Option<String>,

        #[arg(long, default_value = "0")]
        page: u32,

        #[arg(long, default_value = "20")]
        size: u32,
    },

    /// Delete a code
    Delete { id: i64 },
}

#[derive(Serialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    method: String,
    params: Value,
    id: u64,
}

#[derive(Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[allow(dead_code)]
    id: u64,
    result: Option<Value>,
    error: Option<JsonRpcError>,
}

#[derive(Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

#[derive(Deserialize)]
struct AccessCode {
    id: i64,
    queue_id: i64,
    visitor_id: Option<String>,
    status: String,
    created_at: i64,
    attending_at: Option<i64>,
    attended_at: Option<i64>,
}

#[derive(Tabled)]
struct CodeRow {
    id: i64,
    queue: i64,
    visitor: String,
    status: String,
    created_at: i64,
    attending_at: String,
    attended_at: String,
}

impl From<AccessCode> for CodeRow {
    fn from(code: AccessCode) -> Self {
        Self {
            id: code.id,
            queue: code.queue_id,
            visitor: code.visitor_id.unwrap_or_else(|| "-".to_string()),
            status: code.status,
            created_at: code.created_at,
            attending_at: optional(code.attending_at),
            attended_at: optional(code.attended_at),
        }
    }
}

#[derive(Deserialize, Tabled)]
struct QueueRow {
    id: i64,
    name: String,
    started: bool,
    min_attention_time_secs: i64,
    created_at: i64,
}

fn optional(value: Option<i64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

fn print_codes(codes: Vec<AccessCode>) {
    let rows: Vec<CodeRow> = codes.into_iter().map(CodeRow::from).collect();
    println!("{}", Table::new(rows));
}

async fn call_rpc(url: &str, method: &str, params: Value) -> Result<Value> {
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

async fn run_queue(url: &str, command: QueueCommand) -> Result<()> {
    match command {
        QueueCommand::Create {
            name,
            min_attention,
        } => {
            let params = json!({ "name": name, "min_attention_time_secs": min_attention });
            let queue: QueueRow =
                serde_json::from_value(call_rpc(url, "queue.create.v1", params).await?)?;
            println!("{}", "✓ Queue created".green().bold());
            println!("{}", Table::new(vec![queue]));
        }

        QueueCommand::List => {
            let result = call_rpc(url, "queue.list.v1", json!({})).await?;
            let queues: Vec<QueueRow> = serde_json::from_value(result["queues"].clone())?;
            if queues.is_empty() {
                println!("{}", "No queues".yellow());
            } else {
                println!("{}", Table::new(queues));
            }
        }

        QueueCommand::Start { id } => {
            let queue: QueueRow =
                serde_json::from_value(call_rpc(url, "queue.start.v1", json!({ "id": id })).await?)?;
            println!(
                "{}",
                format!("✓ Queue {} ({}) started", queue.id, queue.name)
                    .green()
                    .bold()
            );
        }

        QueueCommand::Delete { id } => {
            let result = call_rpc(url, "queue.delete.v1", json!({ "id": id })).await?;
            if result["deleted"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Queue {} deleted", id).green().bold());
            } else {
                println!("{}", format!("Queue {} not found", id).yellow());
            }
        }
    }
    Ok(())
}

async fn run_code(url: &str, command: CodeCommand) -> Result<()> {
    match command {
        CodeCommand::Resolve { visitor_id, queue } => {
            let visitor_id = visitor_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            let params = json!({ "visitor_id": visitor_id, "queue_id": queue });
            let code: AccessCode =
                serde_json::from_value(call_rpc(url, "code.resolve_visitor.v1", params).await?)?;
            println!(
                "{}",
                format!("✓ Code {} for visitor {}", code.id, visitor_id)
                    .green()
                    .bold()
            );
            print_codes(vec![code]);
        }

        CodeCommand::Next { queue } => {
            let result = call_rpc(url, "code.call_next.v1", json!({ "queue_id": queue })).await?;
            if result["next"].is_null() {
                println!("{}", "No waiting codes".yellow());
            } else {
                let next: AccessCode = serde_json::from_value(result["next"]["access_code"].clone())?;
                if let Some(closed) = result["next"]["closed"]["id"].as_i64() {
                    println!("  {} code {} attended", "•".bold(), closed);
                }
                println!("{}", format!("✓ Now attending code {}", next.id).green().bold());
            }
        }

        CodeCommand::Current { queue } => {
            let result = call_rpc(url, "code.current.v1", json!({ "queue_id": queue })).await?;
            if result["current"].is_null() {
                println!("{}", "Nobody is being attended".yellow());
            } else {
                print_codes(vec![serde_json::from_value(result["current"].clone())?]);
            }
        }

        CodeCommand::Remaining { queue } => {
            let result = call_rpc(url, "code.remaining.v1", json!({ "queue_id": queue })).await?;
            println!(
                "  {} {} ({})",
                "Remaining:".bold(),
                result["remaining"],
                result["scope"].as_str().unwrap_or("-")
            );
        }

        CodeCommand::Estimate { id } => {
            let result = call_rpc(url, "code.estimated_time.v1", json!({ "id": id })).await?;
            let secs = result["estimated_secs"].as_u64().unwrap_or(0);
            println!(
                "  {} {}m {}s ({})",
                "Estimated wait:".bold(),
                secs / 60,
                secs % 60,
                result["status"].as_str().unwrap_or("-")
            );
        }

        CodeCommand::Get { id } => {
            let code: AccessCode =
                serde_json::from_value(call_rpc(url, "code.get.v1", json!({ "id": id })).await?)?;
            print_codes(vec![code]);
        }

        CodeCommand::Search {
            queue,
            status,
            page,
            size,
        } => {
            let params = json!({
                "queue_id": queue,
                "status": status.map(|s| s.to_uppercase()),
                "page_number": page,
                "page_size": size,
            });
            let result = call_rpc(url, "code.search.v1", params).await?;
            let codes: Vec<AccessCode> = serde_json::from_value(result["content"].clone())?;
            println!(
                "{}",
                format!(
                    "Page {} ({} of {} codes)",
                    page,
                    codes.len(),
                    result["total_elements"]
                )
                .cyan()
                .bold()
            );
            print_codes(codes);
        }

        CodeCommand::Delete { id } => {
            let result = call_rpc(url, "code.delete.v1", json!({ "id": id })).await?;
            if result["deleted"].as_bool().unwrap_or(false) {
                println!("{}", format!("✓ Code {} deleted", id).green().bold());
            } else {
                println!("{}", format!("Code {} not found", id).yellow());
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Queue(command) => run_queue(&cli.rpc_url, command).await?,
        Commands::Code(command) => run_code(&cli.rpc_url, command).await?,

        Commands::Stats => {
            println!("{}", "System Status".cyan().bold());
            println!();

            match call_rpc(&cli.rpc_url, "admin.stats.v1", json!({})).await {
                Ok(stats) => {
                    println!("  {} {}", "RPC URL:".bold(), cli.rpc_url);
                    println!("  {} {}", "Status:".bold(), "ONLINE".green());
                    println!();
                    println!("  {} {}", "Queues:".bold(), stats["queues"]);
                    println!("  {} {}", "Waiting:".bold(), stats["waiting_codes"]);
                    println!("  {} {}", "Attending:".bold(), stats["attending_codes"]);
                    println!("  {} {}", "Attended:".bold(), stats["attended_codes"]);
                    println!("  {} {}", "Subscribers:".bold(), stats["subscribers"]);
                    println!("  {} {} seconds", "Uptime:".bold(), stats["uptime_seconds"]);
                }
                Err(e) => {
                    println!("  {} {}", "Status:".bold(), "ERROR".red());
                    println!("  {} {}", "Error:".bold(), e);
                }
            }
        }
    }

    Ok(())
}
