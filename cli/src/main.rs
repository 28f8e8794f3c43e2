//! ChainFeed CLI: probe a node and watch its live, classified feed.
//!
//! # Commands
//! ```text
//! chainfeed probe  [--rpc <url>] [--chain-id <id>]
//! chainfeed watch  [--config <file.yaml>] [--rpc <url>] [--ws <url>] [--chain-id <id>]
//!                  [--pending] [--stats-every <secs>]
//! chainfeed info
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;

use chainfeed_analytics::selectors::{DEFI_GROUPS, NFT_GROUPS, PAYABLE_DEFI};
use chainfeed_core::{Category, FeedConfig, FeedEvent};
use chainfeed_stream::{probe, ChainStreamClient, FeedStats};

mod tracing_setup;
mod transport;

use tracing_setup::{init_tracing, LogConfig};
use transport::NetworkTransport;

#[derive(Parser)]
#[command(
    name = "chainfeed",
    about = "ChainFeed CLI: live classified block and transaction feed",
    long_about = "
ChainFeed CLI: subscribe to a node over WebSocket, resolve blocks and
transactions over HTTP JSON-RPC, classify every transaction and report
throughput and category weights. Defaults target the Monad testnet.

ENVIRONMENT VARIABLES:
  RUST_LOG    overrides --log-level (e.g. chainfeed_stream=debug)
",
    version
)]
struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    /// Log level: trace | debug | info | warn | error
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Endpoint overrides shared by `probe` and `watch`.
#[derive(clap::Args)]
struct Endpoint {
    /// YAML feed configuration (flags below override it)
    #[arg(long)]
    config: Option<String>,
    /// HTTP JSON-RPC URL
    #[arg(long)]
    rpc: Option<String>,
    /// WebSocket URL
    #[arg(long)]
    ws: Option<String>,
    /// Expected chain id
    #[arg(long)]
    chain_id: Option<u64>,
    /// Skip the eth_chainId check
    #[arg(long)]
    no_verify: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that the RPC endpoint answers and serves the expected chain
    Probe {
        #[command(flatten)]
        endpoint: Endpoint,
    },

    /// Connect and print blocks, transactions and periodic stats
    Watch {
        #[command(flatten)]
        endpoint: Endpoint,
        /// Also subscribe to newPendingTransactions
        #[arg(long)]
        pending: bool,
        /// Seconds between stats lines (0 disables them)
        #[arg(long, default_value_t = 10)]
        stats_every: u64,
    },

    /// Show categories, selector tables and default tuning
    Info,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&LogConfig {
        level: cli.log_level.clone(),
        json: cli.json_logs,
        ..LogConfig::default()
    });

    match cli.command {
        Commands::Probe { endpoint } => cmd_probe(&endpoint, cli.json).await,
        Commands::Watch {
            endpoint,
            pending,
            stats_every,
        } => cmd_watch(&endpoint, pending, stats_every, cli.json).await,
        Commands::Info => cmd_info(cli.json),
    }
}

fn load_config(endpoint: &Endpoint) -> Result<FeedConfig> {
    let mut config = match &endpoint.config {
        Some(path) => FeedConfig::from_yaml_file(path)?,
        None => FeedConfig::monad_testnet(),
    };
    if let Some(rpc) = &endpoint.rpc {
        config.rpc_url = rpc.clone();
    }
    if let Some(ws) = &endpoint.ws {
        config.ws_url = ws.clone();
    }
    if let Some(chain_id) = endpoint.chain_id {
        config.chain_id = chain_id;
    }
    if endpoint.no_verify {
        config.tuning.verify_chain_id = false;
    }
    config.validate()?;
    Ok(config)
}

// ─── Command implementations ─────────────────────────────────────────────────

async fn cmd_probe(endpoint: &Endpoint, as_json: bool) -> Result<()> {
    let config = load_config(endpoint)?;
    let transport = NetworkTransport::new()?;
    let report = probe(&transport, &config)
        .await
        .with_context(|| format!("probe {}", config.rpc_url))?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Endpoint:   {}", config.rpc_url);
        match report.chain_id {
            Some(id) => println!("Chain id:   {id} (verified)"),
            None => println!("Chain id:   not checked"),
        }
        println!("Head block: {}", report.head_block);
        println!("Latency:    {} ms", report.latency_ms);
    }
    Ok(())
}

async fn cmd_watch(endpoint: &Endpoint, pending: bool, stats_every: u64, as_json: bool) -> Result<()> {
    let config = load_config(endpoint)?;
    let transport = Arc::new(NetworkTransport::new()?);
    let client = ChainStreamClient::spawn(config.clone(), transport)?;
    let mut events = client.events();

    if pending {
        client.subscribe_kind("newPendingTransactions")?;
    }
    client.connect()?;
    if !as_json {
        println!("Watching {} on chain {}, Ctrl-C to stop", config.ws_url, config.chain_id);
    }

    let mut ticker = tokio::time::interval(Duration::from_secs(stats_every.max(1)));
    ticker.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(FeedEvent::ConnectionFailed { reason }) => {
                    print_stats(&client.stats(), as_json)?;
                    bail!("connection to {} failed: {reason}", config.ws_url);
                }
                Ok(event) => print_event(&event, as_json)?,
                Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "output fell behind the feed"),
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick(), if stats_every > 0 => print_stats(&client.stats(), as_json)?,
            _ = tokio::signal::ctrl_c() => {
                client.disconnect()?;
                print_stats(&client.stats(), as_json)?;
                break;
            }
        }
    }
    Ok(())
}

fn print_event(event: &FeedEvent, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::to_string(event)?);
        return Ok(());
    }
    match event {
        FeedEvent::NewBlock(block) => println!(
            "block  #{:<10} txs={:<5} gas={:>5.1}%  dt={}ms  ({:?})",
            block.number,
            block.transaction_count,
            block.network_utilization,
            block.block_time,
            block.source
        ),
        FeedEvent::NewTransaction(tx) => println!(
            "tx     {:<16} {:<66} {} {}",
            tx.classification.category_display,
            tx.tx.hash,
            tx.tx.value,
            tx.tx.token
        ),
        FeedEvent::StateChanged { from, to } => println!("state  {from} → {to}"),
        FeedEvent::ConnectionFailed { reason } => println!("failed {reason}"),
    }
    Ok(())
}

fn print_stats(stats: &FeedStats, as_json: bool) -> Result<()> {
    if as_json {
        println!("{}", serde_json::json!({ "event": "stats", "data": stats }));
        return Ok(());
    }
    println!(
        "stats  state={} blocks={} txs={} tps={:.1} avg_block={:.0}ms most_active={} dropped={}",
        stats.state,
        stats.blocks_received,
        stats.transactions_received,
        stats.current_tps,
        stats.average_block_time_ms,
        stats.most_active.display_name(),
        stats.dropped_notifications
    );
    for category in Category::ALL {
        println!(
            "       {:<16} count={:<6} share={:>3}%  weight={:.2}",
            category.display_name(),
            stats.category_counts.get(&category).copied().unwrap_or(0),
            stats.category_percentages.get(&category).copied().unwrap_or(0),
            stats.weights.get(&category).copied().unwrap_or(1.0)
        );
    }
    Ok(())
}

fn cmd_info(as_json: bool) -> Result<()> {
    let defaults = FeedConfig::monad_testnet();

    if as_json {
        let categories: Vec<_> = Category::ALL
            .into_iter()
            .map(|c| {
                serde_json::json!({
                    "category": c,
                    "display": c.display_name(),
                    "color": c.color(),
                    "dropImage": c.drop_image(),
                })
            })
            .collect();
        let info = serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "categories": categories,
            "defaults": defaults,
        });
        println!("{}", serde_json::to_string_pretty(&info)?);
        return Ok(());
    }

    println!("ChainFeed v{}", env!("CARGO_PKG_VERSION"));
    println!();
    println!("Categories:");
    for c in Category::ALL {
        println!("  {:<16} {}  {}", c.display_name(), c.color(), c.drop_image());
    }
    println!();
    println!("Selector tables:");
    for group in DEFI_GROUPS.iter().chain(NFT_GROUPS.iter()).chain([&PAYABLE_DEFI]) {
        println!("  {:<16} {} selectors", group.name, group.selectors.len());
    }
    println!();
    let tuning = &defaults.tuning;
    println!("Defaults (Monad testnet):");
    println!("  rpc                {}", defaults.rpc_url);
    println!("  ws                 {}", defaults.ws_url);
    println!("  chain id           {}", defaults.chain_id);
    println!("  block time         {} ms", defaults.block_time_ms);
    println!(
        "  reconnect          {} attempts, {} ms base, x{}",
        tuning.reconnect.max_attempts, tuning.reconnect.base_delay_ms, tuning.reconnect.multiplier
    );
    println!(
        "  fetch timeouts     block {} ms, tx {} ms",
        tuning.block_fetch_timeout_ms, tuning.tx_fetch_timeout_ms
    );
    println!(
        "  delay caps         block {} ms, tx {} ms",
        tuning.block_delay.cap_ms, tuning.tx_delay.cap_ms
    );
    Ok(())
}
