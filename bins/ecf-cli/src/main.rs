//! ecf — SimpleDAO reentrancy demonstration and ECF checking.
//!
//! `attack` drives a running node over JSON-RPC, `simulate` runs the same
//! sequence on an in-memory devchain with the ECF checker attached, and
//! `serve` exposes a devchain over JSON-RPC for `attack` to target.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use parking_lot::Mutex;
use tracing::{info, warn};

use ecf_checker::report::default_report_path;
use ecf_checker::{Checker, JsonLinesSink, MemorySink, ReportSink};
use ecf_core::artifacts::DaoVariant;
use ecf_devchain::chain::SharedTracer;
use ecf_devchain::{Devchain, start_rpc_server};
use ecf_rpc::{MiningMode, RpcNodeClient};
use ecf_scenario::{Outcome, ScenarioReport};

mod config;

use config::Settings;

/// SimpleDAO reentrancy scenario runner with an effectively-callback-free checker.
#[derive(Parser)]
#[command(name = "ecf", version, about)]
struct Cli {
    /// Settings file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log output format ("text" or "json")
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scenario against a node over JSON-RPC.
    Attack(AttackArgs),
    /// Run the scenario on an in-memory devchain with the checker attached.
    Simulate(SimulateArgs),
    /// Serve a devchain over JSON-RPC.
    Serve(ServeArgs),
}

#[derive(Args)]
struct AttackArgs {
    /// SimpleDAO build to deploy (vulnerable or patched).
    #[arg(long, default_value = "vulnerable")]
    variant: DaoVariant,

    /// JSON-RPC endpoint of the node.
    #[arg(long)]
    rpc_endpoint: Option<String>,

    /// How blocks are forced: instant (evm_mine) or miner (miner_start).
    #[arg(long)]
    mining: Option<MiningMode>,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct SimulateArgs {
    /// SimpleDAO build to deploy (vulnerable or patched).
    #[arg(long, default_value = "vulnerable")]
    variant: DaoVariant,

    /// Run without the ECF checker.
    #[arg(long)]
    no_check: bool,

    /// Append non-ECF reports to this JSON lines file.
    #[arg(long)]
    report_file: Option<PathBuf>,

    /// Append non-ECF reports to the default file under the data directory.
    #[arg(long, conflicts_with = "report_file")]
    persist_reports: bool,

    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
}

#[derive(Args)]
struct ServeArgs {
    /// Bind address of the JSON-RPC server.
    #[arg(long)]
    addr: Option<String>,

    /// Mine a block for every submitted transaction.
    #[arg(long)]
    automine: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(&cli.log_level, &cli.log_format, &settings);

    match cli.command {
        Commands::Attack(args) => attack(args, settings).await,
        Commands::Simulate(args) => simulate(args, settings).await,
        Commands::Serve(args) => serve(args, settings).await,
    }
}

/// Initialize tracing with `level` plus the checker's own verbosity.
fn init_logging(level: &str, format: &str, settings: &Settings) {
    use tracing_subscriber::filter::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{level},{}", settings.checker.log_directive())));

    if format == "json" {
        tracing_subscriber::registry().with(filter).with(fmt::layer().json()).init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}

fn print_report(report: &ScenarioReport, outcome: Option<&Outcome>, json: bool) -> Result<()> {
    if json {
        let value = serde_json::json!({ "report": report, "outcome": outcome });
        println!("{}", serde_json::to_string_pretty(&value).context("Failed to encode report")?);
        return Ok(());
    }

    println!("Variant:   {}", report.variant);
    println!("SimpleDAO: {}", report.dao);
    println!("Mallory:   {}", report.mallory);
    println!("Before:    SimpleDAO has {} and Mallory has {}", report.before.dao, report.before.mallory);
    println!("After:     SimpleDAO has {} and Mallory has {}", report.after.dao, report.after.mallory);
    println!("Mallory credit: {}", report.mallory_credit);
    match outcome {
        Some(outcome) => println!("Outcome:   {outcome}"),
        None => println!("Outcome:   unexpected for this variant"),
    }
    Ok(())
}

/// Verify `report`, printing it either way; an unexpected outcome fails the command.
fn finish(report: &ScenarioReport, settings: &Settings, json: bool) -> Result<()> {
    match ecf_scenario::verify(report, &settings.scenario) {
        Ok(outcome) => print_report(report, Some(&outcome), json),
        Err(e) => {
            print_report(report, None, json)?;
            Err(e).context("Scenario did not behave as expected")
        }
    }
}

async fn attack(args: AttackArgs, mut settings: Settings) -> Result<()> {
    if let Some(endpoint) = args.rpc_endpoint {
        settings.rpc.endpoint = endpoint;
    }
    if let Some(mining) = args.mining {
        settings.rpc.mining = mining;
    }
    let client = RpcNodeClient::new(settings.rpc.clone())
        .with_context(|| format!("Failed to create RPC client for {}", settings.rpc.endpoint))?;
    info!(endpoint = client.endpoint(), mining = %client.mining_mode(), variant = %args.variant, "attacking node");

    let report = ecf_scenario::run(&client, args.variant, &settings.scenario)
        .await
        .with_context(|| format!("Scenario failed against {}", settings.rpc.endpoint))?;
    finish(&report, &settings, args.json)
}

async fn simulate(args: SimulateArgs, mut settings: Settings) -> Result<()> {
    if args.no_check {
        settings.checker.enabled = false;
    }
    let report_path = args
        .report_file
        .or_else(|| args.persist_reports.then(default_report_path))
        .or_else(|| settings.checker.report_path.clone());

    let sink: Box<dyn ReportSink> = match &report_path {
        Some(path) => Box::new(
            JsonLinesSink::open(path).with_context(|| format!("Failed to open report file {}", path.display()))?,
        ),
        None => Box::new(MemorySink::new()),
    };
    let checker = Arc::new(Mutex::new(Checker::new(settings.checker.clone(), sink)));
    let tracer: SharedTracer = checker.clone();
    let chain = Devchain::new(settings.devchain.clone()).with_tracer(tracer);

    let report = ecf_scenario::run(&chain, args.variant, &settings.scenario)
        .await
        .context("Scenario failed on the devchain")?;
    let verified = finish(&report, &settings, args.json);

    let checker = checker.lock();
    if checker.is_enabled() {
        for verdict in checker.verdicts().iter().filter(|v| !v.verdict.is_ecf()) {
            println!("Transaction {} is not ECF for contract {}", verdict.transaction_id, verdict.contract);
        }
        let flagged = checker.flagged(&report.dao);
        match (args.variant, flagged) {
            (DaoVariant::Vulnerable, true) => println!("ECF checker flagged the SimpleDAO reentrancy"),
            (DaoVariant::Patched, false) => println!("ECF checker found every transaction ECF"),
            (variant, flagged) => warn!(%variant, flagged, "ECF checker verdict does not match the variant"),
        }
        if let Some(path) = &report_path {
            println!("Reports appended to {}", path.display());
        }
    }
    verified
}

async fn serve(args: ServeArgs, mut settings: Settings) -> Result<()> {
    if let Some(addr) = args.addr {
        settings.devchain.rpc_addr = addr;
    }
    if args.automine {
        settings.devchain.automine = true;
    }
    let addr = settings.devchain.rpc_addr.clone();
    let chain = Devchain::new(settings.devchain);
    for (i, account) in chain.accounts().iter().enumerate() {
        info!("account {i}: {account}");
    }

    let (local, handle) = start_rpc_server(&addr, chain)
        .await
        .with_context(|| format!("Failed to start devchain RPC server on {addr}"))?;
    info!("devchain serving on http://{local} (Ctrl+C to stop)");

    tokio::select! {
        _ = handle.clone().stopped() => {
            bail!("RPC server stopped unexpectedly");
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!("received Ctrl+C, shutting down...");
        }
    }

    handle.stop().ok();
    info!("devchain RPC server stopped");
    Ok(())
}
