//! `stockwatch-worker`: runs the monitoring engine against a seeded store.

use std::fs;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use stockwatch_core::{Clock, SystemClock};
use stockwatch_infra::{
    InMemoryMonitoringStore, InMemoryScanReportSink, LoadOptions, MonitorConfig, StoreSeed,
};
use stockwatch_monitoring::{MonitoringEngine, ScanCycleResult};

#[derive(Debug, Parser)]
#[command(
    name = "stockwatch-worker",
    about = "Inventory and sales anomaly monitor",
    after_help = "Examples:\n  stockwatch-worker scan --seed seed.json\n  stockwatch-worker watch --seed seed.json --duration-secs 600\n  stockwatch-worker config"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Path to a TOML config file (default: stockwatch.toml)")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Run one scan cycle and print the result, insights and health score as JSON")]
    Scan {
        #[arg(long, help = "JSON file with products, sales and issues")]
        seed: Option<PathBuf>,
    },
    #[command(about = "Run the background scan loop")]
    Watch {
        #[arg(long, help = "JSON file with products, sales and issues")]
        seed: Option<PathBuf>,
        #[arg(long, help = "Stop after this many seconds (default: until stdin closes)")]
        duration_secs: Option<u64>,
    },
    #[command(about = "Print the effective configuration as TOML")]
    Config,
}

#[derive(Debug, Serialize)]
struct ScanOutput {
    result: ScanCycleResult,
    insights: Vec<String>,
    health_score: u8,
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    match execute(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> anyhow::Result<()> {
    let config = MonitorConfig::load(LoadOptions {
        require_file: cli.config.is_some(),
        config_path: cli.config,
    })
    .context("loading configuration")?;

    stockwatch_observability::init(&config.logging);

    match cli.command {
        Command::Scan { seed } => scan_once(&config, seed.as_deref()),
        Command::Watch { seed, duration_secs } => watch(&config, seed.as_deref(), duration_secs),
        Command::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn build_engine(
    config: &MonitorConfig,
    seed: Option<&Path>,
) -> anyhow::Result<MonitoringEngine<Arc<InMemoryMonitoringStore>>> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let seed = match seed {
        Some(path) => load_seed(path)?,
        None => StoreSeed::default(),
    };
    info!(
        products = seed.products.len(),
        sales = seed.sales.len(),
        issues = seed.issues.len(),
        "store seeded"
    );

    let store = InMemoryMonitoringStore::from_seed(seed, clock.clone())
        .context("seed data failed validation")?;
    Ok(MonitoringEngine::new(Arc::new(store), clock, config.engine_settings()))
}

fn load_seed(path: &Path) -> anyhow::Result<StoreSeed> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading seed file `{}`", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing seed file `{}`", path.display()))
}

fn scan_once(config: &MonitorConfig, seed: Option<&Path>) -> anyhow::Result<()> {
    let engine = build_engine(config, seed)?;
    let result = engine.run_scan()?;

    let store = engine.store();
    let (products, sales, issues) = (store.products()?, store.sales()?, store.issues()?);
    let output = ScanOutput {
        result,
        insights: engine.generate_insights(&products, &sales, &issues),
        health_score: engine.compute_health_score(&issues, &products, &sales),
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn watch(config: &MonitorConfig, seed: Option<&Path>, duration_secs: Option<u64>) -> anyhow::Result<()> {
    let engine = Arc::new(build_engine(config, seed)?);
    let sink = Arc::new(InMemoryScanReportSink::new());
    let handle = config
        .runner()
        .spawn("stockwatch-scan", engine, sink.clone())
        .context("spawning scan runner")?;

    match duration_secs {
        Some(secs) => thread::sleep(Duration::from_secs(secs)),
        None => {
            // Any input line requests an extra cycle; EOF stops the loop.
            for line in io::stdin().lock().lines() {
                line?;
                handle.trigger();
            }
        }
    }

    handle.shutdown();
    let completed = sink.completed();
    info!(cycles = completed.len(), reports = sink.all().len(), "scan runner finished");
    println!("{}", serde_json::to_string_pretty(&completed)?);
    Ok(())
}
