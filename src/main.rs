//! # Leadflow — lead outreach pipeline
//!
//! One subcommand per pipeline stage, meant to be run from cron.
//!
//! Usage:
//!   leadflow init                      # Write default config, create tables
//!   leadflow ingest --file leads.json  # Append new leads from a JSON import
//!   leadflow enrich                    # Skip-trace leads without phones
//!   leadflow queue                     # Queue due messages
//!   leadflow dispatch                  # Send this tick's batch
//!   leadflow run                       # Every stage in order

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::{Parser, Subcommand};
use leadflow_channels::{BatchDataClient, HttpSmsGateway, JsonFileSource};
use leadflow_core::LeadflowConfig;
use leadflow_core::table::{self, leads, queue, templates};
use leadflow_core::traits::{RecordStore, ThreadRandom};
use leadflow_scheduler::DispatchScheduler;
use leadflow_store::SqliteStore;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "leadflow", version, about = "📨 Leadflow — lead outreach pipeline")]
struct Cli {
    /// Config file (default: ~/.leadflow/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config (if none exists) and create the store tables
    Init,
    /// Append new leads from a JSON import
    Ingest {
        /// Import file (default: ingest.import_path from config)
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Skip-trace leads that have no phone numbers
    Enrich,
    /// Queue messages for every due phone slot
    Queue,
    /// Send one rate-limited batch
    Dispatch,
    /// Ingest (when an import path is configured), enrich, queue and dispatch
    Run,
}

fn expand_path(p: &str) -> String {
    shellexpand::tilde(p).to_string()
}

fn config_path(cli: &Cli) -> PathBuf {
    cli.config.clone().unwrap_or_else(LeadflowConfig::default_path)
}

fn load_config(path: &Path) -> Result<LeadflowConfig> {
    if path.exists() {
        LeadflowConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))
    } else {
        tracing::warn!("⚠️ No config at {}, using defaults", path.display());
        Ok(LeadflowConfig::default())
    }
}

fn open_store(config: &LeadflowConfig) -> Result<SqliteStore> {
    let path = expand_path(&config.store.path);
    SqliteStore::open(Path::new(&path)).with_context(|| format!("opening store at {path}"))
}

fn init(path: &Path) -> Result<()> {
    let config = if path.exists() {
        println!("⚠️  Config already exists at {}", path.display());
        LeadflowConfig::load_from(path)?
    } else {
        let config = LeadflowConfig::default();
        config.save_to(path)?;
        println!("✅ Wrote default config to {}", path.display());
        config
    };

    let store = open_store(&config)?;
    store.ensure_table(table::LEADS, &leads::headers())?;
    store.ensure_table(table::MESSAGE_QUEUE, &queue::headers())?;
    store.ensure_table(table::MESSAGE_TEMPLATES, &templates::headers())?;
    println!("🗂️  Store ready at {}", expand_path(&config.store.path));
    Ok(())
}

async fn run_ingest(store: &SqliteStore, config: &LeadflowConfig, file: Option<PathBuf>) -> Result<()> {
    let path = match file {
        Some(path) => path,
        None if !config.ingest.import_path.is_empty() => {
            PathBuf::from(expand_path(&config.ingest.import_path))
        }
        None => bail!("no import file: pass --file or set ingest.import_path"),
    };
    let source = JsonFileSource::new(path);
    let report =
        leadflow_scheduler::ingest(store, &source, config, Local::now().naive_local()).await?;
    tracing::info!("📥 Ingest: {report:?}");
    Ok(())
}

async fn run_enrich(store: &SqliteStore, config: &LeadflowConfig) -> Result<()> {
    if config.enrichment.api_key.is_empty() {
        bail!("enrichment.api_key is not set");
    }
    let client = BatchDataClient::new(config.enrichment.clone());
    let report = leadflow_scheduler::enrich(store, &client, &config.enrichment).await?;
    tracing::info!("🔍 Enrich: {report:?}");
    Ok(())
}

fn run_queue(store: &SqliteStore, config: &LeadflowConfig) -> Result<()> {
    let report = leadflow_scheduler::build_queue(
        store,
        config,
        &mut ThreadRandom,
        Local::now().naive_local(),
    )?;
    tracing::info!("📬 Queue: {report:?}");
    Ok(())
}

async fn run_dispatch(store: &SqliteStore, config: &LeadflowConfig) -> Result<()> {
    config.validate_for_dispatch()?;
    let gateway = HttpSmsGateway::new(config.sms.clone())?;
    let mut scheduler = DispatchScheduler::new(
        Arc::new(store.clone()),
        Arc::new(gateway),
        config.dispatch.clone(),
    );
    let report = scheduler.tick().await?;
    tracing::info!("📤 Dispatch: {report:?}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "leadflow=debug" } else { "leadflow=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let path = config_path(&cli);
    let open = || -> Result<(LeadflowConfig, SqliteStore)> {
        let config = load_config(&path)?;
        let store = open_store(&config)?;
        Ok((config, store))
    };

    match cli.command {
        Command::Init => init(&path)?,
        Command::Ingest { file } => {
            let (config, store) = open()?;
            run_ingest(&store, &config, file).await?;
        }
        Command::Enrich => {
            let (config, store) = open()?;
            run_enrich(&store, &config).await?;
        }
        Command::Queue => {
            let (config, store) = open()?;
            run_queue(&store, &config)?;
        }
        Command::Dispatch => {
            let (config, store) = open()?;
            run_dispatch(&store, &config).await?;
        }
        Command::Run => {
            let (config, store) = open()?;
            if !config.ingest.import_path.is_empty() {
                // A failed import is retried on the next run; keep going.
                if let Err(e) = run_ingest(&store, &config, None).await {
                    tracing::error!("❌ Ingest failed: {e:#}");
                }
            }
            if config.enrichment.api_key.is_empty() {
                tracing::warn!("⚠️ enrichment.api_key not set, skipping enrichment");
            } else {
                run_enrich(&store, &config).await?;
            }
            run_queue(&store, &config)?;
            run_dispatch(&store, &config).await?;
        }
    }
    Ok(())
}
