//! # Request Tracker CLI
//!
//! Classify a single LIMS status, evaluate a request against a JSON record
//! fixture, or print the resolved configuration.

use anyhow::Context;
use clap::{Parser, Subcommand};
use request_tracker::config::ConfigManager;
use request_tracker::logging::init_structured_logging_with;
use request_tracker::record_store::InMemoryRecordStore;
use request_tracker::request::RequestTracker;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::error;

#[derive(Parser)]
#[command(name = "request-tracker")]
#[command(about = "Track laboratory request progress across workflow stages")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration directory path (default: config)
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment to load (development, test, production)
    #[arg(short, long, global = true)]
    environment: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Classify one status string
    Classify {
        status: String,

        #[arg(long, default_value = "")]
        sample_type: String,
    },

    /// Evaluate a request against a JSON record fixture
    Track {
        /// Fixture file: {"records": [...]}
        #[arg(short, long)]
        fixture: PathBuf,

        request_id: String,
    },

    /// Print the resolved configuration as YAML
    Config,
}

fn load_config(cli: &Cli) -> anyhow::Result<Arc<ConfigManager>> {
    let environment = cli
        .environment
        .clone()
        .unwrap_or_else(ConfigManager::detect_environment);
    let config_dir = cli.config_dir.clone();
    let searched = config_dir.clone().unwrap_or_else(|| PathBuf::from("config"));

    // A missing config directory falls back to built-in defaults
    if searched.is_dir() {
        ConfigManager::load_from_directory_with_env(config_dir, &environment)
            .with_context(|| format!("loading configuration from {}", searched.display()))
    } else {
        ConfigManager::from_config_with_env(Default::default(), &environment)
            .context("building default configuration")
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    init_structured_logging_with(&config.config().logging, config.environment());

    match cli.command {
        Commands::Classify {
            status,
            sample_type,
        } => {
            let classification = config.classifier().classify(&status, &sample_type);
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::Track {
            fixture,
            request_id,
        } => {
            let json = std::fs::read_to_string(&fixture)
                .with_context(|| format!("reading fixture {}", fixture.display()))?;
            let store = InMemoryRecordStore::from_json(&json)
                .with_context(|| format!("parsing fixture {}", fixture.display()))?;
            let tracker = RequestTracker::new(Arc::new(store), Arc::clone(&config));
            let result = tracker.compute_request_tracking(&request_id).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::Config => {
            println!("# environment: {}", config.environment());
            print!("{}", serde_yaml::to_string(config.config())?);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "request-tracker failed");
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
