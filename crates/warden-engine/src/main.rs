//! warden - interference mitigation toolbox
//!
//! Classifies URLs and errors, simulates recovery incidents and prints the
//! persisted diagnostics report.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use warden_classifier::{classify_error, ErrorReport};
use warden_engine::{
    simulate, SimulatedFailure, SimulationOptions, SimulationOutcome, WardenConfig,
};
use warden_store::{BypassController, DiagnosticStore, FileStorage, Location};

/// warden - interference mitigation toolbox
#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to a TOML configuration file; defaults apply when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (trace, debug, info, warn, error or an `EnvFilter` directive)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check a script URL against the block patterns
    ClassifyUrl {
        /// Script URL
        url: String,
    },

    /// Classify an error as interference or an application error
    ClassifyError {
        /// Error message
        message: String,

        /// Error name
        #[arg(long, default_value = "Error")]
        name: String,

        /// Stack trace text
        #[arg(long)]
        stack: Option<String>,
    },

    /// Drive a recovery incident across simulated page loads
    Simulate {
        /// File backing the persisted store
        #[arg(long, default_value = "warden-storage.json")]
        storage: PathBuf,

        /// First URL loaded
        #[arg(long, default_value = "/")]
        url: String,

        /// Failing renders before one succeeds; fails forever when omitted
        #[arg(long)]
        failures: Option<u32>,

        /// Kind of failure raised
        #[arg(long, value_enum, default_value_t = FailureArg::Interference)]
        error: FailureArg,

        /// Override the retry delay, in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the diagnostics report persisted in a storage file
    Report {
        /// File backing the persisted store
        #[arg(long, default_value = "warden-storage.json")]
        storage: PathBuf,

        /// URL the bypass state is evaluated for
        #[arg(long, default_value = "/")]
        url: String,

        /// Print as JSON
        #[arg(long)]
        json: bool,

        /// Clear Warden diagnostics after printing
        #[arg(long)]
        clear: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FailureArg {
    Interference,
    Generic,
}

impl From<FailureArg> for SimulatedFailure {
    fn from(arg: FailureArg) -> Self {
        match arg {
            FailureArg::Interference => Self::Interference,
            FailureArg::Generic => Self::Generic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => WardenConfig::load(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => WardenConfig::default(),
    };
    if let Some(level) = &cli.log_level {
        config.logging.filter.clone_from(level);
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    warden_engine::logging::init(&config.logging.filter, config.logging.json);

    match cli.command {
        Commands::ClassifyUrl { url } => {
            let verdict = config.pattern_set().classify_url(&url);
            match verdict.matched_pattern {
                Some(pattern) if verdict.blocked => println!("blocked (pattern: {pattern})"),
                _ => println!("allowed"),
            }
        }
        Commands::ClassifyError {
            message,
            name,
            stack,
        } => {
            let mut error = ErrorReport::new(name, message);
            if let Some(stack) = stack {
                error = error.with_stack(stack);
            }
            let verdict = classify_error(&error);
            if verdict.is_interference {
                println!("interference ({})", verdict.signatures.join(", "));
            } else {
                println!("generic");
            }
        }
        Commands::Simulate {
            storage,
            url,
            failures,
            error,
            delay_ms,
            json,
        } => {
            if let Some(delay) = delay_ms {
                config.recovery.retry_delay_ms = delay;
            }
            let options = SimulationOptions {
                start_url: url,
                failures,
                failure: error.into(),
                ..SimulationOptions::default()
            };
            let report = simulate(config, Arc::new(FileStorage::new(storage)), options)
                .await
                .context("simulation failed")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.generate_text());
            }
            if report.outcome == SimulationOutcome::GaveUp {
                std::process::exit(2);
            }
        }
        Commands::Report {
            storage,
            url,
            json,
            clear,
        } => {
            let store = Arc::new(
                DiagnosticStore::new(Arc::new(FileStorage::new(storage)))
                    .with_prefix(config.storage.prefix.clone())
                    .with_max_blocked_events(config.storage.max_blocked_events),
            );
            let bypass = BypassController::load(store.clone(), Location::parse(&url))
                .with_query_param(config.interception.bypass_query_param.clone());
            let report = store.report(bypass.is_active());
            if json {
                println!("{}", report.to_json_pretty());
            } else {
                print!("{}", report.generate_text());
            }
            if clear {
                let removed = store.clear_diagnostics();
                eprintln!("cleared {removed} diagnostic keys");
            }
        }
    }

    Ok(())
}
