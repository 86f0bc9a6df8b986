//! CLI for interactive pod triage
//!
//! Run `triage --help` for usage information.

// CLI binaries legitimately need println! for user output
#![allow(clippy::disallowed_macros)]

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Select};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use triage::{
    ActionDispatcher, ClusterQuery, DialoguerPicker, FailingPodRecord, FailureScanner,
    KubeCluster, OpenAiOracle, ProcessRunner, SessionController, TerminalInput, TriageConfig,
};

#[derive(Parser)]
#[command(name = "triage")]
#[command(about = "Diagnose not-ready Kubernetes pods with an AI reasoning loop")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON configuration file
    #[arg(long, env = "TRIAGE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Reasoning model name
    #[arg(long, env = "TRIAGE_MODEL", global = true)]
    model: Option<String>,

    /// Chat-completions endpoint
    #[arg(long, env = "TRIAGE_API_BASE_URL", global = true)]
    api_base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Args, Clone, Default)]
struct ScopeArgs {
    /// Namespace to scan
    #[arg(short, long, conflicts_with = "all_namespaces")]
    namespace: Option<String>,

    /// Scan every namespace without prompting
    #[arg(short = 'A', long)]
    all_namespaces: bool,
}

#[derive(Clone, Copy, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Pick a failing pod and debug it interactively (default)
    Debug {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Log lines fetched per LOGS action
        #[arg(long)]
        tail: Option<u32>,
    },

    /// List failing pods and exit
    Scan {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Output format: text, json
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "triage=debug" } else { "triage=warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config =
        TriageConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(model) = cli.model {
        config.model = model;
    }
    if let Some(url) = cli.api_base_url {
        config.api_base_url = url;
    }

    let command = cli.command.unwrap_or(Commands::Debug {
        scope: ScopeArgs::default(),
        tail: None,
    });

    match command {
        Commands::Debug { scope, tail } => {
            if let Some(tail) = tail {
                config.log_tail_lines = tail.max(1);
            }
            run_debug(config, &scope).await
        }
        Commands::Scan { scope, format } => run_scan(&scope, format).await,
    }
}

async fn run_debug(config: TriageConfig, scope: &ScopeArgs) -> Result<()> {
    // Checked before any cluster access so a missing key fails fast
    let oracle = OpenAiOracle::from_config(&config).context("Reasoning model is not configured")?;

    let cluster = Arc::new(
        KubeCluster::try_default()
            .await
            .context("Failed to connect to Kubernetes")?,
    );
    let namespace = choose_namespace(cluster.as_ref(), scope).await?;

    let scanner = FailureScanner::new(cluster.clone());
    let failing = scanner
        .scan(namespace.as_deref())
        .await
        .context("Failed to list pods")?;

    if failing.is_empty() {
        println!("{}", "✅ No failing pods detected.".green());
        return Ok(());
    }

    println!("\n{}", "🚨 Failing pods detected:".red().bold());
    print_records(&failing);

    let items: Vec<String> = failing.iter().map(ToString::to_string).collect();
    let initial = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a pod to debug")
        .default(0)
        .items(&items)
        .interact()
        .context("Pod selection cancelled")?;

    let dispatcher = ActionDispatcher::new(
        Arc::new(ProcessRunner),
        cluster,
        Arc::new(DialoguerPicker),
        &config,
    );
    let mut input = TerminalInput::new(config.switch_key);
    let mut session = SessionController::new(failing, initial, Arc::new(oracle), dispatcher, config)?;
    session.run(&mut input).await?;
    Ok(())
}

async fn run_scan(scope: &ScopeArgs, format: OutputFormat) -> Result<()> {
    let cluster = Arc::new(
        KubeCluster::try_default()
            .await
            .context("Failed to connect to Kubernetes")?,
    );
    let namespace = if scope.all_namespaces {
        None
    } else {
        scope.namespace.clone()
    };

    let failing = FailureScanner::new(cluster)
        .scan(namespace.as_deref())
        .await
        .context("Failed to list pods")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&failing)?),
        OutputFormat::Text if failing.is_empty() => {
            println!("{}", "✅ No failing pods detected.".green());
        }
        OutputFormat::Text => print_records(&failing),
    }
    Ok(())
}

/// Namespace scope from flags, or from a prompt when neither flag is given.
/// `None` means all namespaces.
async fn choose_namespace(cluster: &dyn ClusterQuery, scope: &ScopeArgs) -> Result<Option<String>> {
    if let Some(namespace) = &scope.namespace {
        return Ok(Some(namespace.clone()));
    }
    if scope.all_namespaces {
        return Ok(None);
    }

    let namespaces = match cluster.list_namespaces().await {
        Ok(namespaces) if !namespaces.is_empty() => namespaces,
        Ok(_) => return Ok(None),
        Err(e) => {
            warn!(error = %e, "Could not list namespaces, scanning all");
            return Ok(None);
        }
    };

    let mut items = vec!["All namespaces".to_string()];
    items.extend(namespaces.iter().cloned());
    let choice = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select a namespace")
        .default(0)
        .items(&items)
        .interact()
        .context("Namespace selection cancelled")?;

    Ok(choice.checked_sub(1).map(|index| namespaces[index].clone()))
}

fn print_records(records: &[FailingPodRecord]) {
    for (i, record) in records.iter().enumerate() {
        println!("{}. {record}", i + 1);
    }
}
