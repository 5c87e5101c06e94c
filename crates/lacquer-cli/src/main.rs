// Copyright (c) 2025 Lacquer Maintainers
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lacquer workflow CLI: a thin demonstration binary over `lacquer-core`'s
//! engine. `validate` parses a workflow file and reports its shape;
//! `run` executes it end to end against whichever providers have
//! credentials in the environment.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use lacquer_core::{OrchestratorConfig, Value, Workflow, WorkflowExecutor};
use lacquer_providers::{AnthropicProvider, LLMProvider, LocalProvider, OpenAIProvider};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "lacquer")]
#[command(version, about = "Lacquer workflow engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a workflow file and report its shape.
    Validate {
        #[arg(value_name = "FILE")]
        file: String,
    },

    /// Execute a workflow file.
    Run {
        #[arg(value_name = "FILE")]
        file: String,

        /// Input JSON string, or a path to a JSON file.
        #[arg(short, long)]
        input: Option<String>,

        /// Skip vendor providers entirely and run against `LocalProvider`'s
        /// scripted echo responses instead.
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| format!("lacquer={log_level}").into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Validate { file } => validate_workflow(&file),
        Commands::Run { file, input, offline } => run_workflow(&file, input.as_deref(), offline).await,
    };

    if let Err(e) = result {
        error!("{e}");
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn load_workflow(file_path: &str) -> Result<Workflow> {
    let content = fs::read_to_string(file_path).with_context(|| format!("failed to read workflow file: {file_path}"))?;
    serde_yaml::from_str(&content).with_context(|| format!("failed to parse workflow YAML: {file_path}"))
}

fn validate_workflow(file_path: &str) -> Result<()> {
    info!(file = file_path, "validating workflow");
    println!("{} {}", "Validating workflow:".cyan().bold(), file_path);

    let workflow = load_workflow(file_path)?;

    println!("{}", "\u{2713} Workflow is valid".green().bold());
    if let Some(name) = &workflow.metadata.name {
        println!("  Name: {name}");
    }
    println!("  Version: {}", workflow.version);
    println!("  Agents: {}", workflow.agents.len());
    println!("  Steps: {}", workflow.workflow.steps.len());

    Ok(())
}

async fn run_workflow(file_path: &str, input: Option<&str>, offline: bool) -> Result<()> {
    info!(file = file_path, "running workflow");
    println!("{} {}", "Running workflow:".cyan().bold(), file_path);

    let workflow = load_workflow(file_path)?;
    let inputs = match input {
        Some(raw) => parse_inputs(raw)?,
        None => BTreeMap::new(),
    };

    let mut providers: Vec<(&str, Arc<dyn LLMProvider>)> = Vec::new();
    if offline {
        info!("offline mode requested, registering local provider only");
        providers.push(("local", Arc::new(LocalProvider::echo())));
    } else {
        if let Ok(anthropic) = AnthropicProvider::from_env() {
            info!("registered anthropic provider");
            providers.push(("anthropic", Arc::new(anthropic)));
        }
        if let Ok(openai) = OpenAIProvider::from_env() {
            info!("registered openai provider");
            providers.push(("openai", Arc::new(openai)));
        }

        if providers.is_empty() {
            info!("no API key configured, falling back to local provider");
            providers.push(("local", Arc::new(LocalProvider::echo())));
        }
    }

    let (mut executor, receiver) = WorkflowExecutor::new(workflow, OrchestratorConfig::from_env());
    for (name, provider) in providers {
        executor = executor.with_provider(name, provider);
    }

    use std::io::IsTerminal;
    let sink_handle = if std::io::stdout().is_terminal() {
        tokio::spawn(lacquer_core::events::TerminalSink::new().run(receiver))
    } else {
        tokio::spawn(lacquer_core::events::run_plain_log_sink(receiver))
    };

    let result = executor.execute(inputs).await.with_context(|| "workflow execution failed")?;
    let _ = sink_handle.await;

    if result.status == "completed" {
        println!("{}", "\u{2713} Workflow completed successfully".green().bold());
    } else {
        println!("{}", "\u{2717} Workflow failed".red().bold());
    }

    println!("\n{}", "Result:".cyan().bold());
    println!("{}", serde_json::to_string_pretty(&result).unwrap_or_else(|_| format!("{result:?}")));

    if result.status != "completed" {
        anyhow::bail!(result.error.unwrap_or_else(|| "workflow failed".to_string()));
    }

    Ok(())
}

fn parse_inputs(raw: &str) -> Result<BTreeMap<String, Value>> {
    let content = if Path::new(raw).exists() {
        fs::read_to_string(raw).with_context(|| format!("failed to read input file: {raw}"))?
    } else {
        raw.to_string()
    };
    let json: serde_json::Value = serde_json::from_str(&content).with_context(|| "failed to parse input JSON")?;
    let value: Value = json.into();
    Ok(value.as_map().cloned().unwrap_or_default())
}
