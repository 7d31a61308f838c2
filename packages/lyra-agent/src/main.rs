//! Process entry point: loads configuration, wires every collaborator,
//! and either runs the scheduler as a long-lived daemon or drives one
//! tool call and exits — the same `ToolServer` surface either way
//! (spec section 6's tool table; spec section 10's CLI note).
//!
//! Exit codes (spec section 6): 0 normal, 64 configuration error, 65
//! schema/init failure, 70 internal error.

mod collaborators;
mod config;
mod handlers;
mod llm_client;

use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use lyra_core::StopMode;
use lyra_tools::ToolServer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use uuid::Uuid;

use crate::collaborators::Collaborators;
use crate::config::AgentConfig;

#[derive(Parser)]
#[command(name = "lyra-agent")]
#[command(about = "Local-first autonomous research agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Runs the scheduler daemon: recovers queued jobs, then dispatches
    /// forever until interrupted.
    Serve,
    /// Creates a new research task.
    CreateTask {
        hypothesis: String,
        #[arg(long, default_value_t = 200)]
        budget_pages: u32,
        #[arg(long)]
        idempotency_key: Option<String>,
    },
    /// Queues one or more search queries against an existing task.
    QueueSearches {
        task_id: Uuid,
        queries: Vec<String>,
    },
    /// Reports task progress, optionally long-polling for a change.
    Status {
        task_id: Uuid,
        #[arg(long)]
        wait_seconds: Option<u64>,
        #[arg(long)]
        since: Option<String>,
    },
    /// Stops a task.
    StopTask {
        task_id: Uuid,
        #[arg(value_enum, default_value = "graceful")]
        mode: CliStopMode,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliStopMode {
    Graceful,
    Immediate,
    Full,
}

impl From<CliStopMode> for StopMode {
    fn from(mode: CliStopMode) -> Self {
        match mode {
            CliStopMode::Graceful => StopMode::Graceful,
            CliStopMode::Immediate => StopMode::Immediate,
            CliStopMode::Full => StopMode::Full,
        }
    }
}

const EXIT_CONFIG_ERROR: u8 = 64;
const EXIT_INIT_FAILURE: u8 = 65;
const EXIT_INTERNAL_ERROR: u8 = 70;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match AgentConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err:#}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let collaborators = match Collaborators::build(&config).await {
        Ok(collaborators) => Arc::new(collaborators),
        Err(err) => {
            tracing::error!(error = %err, "failed to initialize collaborators");
            return ExitCode::from(EXIT_INIT_FAILURE);
        }
    };

    handlers::register_all(&collaborators.scheduler, collaborators.clone());

    match run(cli.command, collaborators).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::from(EXIT_INTERNAL_ERROR)
        }
    }
}

async fn run(command: Command, collaborators: Arc<Collaborators>) -> anyhow::Result<()> {
    let tools = ToolServer::new(
        collaborators.store.clone(),
        collaborators.scheduler.clone(),
        collaborators.sql.clone(),
        collaborators.interventions.clone(),
        collaborators.overrides.clone(),
        "",
    );

    match command {
        Command::Serve => {
            let recovered = collaborators.scheduler.recover().await?;
            tracing::info!(recovered, "scheduler recovered queued jobs");
            let resolutions = collaborators.interventions.subscribe_resolutions();
            let scheduler = collaborators.scheduler.clone();
            let listener = tokio::spawn(scheduler.clone().run_resolution_listener(resolutions));
            let runner = tokio::spawn(scheduler.run());
            tokio::signal::ctrl_c().await?;
            tracing::info!("received shutdown signal");
            listener.abort();
            runner.abort();
            Ok(())
        }
        Command::CreateTask { hypothesis, budget_pages, idempotency_key } => {
            let response = tools
                .create_task(lyra_tools::types::CreateTaskRequest {
                    hypothesis,
                    config: lyra_tools::types::TaskConfig { budget_pages, priority_domains: Vec::new() },
                    idempotency_key,
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::QueueSearches { task_id, queries } => {
            let response = tools
                .queue_searches(lyra_tools::types::QueueSearchesRequest { task_id, queries, options: Default::default() })
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::Status { task_id, wait_seconds, since } => {
            let response = tools
                .get_status(lyra_tools::types::GetStatusRequest { task_id, wait_seconds, since })
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
        Command::StopTask { task_id, mode } => {
            let response = tools
                .stop_task(lyra_tools::types::StopTaskRequest { task_id, mode: mode.into() })
                .await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}
