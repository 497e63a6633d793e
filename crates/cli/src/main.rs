//! Foreman CLI — the main entry point.
//!
//! Commands:
//! - `run`     — Run one agent against its model, with delegation
//! - `gc`      — Analyze and trim an agent's memory log
//! - `agents`  — List configured agents
//!
//! Exit codes: 0 success, 2 configuration failure, 3 caller/request
//! failure, 4 provider/operational failure.

use clap::{Parser, Subcommand};
use foreman_core::{Error, FailureClass};
use std::process::ExitCode;

mod commands;

#[derive(Parser)]
#[command(
    name = "foreman",
    about = "Foreman — run configured agents with sub-agent delegation",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an agent
    Run {
        /// Name of the agent to run
        agent: String,

        /// The task message (omit to read piped stdin)
        message: Option<String>,

        /// Emit a single-line JSON record instead of plain text
        #[arg(long)]
        json: bool,

        /// Print the resolved prompt, memory, and policy without calling any provider
        #[arg(long)]
        dry_run: bool,

        /// Bound the whole invocation, in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Analyze an agent's memory and trim it to the retention target
    Gc {
        /// Name of the agent (omit with --all)
        agent: Option<String>,

        /// Run for every memory-enabled agent
        #[arg(long)]
        all: bool,

        /// Print the analysis but never trim
        #[arg(long)]
        preview: bool,
    },

    /// List configured agents
    Agents,
}

fn exit_code_for(error: &Error) -> ExitCode {
    match error.class() {
        FailureClass::Config => ExitCode::from(2),
        FailureClass::Caller => ExitCode::from(3),
        FailureClass::Operational => ExitCode::from(4),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Run {
            agent,
            message,
            json,
            dry_run,
            timeout,
        } => commands::run::run(&agent, message, json, dry_run, timeout).await,
        Commands::Gc {
            agent,
            all,
            preview,
        } => commands::gc::run(agent.as_deref(), all, preview).await,
        Commands::Agents => commands::agents::run(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            exit_code_for(&e)
        }
    }
}
