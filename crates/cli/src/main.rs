//! Guardian CLI — the main entry point.
//!
//! Commands:
//! - `plan`    — Compile a prompt into a policy-checked plan
//! - `run`     — Compile and execute a prompt against the platform services
//! - `policy`  — Show the active guardrails
//! - `redact`  — Remove personal data from text
//! - `memory`  — Inspect, export or import the agent's history
//! - `config`  — Print the default configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "guardian",
    about = "Guardian — policy-guarded agent orchestration",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a prompt into a plan without executing it
    Plan {
        prompt: String,

        /// Context entries as key=value (repeatable)
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,
    },

    /// Compile and execute a prompt
    Run {
        prompt: String,

        /// Context entries as key=value (repeatable)
        #[arg(short, long = "context", value_name = "KEY=VALUE")]
        context: Vec<String>,

        /// Keep executing after a failed step
        #[arg(long)]
        debug: bool,

        /// Execute steps that require approval
        #[arg(long)]
        approve: bool,

        /// Abort the run after this many seconds
        #[arg(long, value_name = "SECS")]
        deadline_secs: Option<u64>,
    },

    /// Show the active policy rules
    Policy,

    /// Redact personal data from text
    Redact { text: String },

    /// Memory management
    Memory {
        #[command(subcommand)]
        action: MemoryCommand,
    },

    /// Print the default configuration as TOML
    Config,
}

#[derive(Subcommand)]
enum MemoryCommand {
    /// Show memory statistics
    Stats,

    /// Export history to a JSON file
    Export { file: std::path::PathBuf },

    /// Import history from a JSON file
    Import { file: std::path::PathBuf },
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "debug" } else { "info" };
    let builder = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Plan { prompt, context } => commands::plan::plan(prompt, &context).await?,
        Commands::Run {
            prompt,
            context,
            debug,
            approve,
            deadline_secs,
        } => {
            let flags = commands::plan::RunFlags {
                debug,
                approve,
                deadline_secs,
            };
            commands::plan::run(prompt, &context, flags).await?
        }
        Commands::Policy => commands::policy::summary()?,
        Commands::Redact { text } => commands::policy::redact(&text)?,
        Commands::Memory { action } => match action {
            MemoryCommand::Stats => commands::memory::stats().await?,
            MemoryCommand::Export { file } => commands::memory::export(&file).await?,
            MemoryCommand::Import { file } => commands::memory::import(&file).await?,
        },
        Commands::Config => commands::config_cmd::print_default(),
    }

    Ok(())
}
