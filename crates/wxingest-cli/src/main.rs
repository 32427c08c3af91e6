mod cmd;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, state::StateSubcommand};
use std::path::PathBuf;
use wxingest_core::engine::FULL_INGESTION_MODE;

#[derive(Parser)]
#[command(
    name = "wxingest",
    about = "Checkpointed weather ingestion orchestrator: run task chains and inspect the state log",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .wxingest/)
    #[arg(long, global = true, env = "WXINGEST_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .wxingest/config.yaml and the log folders
    Init,

    /// Run the configured task chain once
    Run {
        /// Ingestion mode passed to every task (full or incremental)
        #[arg(long, default_value = FULL_INGESTION_MODE)]
        mode: String,

        /// Job id for the run (default: a fresh UUID)
        #[arg(long)]
        run_id: Option<String>,

        /// Base to run against (default: orchestration.base from config)
        #[arg(long)]
        base: Option<String>,
    },

    /// Query the state log
    State {
        #[command(subcommand)]
        subcommand: StateSubcommand,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Run { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    // stdout is reserved for command output (--json must stay parseable)
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(default_level.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let root = root::resolve_root(cli.root.as_deref());

    let result = match cli.command {
        Commands::Init => cmd::init::run(&root),
        Commands::Run { mode, run_id, base } => {
            cmd::run::run(&root, &mode, run_id, base.as_deref(), cli.json)
        }
        Commands::State { subcommand } => cmd::state::run(&root, subcommand, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
