use crate::output::{print_json, print_state};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use std::sync::Arc;
use wxingest_core::{
    checkpoint::PartitionedLog, clock::SystemClock, config::Config, state::OrchestratorState,
    store::LocalLogStore,
};

#[derive(Subcommand)]
pub enum StateSubcommand {
    /// Most recent checkpoint of a base
    Last {
        /// Base to query (default: orchestration.base from config)
        #[arg(long)]
        base: Option<String>,
    },

    /// Most recent checkpoint with an exact status, e.g. "task_prepare_ingestion COMPLETED"
    LastWithStatus {
        status: String,
        #[arg(long)]
        base: Option<String>,
    },

    /// Most recent checkpoint of one job
    Job {
        job_id: String,
        #[arg(long)]
        base: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: StateSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let log = PartitionedLog::new(
        LocalLogStore::new(root),
        config.logs.clone(),
        Arc::new(SystemClock),
    );
    let default_base = config.orchestration.base.as_str();

    let found = match &subcmd {
        StateSubcommand::Last { base } => log.latest(base.as_deref().unwrap_or(default_base)),
        StateSubcommand::LastWithStatus { status, base } => {
            log.latest_with_status(base.as_deref().unwrap_or(default_base), status)
        }
        StateSubcommand::Job { job_id, base } => {
            log.latest_for_job(base.as_deref().unwrap_or(default_base), job_id)
        }
    }
    .context("failed to query state log")?;

    show(found.as_ref(), json)
}

fn show(state: Option<&OrchestratorState>, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(&state);
    }
    match state {
        Some(state) => print_state(state),
        None => println!("no prior state"),
    }
    Ok(())
}
