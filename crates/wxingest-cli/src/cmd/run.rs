use crate::output::{print_items, print_json};
use anyhow::Context;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use wxingest_core::{
    checkpoint::PartitionedLog,
    clock::{Clock, SystemClock},
    config::{Config, WarnLevel},
    engine::{OrchestrationDef, OrchestrationEngine, Trigger},
    item::{Posts, ProcessingItem},
    runner::CommandTaskRunner,
    store::LocalLogStore,
};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunOutput<'a> {
    job_id: &'a str,
    base: &'a str,
    mode: &'a str,
    status: &'a str,
    posts: &'a Posts,
    items: &'a [ProcessingItem],
}

pub fn run(
    root: &Path,
    mode: &str,
    run_id: Option<String>,
    base: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let errors: Vec<String> = config
        .validate()
        .into_iter()
        .filter(|w| w.level == WarnLevel::Error)
        .map(|w| w.message)
        .collect();
    if !errors.is_empty() {
        anyhow::bail!(
            "config has errors ({}); run 'wxingest config validate'",
            errors.join("; ")
        );
    }

    let def = OrchestrationDef::from_config(&config, base)?;
    let job_id = run_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let trigger = Trigger::new(mode, job_id.clone()).with_request_id(job_id.clone());

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let sink = PartitionedLog::new(LocalLogStore::new(root), config.logs.clone(), clock.clone());
    let runner = CommandTaskRunner::new(root, config.tasks.clone());
    let engine = OrchestrationEngine::new(&runner, &sink, clock);

    let outcome = engine
        .run(&def, trigger)
        .with_context(|| format!("run {job_id} failed"))?;

    if json {
        let state = &outcome.final_state;
        return print_json(&RunOutput {
            job_id: &state.job_id,
            base: &state.base,
            mode: &state.mode,
            status: &state.status,
            posts: &state.posts,
            items: &outcome.items,
        });
    }

    println!("Job {} ({} on {})", job_id, mode, def.base);
    print_items(&outcome.items);
    println!("\n{}", outcome.final_state.status);
    Ok(())
}
