use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use wxingest_core::config::{Config, WarnLevel};

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Print the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }

    println!("Orchestration: {}", config.orchestration.name);
    println!("Default base:  {}", config.orchestration.base);
    println!();

    let tasks = config
        .orchestration
        .tasks
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let command = config
                .tasks
                .get(name)
                .map(|t| {
                    std::iter::once(t.command.as_str())
                        .chain(t.args.iter().map(String::as_str))
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_else(|| "(not configured)".to_string());
            vec![(i + 1).to_string(), name.clone(), command]
        })
        .collect();
    print_table(&["#", "TASK", "COMMAND"], tasks);
    println!();

    let logs = config
        .logs
        .iter()
        .map(|(base, layout)| {
            vec![
                base.clone(),
                layout.folder.display().to_string(),
                layout.filename.clone(),
            ]
        })
        .collect();
    print_table(&["BASE", "FOLDER", "FILENAME"], logs);
    Ok(())
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        print_json(&serde_json::json!({ "warnings": warnings }))?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
