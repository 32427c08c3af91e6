use anyhow::Context;
use std::path::Path;
use wxingest_core::{config::Config, io, paths};

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing wxingest in: {}", root.display());

    let dir = paths::wxingest_dir(root);
    io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;

    if Config::write_default(root).context("failed to write config.yaml")? {
        println!("  created: {}", paths::CONFIG_FILE);
    } else {
        println!("  exists:  {}", paths::CONFIG_FILE);
    }
    let config = Config::load(root).context("failed to load config")?;

    for (base, layout) in &config.logs {
        let folder = root.join(&layout.folder);
        io::ensure_dir(&folder)
            .with_context(|| format!("failed to create log folder for {base}"))?;
        println!("  logs:    {} -> {}", base, layout.folder.display());
    }

    println!("\nwxingest initialized.");
    println!("Next: point each entry under `tasks:` in {} at a command, then `wxingest run`.", paths::CONFIG_FILE);
    Ok(())
}
