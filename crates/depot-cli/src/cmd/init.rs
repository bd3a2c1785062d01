use anyhow::Context;
use depot_core::{config::Config, io, paths, store::RedbStore};
use std::path::Path;

use crate::output::print_json;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let depot_dir = paths::depot_dir(root);
    std::fs::create_dir_all(&depot_dir)
        .with_context(|| format!("failed to create {}", depot_dir.display()))?;

    let config_path = paths::config_path(root);
    let default = Config::default()
        .to_yaml()
        .context("failed to serialize default config")?;
    let created = io::write_if_missing(&config_path, default.as_bytes())
        .context("failed to write config")?;

    let config = Config::load(root)?;
    let db_path = config.database_path(root);
    RedbStore::open(&db_path)
        .with_context(|| format!("failed to create database {}", db_path.display()))?;

    if json {
        print_json(&serde_json::json!({
            "root": root,
            "config_created": created,
            "database": db_path,
        }))?;
    } else if created {
        println!("Initialized depot in {}", depot_dir.display());
    } else {
        println!("Depot already initialized in {}", depot_dir.display());
    }
    Ok(())
}
