pub mod config;
pub mod fleet;
pub mod init;
pub mod report;
pub mod scan;
pub mod stock;

use anyhow::Context;
use depot_core::config::Config;
use depot_core::store::RedbStore;
use std::path::Path;
use std::sync::Arc;

/// Loaded config plus an open store, shared by every data command.
pub struct Depot {
    pub config: Config,
    pub store: Arc<RedbStore>,
}

pub fn open(root: &Path) -> anyhow::Result<Depot> {
    let config = Config::load(root).context("failed to load .depot/config.yaml")?;
    let db_path = config.database_path(root);
    let store = RedbStore::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    Ok(Depot {
        config,
        store: Arc::new(store),
    })
}
