//! Database maintenance commands: `flowie init-db` and `flowie seed-task-types`.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use flowie::config::{CliOverrides, FlowieConfig};
use flowie::db::DEFAULT_TASK_TYPES;
use flowie::server::open_database;

pub fn cmd_init_db(config_path: &Path, overrides: &CliOverrides) -> Result<()> {
    let config = FlowieConfig::resolve(config_path, overrides)?;
    open_database(&config.database.path)?;
    println!(
        "Flowie database initialized at {}",
        config.database.path.display()
    );
    Ok(())
}

pub fn cmd_seed_task_types(config_path: &Path, overrides: &CliOverrides) -> Result<()> {
    let config = FlowieConfig::resolve(config_path, overrides)?;
    let db = open_database(&config.database.path)?;
    let added = db
        .seed_task_types(DEFAULT_TASK_TYPES, Utc::now())
        .context("Failed to seed task types")?;

    if added == 0 {
        println!("Default task types already present.");
    } else {
        println!("Added {} default task type(s).", added);
    }
    Ok(())
}
