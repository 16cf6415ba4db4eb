//! HTTP server command: `flowie serve`.

use std::path::Path;

use anyhow::{Context, Result};

use flowie::config::{CliOverrides, FlowieConfig};

pub async fn cmd_serve(config_path: &Path, overrides: &CliOverrides) -> Result<()> {
    let config = FlowieConfig::resolve(config_path, overrides)
        .with_context(|| format!("Failed to load configuration from {}", config_path.display()))?;
    let _log_guard = flowie::logging::init(&config.logging)?;

    tracing::info!(
        config = %config_path.display(),
        database = %config.database.path.display(),
        "starting Flowie"
    );
    flowie::server::start_server(config).await
}
