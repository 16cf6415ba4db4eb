use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use flowie::config::{CliOverrides, DEFAULT_CONFIG_FILE};

mod cmd;

#[derive(Parser)]
#[command(name = "flowie")]
#[command(version, about = "Project and task management backend with calendar feeds")]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, global = true, env = "FLOWIE_CONFIG", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Port to listen on (overrides config and FLOWIE_PORT)
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// SQLite database file (overrides config and FLOWIE_DB_PATH)
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    /// Development mode: permissive CORS for a separately served frontend
    #[arg(long, global = true)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP server
    Serve,
    /// Create the database file and schema
    InitDb,
    /// View or validate configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
    /// Insert the default task types (Bug, Feature, Improvement) if missing
    SeedTaskTypes,
}

#[derive(Subcommand, Clone)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,
    /// Validate configuration and show any warnings
    Validate,
    /// Write a default flowie.toml
    Init,
}

impl Cli {
    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            port: self.port,
            db_path: self.db_path.clone(),
            dev: self.dev,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let overrides = cli.overrides();

    match cli.command {
        Commands::Serve => cmd::cmd_serve(&cli.config, &overrides).await?,
        Commands::InitDb => cmd::cmd_init_db(&cli.config, &overrides)?,
        Commands::Config { command } => cmd::cmd_config(&cli.config, &overrides, command)?,
        Commands::SeedTaskTypes => cmd::cmd_seed_task_types(&cli.config, &overrides)?,
    }

    Ok(())
}
