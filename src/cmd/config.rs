//! Configuration view and validation commands: `flowie config`.

use std::path::Path;

use anyhow::Result;

use flowie::config::{CliOverrides, FlowieConfig};

use super::super::ConfigCommands;

const MASKED: &str = "********";

pub fn cmd_config(
    config_path: &Path,
    overrides: &CliOverrides,
    command: Option<ConfigCommands>,
) -> Result<()> {
    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("Flowie Configuration");
            println!("====================");
            println!();
            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!(
                    "No config file at {}, using defaults.",
                    config_path.display()
                );
            }
            println!("Effective values (with env/CLI overrides):");
            println!();

            let mut config = FlowieConfig::resolve(config_path, overrides)?;
            config.auth.jwt_secret = MASKED.to_string();
            let rendered = toml::to_string_pretty(&config)?;
            println!("{}", rendered);
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = FlowieConfig::resolve(config_path, overrides)?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("{} already exists.", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            FlowieConfig::default().save(config_path)?;
            println!("Created {}", config_path.display());
            println!();
            println!("Set a real [auth] jwt_secret (or FLOWIE_JWT_SECRET) before deploying.");
            println!();
        }
    }

    Ok(())
}
