//! Config command implementation.

use crate::cli::{ConfigAction, ConfigArgs};
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::output::Formatter;
use corroborate_engine::EngineConfig;

/// Execute the config command.
pub async fn execute_config(args: ConfigArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    match args.action {
        ConfigAction::Show { preset } => {
            let shown = match preset {
                Some(preset) => {
                    let engine = EngineConfig::preset(preset.name()).ok_or_else(|| {
                        CliError::InvalidInput(format!("Unknown preset: {}", preset.name()))
                    })?;
                    show_engine(&engine, formatter.format())?
                }
                None => show_config(config, formatter.format())?,
            };
            println!("{}", shown);
        }
        ConfigAction::Validate { path } => {
            match path {
                Some(path) => {
                    Config::from_file(&path)?;
                    println!(
                        "{}",
                        formatter.success(&format!("{} is valid", path.display()))
                    );
                }
                None => {
                    config.engine.validate()?;
                    println!("{}", formatter.success("Configuration is valid"));
                }
            }
        }
    }

    Ok(())
}

fn show_engine(engine: &EngineConfig, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(engine)?),
        _ => Ok(engine.to_toml()?),
    }
}

fn show_config(config: &Config, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(config)?),
        _ => config.to_toml(),
    }
}
