//! Configuration commands.

use std::path::PathBuf;

use clap::Subcommand;
use console::style;

use br_core::config::{AppConfig, ConfigHandle};
use br_core::error::{BrError, BrResult};

use crate::OutputFormat;

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration.
    Show,
    /// Show the default configuration file path.
    Path,
    /// Write the effective configuration to a file.
    Init {
        /// Destination (defaults to the standard config path).
        path: Option<PathBuf>,
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub async fn run(config: ConfigHandle, action: ConfigAction, format: OutputFormat) -> BrResult<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config.read().await;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::to_value(&*cfg)?),
                OutputFormat::Text => {
                    let text = toml::to_string_pretty(&*cfg)
                        .map_err(|e| BrError::Config(format!("failed to serialize config: {e}")))?;
                    println!("{text}");
                }
            }
        }
        ConfigAction::Path => {
            let path = AppConfig::default_config_path()?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({
                    "path": path.display().to_string(),
                    "exists": path.exists(),
                })),
                OutputFormat::Text => println!("{}", path.display()),
            }
        }
        ConfigAction::Init { path, force } => {
            let path = match path {
                Some(path) => path,
                None => AppConfig::default_config_path()?,
            };
            if path.exists() && !force {
                return Err(BrError::Config(format!(
                    "{} already exists (use --force to overwrite)",
                    path.display()
                )));
            }
            config.read().await.save_to_file(&path)?;
            match format {
                OutputFormat::Json => super::print_json(&serde_json::json!({ "written": path.display().to_string() })),
                OutputFormat::Text => println!("{} wrote {}", style("✓").green().bold(), path.display()),
            }
        }
    }
    Ok(())
}
