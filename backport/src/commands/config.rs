use anyhow::Result;
use backport_core::{SettingKey, Settings};
use clap::Subcommand;
use std::path::Path;
use strum::VariantNames;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show saved defaults
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a default (owner, repo, source-branch, target-branch, ticket-pattern, api-url)
    Set { key: SettingKey, value: String },
    /// Remove a saved default
    Unset { key: SettingKey },
    /// Print the settings file location
    Path,
}

pub fn handle_config_command(command: ConfigCommands, settings_path: &Path) -> Result<()> {
    match command {
        ConfigCommands::Show { json } => {
            let settings = Settings::load(settings_path)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                for name in SettingKey::VARIANTS {
                    let key: SettingKey = name.parse()?;
                    println!("{name:<15} {}", settings.get(key).unwrap_or("(not set)"));
                }
            }
            Ok(())
        }
        ConfigCommands::Set { key, value } => {
            let mut settings = Settings::load(settings_path)?;
            settings.set(key, &value)?;
            settings.save(settings_path)?;
            eprintln!("Saved {key} to {}", settings_path.display());
            Ok(())
        }
        ConfigCommands::Unset { key } => {
            let mut settings = Settings::load(settings_path)?;
            settings.set(key, "")?;
            settings.save(settings_path)?;
            eprintln!("Removed {key}");
            Ok(())
        }
        ConfigCommands::Path => {
            println!("{}", settings_path.display());
            Ok(())
        }
    }
}
