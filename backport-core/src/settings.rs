use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::{Display, EnumString, VariantNames};

/// Persisted defaults for `backport` invocations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// A settings key as typed on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
#[strum(serialize_all = "kebab-case")]
pub enum SettingKey {
    Owner,
    Repo,
    SourceBranch,
    TargetBranch,
    TicketPattern,
    ApiUrl,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        serde_json::from_str(&data)
            .with_context(|| format!("Failed to parse settings in {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
            .with_context(|| format!("Failed to write settings to {}", path.display()))
    }

    fn slot(&mut self, key: SettingKey) -> &mut Option<String> {
        match key {
            SettingKey::Owner => &mut self.owner,
            SettingKey::Repo => &mut self.repo,
            SettingKey::SourceBranch => &mut self.source_branch,
            SettingKey::TargetBranch => &mut self.target_branch,
            SettingKey::TicketPattern => &mut self.ticket_pattern,
            SettingKey::ApiUrl => &mut self.api_url,
        }
    }

    pub fn get(&self, key: SettingKey) -> Option<&str> {
        match key {
            SettingKey::Owner => self.owner.as_deref(),
            SettingKey::Repo => self.repo.as_deref(),
            SettingKey::SourceBranch => self.source_branch.as_deref(),
            SettingKey::TargetBranch => self.target_branch.as_deref(),
            SettingKey::TicketPattern => self.ticket_pattern.as_deref(),
            SettingKey::ApiUrl => self.api_url.as_deref(),
        }
    }

    /// Set `key`; an empty value clears it
    pub fn set(&mut self, key: SettingKey, value: &str) -> Result<()> {
        let value = value.trim();
        if key == SettingKey::TicketPattern && !value.is_empty() {
            crate::ticket::TicketPattern::new(value)?;
        }
        if key == SettingKey::ApiUrl && !value.is_empty() && !value.starts_with("http") {
            bail!("API URL must start with http:// or https://");
        }

        *self.slot(key) = (!value.is_empty()).then(|| value.to_string());
        Ok(())
    }
}

/// Get the default settings path
pub fn get_settings_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Failed to get home directory")?;
    Ok(home.join(".config").join("backport").join("settings.json"))
}
