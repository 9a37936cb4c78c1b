use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Connection settings for the remote work-tracking service, held for the
/// whole session. Loaded once at startup and replaced wholesale on save.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub services_url: String,
    #[serde(default)]
    pub project: String,
    #[serde(default)]
    pub team: String,
    #[serde(default)]
    pub pat: String,
    /// When false (the default), a user story without tasks gets a synthetic
    /// task leaf so time can still be captured against the story.
    #[serde(default)]
    pub allow_entry_without_task: bool,
}

impl Configuration {
    pub fn is_valid(&self) -> bool {
        !self.services_url.is_empty()
            && !self.project.is_empty()
            && !self.team.is_empty()
            && !self.pat.is_empty()
    }
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sprintlog")
}

pub fn load_config() -> Result<Configuration> {
    let path = config_path();
    if !path.exists() {
        return Ok(Configuration::default());
    }
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    let config: Configuration =
        toml::from_str(&contents).with_context(|| "Failed to parse config.toml")?;
    Ok(config)
}

pub fn save_config(config: &Configuration) -> Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let contents = toml::to_string_pretty(config).context("Failed to serialize configuration")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    Ok(())
}
