use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::model::project::{OwnerType, ProjectRef};
use crate::providers::github::DEFAULT_API_URL;
use crate::sync::orchestrator::SyncOptions;
use crate::sync::paginate::MAX_PAGE_SIZE;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub github: GitHubConfig,
    pub project: ProjectConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: String,
    pub api_url: String,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_url: DEFAULT_API_URL.to_string(),
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    pub owner: Option<String>,
    pub number: Option<u64>,
    pub owner_type: OwnerType,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub page_size: u32,
    pub max_in_flight: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        let options = SyncOptions::default();
        Self {
            page_size: options.page_size,
            max_in_flight: options.max_in_flight,
        }
    }
}

impl SyncConfig {
    pub fn options(&self) -> SyncOptions {
        SyncOptions {
            page_size: self.page_size.clamp(1, MAX_PAGE_SIZE),
            max_in_flight: self.max_in_flight.max(1),
        }
    }
}

impl AppConfig {
    /// Overrides file values with `GH_TOKEN`/`GITHUB_TOKEN` and the
    /// `ISSUE_PROJECT_*` variables.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = var("GH_TOKEN").or_else(|| var("GITHUB_TOKEN")) {
            self.github.token = token;
        }
        if let Some(owner) = var("ISSUE_PROJECT_OWNER") {
            self.project.owner = Some(owner);
        }
        if let Some(number) = var("ISSUE_PROJECT_NUMBER") {
            let number = number
                .trim()
                .parse()
                .with_context(|| format!("ISSUE_PROJECT_NUMBER is not a number: {number}"))?;
            self.project.number = Some(number);
        }
        if let Some(owner_type) = var("ISSUE_PROJECT_OWNER_TYPE") {
            self.project.owner_type = owner_type
                .parse()
                .map_err(anyhow::Error::msg)
                .context("Invalid ISSUE_PROJECT_OWNER_TYPE")?;
        }
        Ok(())
    }

    /// The board to synchronize. Requires a token, an owner and a number.
    pub fn project_ref(&self) -> Result<ProjectRef> {
        if self.github.token.trim().is_empty() {
            bail!("No GitHub token configured. Set GH_TOKEN or github.token in config.toml");
        }
        let Some(owner) = self.project.owner.clone().filter(|o| !o.trim().is_empty()) else {
            bail!("No project owner configured. Set ISSUE_PROJECT_OWNER or project.owner");
        };
        let Some(number) = self.project.number else {
            bail!("No project number configured. Set ISSUE_PROJECT_NUMBER or project.number");
        };
        Ok(ProjectRef {
            owner,
            number,
            owner_type: self.project.owner_type,
        })
    }
}

pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".project-keeper")
}

fn config_path() -> PathBuf {
    data_dir().join("config.toml")
}

pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str(contents).with_context(|| "Failed to parse config.toml")
}

/// Loads the config file (the default one may be absent), then layers the
/// process environment on top.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = load_file(explicit)?;
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

fn load_file(explicit: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => {
            let path = config_path();
            if !path.exists() {
                return Ok(AppConfig::default());
            }
            path
        }
    };
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config from {}", path.display()))?;
    parse_config(&contents)
}
