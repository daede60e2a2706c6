use std::path::PathBuf;

use clap::Parser;

use crate::config::AppConfig;
use crate::model::project::OwnerType;

/// Keeps the derived fields of a GitHub project board in sync with the
/// issues and pull requests on it.
#[derive(Debug, Parser)]
#[command(name = "project-keeper", version)]
pub struct Cli {
    /// Config file (default: ~/.project-keeper/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Login of the organization or user owning the project
    #[arg(long, value_name = "LOGIN")]
    pub owner: Option<String>,

    /// Project number, as shown in the project URL
    #[arg(long, value_name = "N")]
    pub number: Option<u64>,

    /// Whether the owner is an organization or a user
    #[arg(long, value_name = "TYPE")]
    pub owner_type: Option<OwnerType>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Flags take precedence over the config file and the environment.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(owner) = &self.owner {
            config.project.owner = Some(owner.clone());
        }
        if let Some(number) = self.number {
            config.project.number = Some(number);
        }
        if let Some(owner_type) = self.owner_type {
            config.project.owner_type = owner_type;
        }
    }
}
