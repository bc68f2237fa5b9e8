pub mod commits;
pub mod config;
pub mod pick;
pub mod validate;

use anyhow::{Context, Result, bail};
use backport_core::{
    DEFAULT_TICKET_PATTERN, GitHubHost, RepositoryConfig, Settings, TicketPattern,
    detect_github_repo,
};
use clap::{Args, ValueEnum};
use rpassword::read_password;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Human,
    Json,
    Minimal,
}

/// Where the repository lives locally and on GitHub
#[derive(Args, Clone, Debug)]
pub struct RepoArgs {
    /// Repository path
    #[arg(long, env = "BACKPORT_REPO_PATH", default_value = ".")]
    pub repo_path: PathBuf,

    /// GitHub owner (detected from `origin` when omitted)
    #[arg(long, env = "BACKPORT_OWNER")]
    pub owner: Option<String>,

    /// GitHub repository name (detected from `origin` when omitted)
    #[arg(long, env = "BACKPORT_REPO")]
    pub repo: Option<String>,

    /// Branch the commits come from [default: main]
    #[arg(long, env = "BACKPORT_SOURCE")]
    pub source: Option<String>,

    /// Branch the commits are backported to [default: stable]
    #[arg(long, env = "BACKPORT_TARGET")]
    pub target: Option<String>,

    /// Ticket ID regex, matched case-insensitively [default: betty-\d+]
    #[arg(long, env = "BACKPORT_TICKET_PATTERN")]
    pub ticket_pattern: Option<String>,
}

impl RepoArgs {
    /// Merge flags, saved settings and the `origin` remote, in that order
    pub fn resolve(&self, settings: &Settings) -> RepositoryConfig {
        let mut owner = self.owner.clone().or_else(|| settings.owner.clone());
        let mut repo = self.repo.clone().or_else(|| settings.repo.clone());

        if (owner.is_none() || repo.is_none())
            && let Some((detected_owner, detected_repo)) = detect_github_repo(&self.repo_path)
        {
            debug!("Detected GitHub repository {detected_owner}/{detected_repo} from origin");
            owner = owner.or(Some(detected_owner));
            repo = repo.or(Some(detected_repo));
        }

        let mut config = RepositoryConfig::new(
            &self.repo_path,
            owner.unwrap_or_default(),
            repo.unwrap_or_default(),
        );
        if let Some(source) = self.source.clone().or_else(|| settings.source_branch.clone()) {
            config.source_branch = source;
        }
        if let Some(target) = self.target.clone().or_else(|| settings.target_branch.clone()) {
            config.target_branch = target;
        }
        config.ticket_pattern = self
            .ticket_pattern
            .clone()
            .or_else(|| settings.ticket_pattern.clone())
            .unwrap_or_else(|| DEFAULT_TICKET_PATTERN.to_string());

        config
    }
}

/// Fail unless both the owner and the repository name are known
pub fn require_github_repo(config: &RepositoryConfig) -> Result<()> {
    if config.owner.is_empty() || config.repo_name.is_empty() {
        bail!(
            "Could not determine the GitHub repository. Pass --owner and --repo, \
             or run 'backport config set owner <owner>'"
        );
    }
    Ok(())
}

/// Compile the configured ticket pattern; an empty pattern disables extraction
pub fn ticket_pattern(config: &RepositoryConfig) -> Result<Option<TicketPattern>> {
    if config.ticket_pattern.trim().is_empty() {
        return Ok(None);
    }
    TicketPattern::new(&config.ticket_pattern).map(Some)
}

/// GitHub credentials and endpoint
#[derive(Args, Clone, Debug)]
pub struct AuthArgs {
    /// GitHub personal access token (prompted for when omitted)
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// GitHub API URL, for GitHub Enterprise
    #[arg(long, env = "BACKPORT_API_URL")]
    pub api_url: Option<String>,

    /// Timeout in seconds for each GitHub request
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

impl AuthArgs {
    /// The token from the flag or environment, otherwise read from the terminal
    pub fn token(&self) -> Result<String> {
        if let Some(token) = &self.token {
            return Ok(token.clone());
        }

        eprint!("Enter GitHub token: ");
        io::stderr().flush()?;
        read_password().context("Failed to read GitHub token")
    }

    pub fn host(&self, settings: &Settings) -> GitHubHost {
        let host = GitHubHost::new().with_timeout(Duration::from_secs(self.timeout));
        match self.api_url.clone().or_else(|| settings.api_url.clone()) {
            Some(url) => host.with_base_uri(url),
            None => host,
        }
    }
}
