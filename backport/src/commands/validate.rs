use anyhow::Result;
use backport_core::{CodeHost, Settings};
use clap::Args;
use std::path::Path;
use tracing::warn;

use super::{AuthArgs, RepoArgs, require_github_repo};

#[derive(Args)]
pub struct ValidateTokenArgs {
    #[command(flatten)]
    pub auth: AuthArgs,
}

#[derive(Args)]
pub struct ValidateRepoArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub auth: AuthArgs,
}

pub async fn handle_validate_token_command(
    args: ValidateTokenArgs,
    settings_path: &Path,
) -> Result<bool> {
    let settings = Settings::load(settings_path)?;
    let token = args.auth.token()?;

    let session = match args.auth.host(&settings).initialize(&token) {
        Ok(session) => session,
        Err(e) => {
            warn!("Could not create GitHub client: {e:#}");
            println!("❌ {e}");
            return Ok(false);
        }
    };

    if session.validate_credential().await {
        println!("✅ GitHub token is valid");
        Ok(true)
    } else {
        println!("❌ Invalid GitHub token");
        Ok(false)
    }
}

pub async fn handle_validate_repo_command(
    args: ValidateRepoArgs,
    settings_path: &Path,
) -> Result<bool> {
    let settings = Settings::load(settings_path)?;
    let config = args.repo.resolve(&settings);
    require_github_repo(&config)?;
    let token = args.auth.token()?;

    let session = match args.auth.host(&settings).initialize(&token) {
        Ok(session) => session,
        Err(e) => {
            warn!("Could not create GitHub client: {e:#}");
            println!("❌ {e}");
            return Ok(false);
        }
    };

    let name = format!("{}/{}", config.owner, config.repo_name);
    if session
        .validate_repository(&config.owner, &config.repo_name)
        .await
    {
        println!("✅ Repository {name} is accessible");
        Ok(true)
    } else {
        println!("❌ Repository {name} is not accessible");
        Ok(false)
    }
}
