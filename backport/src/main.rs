use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::commits::{CommitsArgs, handle_commits_command};
use commands::config::{ConfigCommands, handle_config_command};
use commands::pick::{PickArgs, handle_pick_command};
use commands::validate::{
    ValidateRepoArgs, ValidateTokenArgs, handle_validate_repo_command,
    handle_validate_token_command,
};

#[derive(Parser)]
#[command(name = "backport")]
#[command(about = "Cherry-pick commits onto a release branch and open a GitHub pull request")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Settings file (default: ~/.config/backport/settings.json)
    #[arg(long, env = "BACKPORT_SETTINGS", global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Cherry-pick commits onto a new branch and open a pull request
    Pick(PickArgs),

    /// List commits that can be backported
    Commits(CommitsArgs),

    /// Check that a GitHub token is accepted
    ValidateToken(ValidateTokenArgs),

    /// Check that the GitHub repository is reachable with a token
    ValidateRepo(ValidateRepoArgs),

    /// Show or change saved defaults
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn init_tracing(verbose: bool) {
    let default_directives = if verbose {
        "warn,backport=debug,backport_core=debug"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings_path = match cli.settings {
        Some(path) => path,
        None => backport_core::get_settings_path()?,
    };

    let success = match cli.command {
        Commands::Pick(args) => handle_pick_command(args, &settings_path).await?,
        Commands::Commits(args) => {
            handle_commits_command(args, &settings_path)?;
            true
        }
        Commands::ValidateToken(args) => {
            handle_validate_token_command(args, &settings_path).await?
        }
        Commands::ValidateRepo(args) => handle_validate_repo_command(args, &settings_path).await?,
        Commands::Config { command } => {
            handle_config_command(command, &settings_path)?;
            true
        }
    };

    if !success {
        std::process::exit(1);
    }

    Ok(())
}
