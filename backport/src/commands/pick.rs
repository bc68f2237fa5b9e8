use anyhow::{Result, bail};
use backport_core::{
    CancellationToken, CherryPickOrchestrator, CherryPickRequest, CherryPickResult,
    RepositoryConnector, Settings, default_pr_title,
};
use clap::Args;
use std::path::Path;
use tracing::{debug, info, warn};

use super::{AuthArgs, OutputFormat, RepoArgs, require_github_repo, ticket_pattern};

#[derive(Args)]
pub struct PickArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    #[command(flatten)]
    pub auth: AuthArgs,

    /// Commits to cherry-pick, applied in the given order (full or short hashes)
    #[arg(long = "commit", short = 'c', required = true, value_delimiter = ',')]
    pub commits: Vec<String>,

    /// Pull request title (generated from the commits when omitted)
    #[arg(long, short = 't')]
    pub title: Option<String>,

    /// Pull request description
    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Name of the branch to create (generated when omitted)
    #[arg(long)]
    pub branch: Option<String>,

    /// Output format
    #[arg(long, value_enum, default_value = "human")]
    pub output: OutputFormat,
}

pub async fn handle_pick_command(args: PickArgs, settings_path: &Path) -> Result<bool> {
    let settings = Settings::load(settings_path)?;
    let mut config = args.repo.resolve(&settings);
    require_github_repo(&config)?;
    let pattern = ticket_pattern(&config)?;

    let commits = {
        let Some(repo) = RepositoryConnector::open(&config.local_path) else {
            bail!(
                "Could not open repository at '{}'",
                config.local_path.display()
            );
        };

        let mut found = Vec::with_capacity(args.commits.len());
        let mut missing = Vec::new();
        for hash in &args.commits {
            match repo.lookup_commit(hash, pattern.as_ref()) {
                Some(commit) => found.push(commit),
                None => missing.push(hash.as_str()),
            }
        }
        if !missing.is_empty() {
            bail!("Unknown commit(s): {}", missing.join(", "));
        }
        found
    };
    debug!("Resolved {} commit(s) to cherry-pick", commits.len());

    config.credential = Some(args.auth.token()?);
    let title = args
        .title
        .clone()
        .unwrap_or_else(|| default_pr_title(&commits, &config.target_branch));

    let mut request = CherryPickRequest::new(config, commits, title)?;
    if let Some(branch) = args.branch {
        request = request.with_branch_name(branch);
    }
    if let Some(description) = args.description {
        request = request.with_description(description);
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling after the current step");
                cancel.cancel();
            }
        });
    }

    let orchestrator = CherryPickOrchestrator::new(args.auth.host(&settings));
    let progress = |line: &str| eprintln!("{line}");
    let result = orchestrator
        .execute_with_cancellation(&request, &progress, &cancel)
        .await;

    if result.is_success() {
        info!(
            "Backport finished on branch {}",
            result.branch_name().unwrap_or_default()
        );
    }
    print_result(&result, args.output)?;
    Ok(result.is_success())
}

fn print_result(result: &CherryPickResult, output: OutputFormat) -> Result<()> {
    match output {
        OutputFormat::Human => {
            if result.is_success() {
                println!("✅ Pull request created successfully!");
                println!();
                println!("Branch: {}", result.branch_name().unwrap_or_default());
                if let Some(number) = result.pull_request_number() {
                    println!("Pull request: #{number}");
                }
                println!("URL: {}", result.pull_request_url().unwrap_or_default());
            } else {
                println!(
                    "❌ Cherry-pick failed: {}",
                    result.error_message().unwrap_or("unknown error")
                );
                if let Some(kind) = result.error_kind() {
                    println!("Reason: {kind}");
                }
                if let Some(commit) = result.failed_commit() {
                    println!();
                    println!("Failed commit: {} {}", commit.hash, commit.summary);
                    println!("Resolve the conflict manually or leave this commit out.");
                }
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(result)?);
        }
        OutputFormat::Minimal => {
            if result.is_success() {
                println!("{}", result.pull_request_url().unwrap_or_default());
            } else {
                eprintln!("{}", result.error_message().unwrap_or("unknown error"));
            }
        }
    }

    Ok(())
}
