use anyhow::{Context, Result, bail};
use backport_core::{CommitRecord, RepositoryConnector, Settings};
use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, Utc};
use clap::Args;
use std::path::Path;

use super::{RepoArgs, ticket_pattern};

#[derive(Args)]
pub struct CommitsArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Fetch from origin before listing
    #[arg(long)]
    pub fetch: bool,

    /// Show specific commits by hash
    #[arg(long, value_delimiter = ',', conflicts_with_all = ["search", "from"])]
    pub sha: Vec<String>,

    /// Search commit messages on the source branch (case-insensitive regex)
    #[arg(long, conflicts_with = "from")]
    pub search: Option<String>,

    /// Only commits authored on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Only commits authored on or before this date (YYYY-MM-DD, default today)
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn handle_commits_command(args: CommitsArgs, settings_path: &Path) -> Result<()> {
    let settings = Settings::load(settings_path)?;
    let config = args.repo.resolve(&settings);
    let pattern = ticket_pattern(&config)?;

    let Some(repo) = RepositoryConnector::open(&config.local_path) else {
        bail!(
            "Could not open repository at '{}'",
            config.local_path.display()
        );
    };

    if args.fetch {
        eprintln!("Fetching latest changes from remote...");
        repo.fetch()?;
    }

    let (commits, heading) = if !args.sha.is_empty() {
        let mut commits = Vec::new();
        for hash in &args.sha {
            match repo.lookup_commit(hash, pattern.as_ref()) {
                Some(commit) => commits.push(commit),
                None => eprintln!("Warning: commit '{hash}' not found"),
            }
        }
        (commits, "Requested commits".to_string())
    } else if let Some(query) = &args.search {
        let commits = repo.list_commits_matching(&config.source_branch, query, pattern.as_ref())?;
        (
            commits,
            format!("Commits on {} matching '{query}'", config.source_branch),
        )
    } else if let Some(from) = args.from {
        let to = args.to.unwrap_or_else(|| Utc::now().date_naive());
        let (start, end) = date_range(from, to)?;
        let commits =
            repo.list_commits_in_range(&config.source_branch, start, end, pattern.as_ref())?;
        (
            commits,
            format!("Commits on {} from {from} to {to}", config.source_branch),
        )
    } else {
        let commits = repo.list_commits(
            &config.source_branch,
            &config.target_branch,
            pattern.as_ref(),
        )?;
        (
            commits,
            format!(
                "Commits on {} not in {}",
                config.source_branch, config.target_branch
            ),
        )
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&commits)?);
    } else {
        print_commits(&heading, &commits);
    }

    Ok(())
}

/// `[from 00:00, to 23:59:59]` in UTC; the end day is included in full
fn date_range(
    from: NaiveDate,
    to: NaiveDate,
) -> Result<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    if to < from {
        bail!("--to ({to}) is before --from ({from})");
    }

    let start = from.and_time(NaiveTime::MIN).and_utc().fixed_offset();
    let end = to
        .checked_add_days(Days::new(1))
        .context("Date out of range")?
        .and_time(NaiveTime::MIN)
        .and_utc()
        .fixed_offset()
        - chrono::Duration::seconds(1);

    Ok((start, end))
}

fn print_commits(heading: &str, commits: &[CommitRecord]) {
    if commits.is_empty() {
        eprintln!("No commits found");
        return;
    }

    println!("{heading} ({count}):", count = commits.len());
    println!("{:-<80}", "");
    for commit in commits {
        println!(
            "{short}  {date}  {ticket:<12}  {summary} ({author})",
            short = commit.short_hash(),
            date = commit.committed_at.format("%Y-%m-%d %H:%M"),
            ticket = commit.ticket.as_deref().unwrap_or("-"),
            summary = commit.summary,
            author = commit.author
        );
    }
}
