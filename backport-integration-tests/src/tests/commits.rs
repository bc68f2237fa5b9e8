use crate::cli::RunOptions;
use crate::helpers::{
    BackportRunner, CommitEntry, TestContext, assert_contains, assert_eq_with, record,
};
use anyhow::{Context, Result};

/// Run all commit listing tests
pub async fn run_tests(options: RunOptions) -> Result<(usize, usize)> {
    let mut passed = 0;
    let mut failed = 0;

    record(
        "test_pending_commits_in_ancestry_order",
        test_pending_commits_in_ancestry_order(options),
        &mut passed,
        &mut failed,
    );
    record(
        "test_search_commits",
        test_search_commits(options),
        &mut passed,
        &mut failed,
    );
    record(
        "test_lookup_by_sha",
        test_lookup_by_sha(options),
        &mut passed,
        &mut failed,
    );
    record(
        "test_date_range",
        test_date_range(options),
        &mut passed,
        &mut failed,
    );
    record(
        "test_human_output",
        test_human_output(options),
        &mut passed,
        &mut failed,
    );

    Ok((passed, failed))
}

fn test_pending_commits_in_ancestry_order(options: RunOptions) -> Result<()> {
    let ctx = TestContext::new(options)?;
    ctx.setup_git_repo()?;
    let first = ctx.commit_file("a.txt", "a\n", "PROJ-11: first fix")?;
    let second = ctx.commit_file("b.txt", "b\n", "second change")?;

    let runner = BackportRunner::new(&ctx.home_dir, ctx.verbose);
    let repo = ctx.repo_arg();
    let output = runner.run_success(&[
        "commits",
        "--repo-path",
        &repo,
        "--ticket-pattern",
        r"PROJ-\d+",
        "--json",
    ])?;
    let commits = output.parse_commits()?;

    let hashes: Vec<&str> = commits.iter().map(|c| c.hash.as_str()).collect();
    assert_eq_with(hashes, vec![first.as_str(), second.as_str()], "Pending commits")?;
    assert_eq_with(
        commits[0].ticket.as_deref(),
        Some("PROJ-11"),
        "Ticket of first commit",
    )?;
    assert_eq_with(commits[1].ticket.as_deref(), None, "Ticket of second commit")?;
    assert_eq_with(commits[0].author.as_str(), "Test User", "Author")?;
    Ok(())
}

fn test_search_commits(options: RunOptions) -> Result<()> {
    let ctx = TestContext::new(options)?;
    ctx.setup_git_repo()?;
    ctx.commit_file("a.txt", "a\n", "betty-1: Fix crash on start")?;
    ctx.commit_file("b.txt", "b\n", "docs: typo")?;
    ctx.commit_file("c.txt", "c\n", "betty-2: fix leak")?;

    let runner = BackportRunner::new(&ctx.home_dir, ctx.verbose);
    let repo = ctx.repo_arg();
    let output = runner.run_success(&[
        "commits",
        "--repo-path",
        &repo,
        "--search",
        "FIX",
        "--json",
    ])?;
    let commits = output.parse_commits()?;

    assert_eq_with(commits.len(), 2, "Matching commits")?;
    CommitEntry::find_by_summary(&commits, "betty-2: fix leak")
        .context("betty-2 commit missing")?;
    let crash = CommitEntry::find_by_summary(&commits, "betty-1: Fix crash on start")
        .context("betty-1 commit missing")?;
    assert_eq_with(crash.ticket.as_deref(), Some("betty-1"), "Default ticket pattern")?;
    Ok(())
}

fn test_lookup_by_sha(options: RunOptions) -> Result<()> {
    let ctx = TestContext::new(options)?;
    ctx.setup_git_repo()?;
    let hash = ctx.commit_file("a.txt", "a\n", "single commit")?;

    let runner = BackportRunner::new(&ctx.home_dir, ctx.verbose);
    let repo = ctx.repo_arg();
    let short = &hash[..8];
    let output = runner.run_success(&[
        "commits",
        "--repo-path",
        &repo,
        "--sha",
        &format!("{short},deadbeef"),
        "--json",
    ])?;

    let commits = output.parse_commits()?;
    assert_eq_with(commits.len(), 1, "Resolved commits")?;
    assert_eq_with(commits[0].hash.as_str(), hash.as_str(), "Full hash")?;
    assert_contains(&output.stderr, "deadbeef", "Unknown hash is reported")?;
    Ok(())
}

fn test_date_range(options: RunOptions) -> Result<()> {
    let ctx = TestContext::new(options)?;
    ctx.setup_git_repo()?;
    ctx.commit_file("a.txt", "a\n", "today's commit")?;

    let runner = BackportRunner::new(&ctx.home_dir, ctx.verbose);
    let repo = ctx.repo_arg();

    let output = runner.run_success(&[
        "commits",
        "--repo-path",
        &repo,
        "--from",
        "2000-01-01",
        "--json",
    ])?;
    let commits = output.parse_commits()?;
    assert_eq_with(commits.len(), 2, "Commits since 2000")?;
    assert_contains(&commits[0].committed_at, "T", "RFC 3339 timestamp")?;

    let output = runner.run_success(&[
        "commits",
        "--repo-path",
        &repo,
        "--from",
        "2000-01-01",
        "--to",
        "2000-12-31",
        "--json",
    ])?;
    assert_eq_with(output.parse_commits()?.len(), 0, "Commits in 2000")?;
    Ok(())
}

fn test_human_output(options: RunOptions) -> Result<()> {
    let ctx = TestContext::new(options)?;
    ctx.setup_git_repo()?;
    let hash = ctx.commit_file("a.txt", "a\n", "betty-42: visible change")?;

    let runner = BackportRunner::new(&ctx.home_dir, ctx.verbose);
    let repo = ctx.repo_arg();
    let output = runner.run_success(&["commits", "--repo-path", &repo])?;

    assert_contains(&output.stdout, "Commits on main not in stable (1):", "Heading")?;
    assert_contains(&output.stdout, &hash[..7], "Short hash")?;
    assert_contains(&output.stdout, "betty-42", "Ticket column")?;

    ctx.git(&["checkout", "-q", "stable"])?;
    ctx.git(&["merge", "-q", "--ff-only", "main"])?;
    let output = runner.run_success(&["commits", "--repo-path", &repo])?;
    assert_contains(&output.stderr, "No commits found", "Nothing pending")?;
    Ok(())
}
