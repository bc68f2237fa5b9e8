//! The cherry-pick workflow
//!
//! One call to [`CherryPickOrchestrator::execute`] walks the repository and
//! the code host through
//!
//! ```text
//! Start -> RepoOpened -> Authenticated -> Fetched -> BranchCreated
//!       -> CherryPicked -> Pushed -> PrCreated
//! ```
//!
//! Every step returns a [`WorkflowError`] on failure. Once the repository may
//! have been touched (anything from the fetch onwards) a failure is followed
//! by exactly one rollback through
//! [`RepositoryConnector::abort_cherry_pick`], whose own errors are logged and
//! dropped so the original reason is what the caller sees.

use anyhow::Context;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use strum::Display;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::WorkflowError;
use crate::github::{CodeHost, CodeHostSession, PullRequestRejected};
use crate::repo::RepositoryConnector;
use crate::types::{CherryPickRequest, CherryPickResult, CommitRecord, PullRequestRef};

const BRANCH_PREFIX: &str = "cherry-pick/";
const MAX_BRANCH_TICKETS: usize = 3;

/// Receives human-readable status lines as the workflow advances
pub trait ProgressSink: Send + Sync {
    fn report(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Send + Sync,
{
    fn report(&self, message: &str) {
        self(message)
    }
}

/// Discards progress
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn report(&self, _message: &str) {}
}

/// How far a workflow got
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum WorkflowState {
    Start,
    RepoOpened,
    Authenticated,
    Fetched,
    BranchCreated,
    CherryPicked,
    Pushed,
    PrCreated,
}

/// Runs cherry-pick workflows against a code host
pub struct CherryPickOrchestrator<H> {
    host: H,
    active: Arc<Mutex<HashSet<PathBuf>>>,
}

impl<H: CodeHost> CherryPickOrchestrator<H> {
    pub fn new(host: H) -> Self {
        Self {
            host,
            active: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Run the whole workflow once
    pub async fn execute(
        &self,
        request: &CherryPickRequest,
        progress: &dyn ProgressSink,
    ) -> CherryPickResult {
        self.execute_with_cancellation(request, progress, &CancellationToken::new())
            .await
    }

    /// Run the workflow, checking `cancel` between steps
    ///
    /// A cancelled workflow is rolled back exactly like a failed one.
    pub async fn execute_with_cancellation(
        &self,
        request: &CherryPickRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> CherryPickResult {
        let path = &request.config.local_path;
        let Some(_claim) = WorkingTreeClaim::acquire(&self.active, path) else {
            warn!("Rejecting overlapping workflow for {}", path.display());
            let err = WorkflowError::Busy(path.clone());
            progress.report(&format!("Error: {err}"));
            return CherryPickResult::failed(err);
        };

        let branch_name = request
            .branch_name
            .clone()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| generate_branch_name(request.commits(), Utc::now()));

        let mut run = WorkflowRun {
            request,
            progress,
            cancel,
            branch_name,
            state: WorkflowState::Start,
        };

        let mut repo = match run.open_repository() {
            Ok(repo) => repo,
            Err(err) => return run.fail(err),
        };

        let session = match run.authenticate(&self.host).await {
            Ok(session) => session,
            Err(err) => return run.fail(err),
        };

        match run.apply(&mut repo, session.as_ref()).await {
            Ok(pull_request) => {
                run.report(&format!("Pull request created: {}", pull_request.url));
                CherryPickResult::succeeded(run.branch_name, pull_request)
            }
            Err(err) => {
                rollback(&mut repo);
                run.fail(err)
            }
        }
    }
}

struct WorkflowRun<'a> {
    request: &'a CherryPickRequest,
    progress: &'a dyn ProgressSink,
    cancel: &'a CancellationToken,
    branch_name: String,
    state: WorkflowState,
}

impl WorkflowRun<'_> {
    fn report(&self, message: &str) {
        debug!(state = %self.state, "{message}");
        self.progress.report(message);
    }

    fn advance(&mut self, next: WorkflowState) {
        debug!("Workflow {} -> {}", self.state, next);
        self.state = next;
    }

    fn check_cancelled(&self) -> Result<(), WorkflowError> {
        if self.cancel.is_cancelled() {
            return Err(WorkflowError::Cancelled);
        }
        Ok(())
    }

    fn fail(&self, err: WorkflowError) -> CherryPickResult {
        self.progress.report(&format!("Error: {err}"));
        warn!(
            state = %self.state,
            kind = %err.kind(),
            "Cherry-pick workflow failed: {err}"
        );
        CherryPickResult::failed(err)
    }

    fn open_repository(&mut self) -> Result<RepositoryConnector, WorkflowError> {
        self.check_cancelled()?;
        let path = &self.request.config.local_path;

        self.report("Opening repository...");
        let repo = RepositoryConnector::open(path).ok_or_else(|| WorkflowError::open_failed(path))?;

        if repo
            .has_uncommitted_changes()
            .map_err(WorkflowError::repository)?
        {
            return Err(WorkflowError::RepositoryUnavailable(format!(
                "Working tree at '{}' has uncommitted changes",
                path.display()
            )));
        }

        self.advance(WorkflowState::RepoOpened);
        Ok(repo)
    }

    async fn authenticate<H: CodeHost>(
        &mut self,
        host: &H,
    ) -> Result<Box<dyn CodeHostSession>, WorkflowError> {
        self.check_cancelled()?;

        self.report("Initializing GitHub client...");
        let credential = self
            .request
            .config
            .credential()
            .ok_or(WorkflowError::MissingCredential)?;

        let session = host.initialize(credential).map_err(|e| {
            warn!("Failed to initialize GitHub client: {e:#}");
            WorkflowError::InvalidCredential
        })?;

        if !session.validate_credential().await {
            return Err(WorkflowError::InvalidCredential);
        }

        self.advance(WorkflowState::Authenticated);
        Ok(session)
    }

    async fn apply(
        &mut self,
        repo: &mut RepositoryConnector,
        session: &dyn CodeHostSession,
    ) -> Result<PullRequestRef, WorkflowError> {
        let config = &self.request.config;
        let commits = self.request.commits();

        self.check_cancelled()?;
        self.report("Fetching latest changes from remote...");
        let path = repo.path().to_path_buf();
        run_blocking(path, |repo| repo.fetch())
            .await
            .map_err(WorkflowError::network)?;
        self.advance(WorkflowState::Fetched);

        self.check_cancelled()?;
        self.report(&format!(
            "Creating branch '{}' from '{}'...",
            self.branch_name, config.target_branch
        ));
        repo.create_branch(&self.branch_name, &config.target_branch)
            .map_err(WorkflowError::repository)?;
        self.advance(WorkflowState::BranchCreated);

        self.check_cancelled()?;
        self.report(&format!("Cherry-picking {} commit(s)...", commits.len()));
        if let Some(failed) = repo.cherry_pick(commits) {
            self.report("Cherry-pick failed, aborting...");
            return Err(WorkflowError::conflict(failed));
        }
        self.advance(WorkflowState::CherryPicked);

        self.check_cancelled()?;
        self.report(&format!(
            "Pushing branch '{}' to remote...",
            self.branch_name
        ));
        let credential = config
            .credential()
            .ok_or(WorkflowError::MissingCredential)?;
        let (path, branch, credential) = (
            repo.path().to_path_buf(),
            self.branch_name.clone(),
            credential.to_string(),
        );
        run_blocking(path, move |repo| repo.push(&branch, &credential))
            .await
            .map_err(WorkflowError::network)?;
        self.advance(WorkflowState::Pushed);

        self.check_cancelled()?;
        self.report("Creating pull request...");
        let body = build_pr_body(self.request);
        let pull_request = session
            .create_pull_request(
                &config.owner,
                &config.repo_name,
                &self.request.pr_title,
                &body,
                &self.branch_name,
                &config.target_branch,
            )
            .await
            .map_err(|e| {
                if e.downcast_ref::<PullRequestRejected>().is_some() {
                    WorkflowError::remote_rejection(e)
                } else {
                    WorkflowError::network(e)
                }
            })?;
        self.advance(WorkflowState::PrCreated);

        info!(
            "Backported {} commit(s) onto {} as PR #{}",
            commits.len(),
            config.target_branch,
            pull_request.number
        );
        Ok(pull_request)
    }
}

/// Run a network-bound git operation on the blocking pool
///
/// The operation gets its own handle on the working tree at `path`; it only
/// touches refs and the remote, never the state kept by the caller's handle.
async fn run_blocking<T, F>(path: PathBuf, op: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&RepositoryConnector) -> anyhow::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let repo = RepositoryConnector::open(&path)
            .with_context(|| format!("Could not open repository at '{}'", path.display()))?;
        op(&repo)
    })
    .await
    .context("Git task did not complete")?
}

fn rollback(repo: &mut RepositoryConnector) {
    if let Err(e) = repo.abort_cherry_pick() {
        warn!("Rollback of {} failed: {e:#}", repo.path().display());
    }
}

/// Marks a working tree as busy until dropped
struct WorkingTreeClaim {
    active: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl WorkingTreeClaim {
    fn acquire(active: &Arc<Mutex<HashSet<PathBuf>>>, path: &Path) -> Option<Self> {
        let path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let mut paths = active.lock().unwrap_or_else(|e| e.into_inner());
        if !paths.insert(path.clone()) {
            return None;
        }

        Some(Self {
            active: Arc::clone(active),
            path,
        })
    }
}

impl Drop for WorkingTreeClaim {
    fn drop(&mut self) {
        let mut paths = self.active.lock().unwrap_or_else(|e| e.into_inner());
        paths.remove(&self.path);
    }
}

/// `cherry-pick/<tickets>-<yyyyMMdd-HHmmss>` using up to three distinct tickets
pub fn generate_branch_name(commits: &[CommitRecord], now: DateTime<Utc>) -> String {
    let timestamp = now.format("%Y%m%d-%H%M%S");

    let mut tickets: Vec<&str> = Vec::new();
    for ticket in commits
        .iter()
        .filter_map(|c| c.ticket.as_deref())
        .filter(|t| !t.is_empty())
    {
        if tickets.len() == MAX_BRANCH_TICKETS {
            break;
        }
        if !tickets.contains(&ticket) {
            tickets.push(ticket);
        }
    }

    if tickets.is_empty() {
        format!("{BRANCH_PREFIX}{timestamp}")
    } else {
        format!(
            "{BRANCH_PREFIX}{tickets}-{timestamp}",
            tickets = tickets.join("-")
        )
    }
}

/// Description (or a default) followed by a `## Commits` list
pub fn build_pr_body(request: &CherryPickRequest) -> String {
    let config = &request.config;
    let mut body = request
        .pr_description
        .clone()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| {
            format!(
                "Cherry-picked commits from {source} to {target}.",
                source = config.source_branch,
                target = config.target_branch
            )
        });

    body.push_str("\n\n## Commits\n");
    for commit in request.commits() {
        let ticket = commit
            .ticket
            .as_deref()
            .map(|t| format!("[{t}] "))
            .unwrap_or_default();
        body.push_str(&format!(
            "- `{short}` {ticket}{summary}\n",
            short = commit.short_hash(),
            summary = commit.summary
        ));
    }

    body
}

/// Title used when the caller does not supply one
pub fn default_pr_title(commits: &[CommitRecord], target_branch: &str) -> String {
    let mut tickets: Vec<&str> = Vec::new();
    for ticket in commits.iter().filter_map(|c| c.ticket.as_deref()) {
        if !tickets.contains(&ticket) {
            tickets.push(ticket);
        }
    }

    if tickets.is_empty() {
        format!(
            "Cherry-pick {count} commit(s) to {target_branch}",
            count = commits.len()
        )
    } else {
        format!("Cherry-pick: {}", tickets.join(", "))
    }
}
