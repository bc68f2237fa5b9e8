use anyhow::{Context, Result, bail};
use chrono::{DateTime, FixedOffset, Offset, Utc};
use git2::build::CheckoutBuilder;
use git2::{
    BranchType, CherrypickOptions, Commit, Cred, Index, Oid, PushOptions, RemoteCallbacks,
    Repository, RepositoryState, ResetType, Signature, Sort, StatusOptions,
};
use regex::RegexBuilder;
use std::cell::{Cell, RefCell};
use std::collections::{BinaryHeap, HashMap};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::ticket::TicketPattern;
use crate::types::CommitRecord;

/// The only remote the workflow talks to
pub const ORIGIN: &str = "origin";

/// Upper bound on results from a message search
pub const SEARCH_LIMIT: usize = 100;

/// Where HEAD pointed before the workflow created its branch
#[derive(Debug, Clone, PartialEq, Eq)]
enum OriginalHead {
    Branch(String),
    Detached(Oid),
}

/// A git working tree bound for the lifetime of one workflow
pub struct RepositoryConnector {
    repo: Repository,
    path: PathBuf,
    original_head: Option<OriginalHead>,
}

impl std::fmt::Debug for RepositoryConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RepositoryConnector")
            .field("path", &self.path)
            .field("original_head", &self.original_head)
            .finish()
    }
}

impl RepositoryConnector {
    /// Bind to the working tree at `path`
    ///
    /// Returns `None` if `path` is not a usable (non-bare) git repository.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref();
        match Repository::open(path) {
            Ok(repo) if repo.is_bare() => {
                warn!("Repository at {} has no working tree", path.display());
                None
            }
            Ok(repo) => {
                debug!("Opened git repository at {}", path.display());
                Some(Self {
                    repo,
                    path: path.to_path_buf(),
                    original_head: None,
                })
            }
            Err(e) => {
                warn!(
                    "Failed to open git repository at {}: {}",
                    path.display(),
                    e.message()
                );
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Tracked files with staged or unstaged modifications
    pub fn has_uncommitted_changes(&self) -> Result<bool> {
        let mut options = StatusOptions::new();
        options.include_untracked(false).include_ignored(false);
        let statuses = self
            .repo
            .statuses(Some(&mut options))
            .context("Failed to read working tree status")?;
        Ok(!statuses.is_empty())
    }

    /// Short name of the checked-out branch, `None` when HEAD is detached
    pub fn current_branch(&self) -> Option<String> {
        let head = self.repo.head().ok()?;
        if !head.is_branch() {
            return None;
        }
        head.shorthand().map(str::to_string)
    }

    /// URL of the `origin` remote, if configured
    pub fn origin_url(&self) -> Option<String> {
        let remote = self.repo.find_remote(ORIGIN).ok()?;
        remote.url().map(str::to_string)
    }

    /// Update remote-tracking branches from `origin` using its fetch refspecs
    pub fn fetch(&self) -> Result<()> {
        let mut remote = self
            .repo
            .find_remote(ORIGIN)
            .with_context(|| format!("No '{ORIGIN}' remote configured"))?;

        let refspecs: Vec<String> = remote
            .fetch_refspecs()?
            .iter()
            .flatten()
            .map(str::to_string)
            .collect();
        debug!("Fetching from {ORIGIN} with refspecs {refspecs:?}");

        remote
            .fetch(&refspecs, None, None)
            .with_context(|| format!("Failed to fetch from '{ORIGIN}'"))?;

        info!("Fetched latest changes from {ORIGIN}");
        Ok(())
    }

    /// Tip of a local branch, falling back to `origin/<name>`
    pub fn resolve_branch_tip(&self, name: &str) -> Option<Commit<'_>> {
        self.repo
            .find_branch(name, BranchType::Local)
            .or_else(|_| {
                self.repo
                    .find_branch(&format!("{ORIGIN}/{name}"), BranchType::Remote)
            })
            .ok()?
            .get()
            .peel_to_commit()
            .ok()
    }

    /// Commits reachable from `include_from` but not from `exclude_from`
    ///
    /// Ancestors come before descendants; among commits that do not depend on
    /// each other the more recent one comes first.
    pub fn list_commits(
        &self,
        include_from: &str,
        exclude_from: &str,
        pattern: Option<&TicketPattern>,
    ) -> Result<Vec<CommitRecord>> {
        let (Some(include_tip), Some(exclude_tip)) = (
            self.resolve_branch_tip(include_from),
            self.resolve_branch_tip(exclude_from),
        ) else {
            debug!("Branch '{include_from}' or '{exclude_from}' not found, no commits to list");
            return Ok(vec![]);
        };

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(include_tip.id())?;
        revwalk.hide(exclude_tip.id())?;

        let mut commits = Vec::new();
        for oid in revwalk {
            commits.push(self.repo.find_commit(oid?)?);
        }

        Ok(ancestors_first(commits)
            .iter()
            .map(|commit| to_record(commit, pattern))
            .collect())
    }

    /// Commits whose message matches `query` (case-insensitive), newest first
    pub fn list_commits_matching(
        &self,
        include_from: &str,
        query: &str,
        pattern: Option<&TicketPattern>,
    ) -> Result<Vec<CommitRecord>> {
        let regex = RegexBuilder::new(query)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid search pattern '{query}'"))?;

        let Some(tip) = self.resolve_branch_tip(include_from) else {
            return Ok(vec![]);
        };

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip.id())?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut matches = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            if regex.is_match(&String::from_utf8_lossy(commit.message_bytes())) {
                matches.push(to_record(&commit, pattern));
                if matches.len() >= SEARCH_LIMIT {
                    break;
                }
            }
        }

        Ok(matches)
    }

    /// Commits authored within `[from, to]`, newest first
    pub fn list_commits_in_range(
        &self,
        include_from: &str,
        from: DateTime<FixedOffset>,
        to: DateTime<FixedOffset>,
        pattern: Option<&TicketPattern>,
    ) -> Result<Vec<CommitRecord>> {
        let Some(tip) = self.resolve_branch_tip(include_from) else {
            return Ok(vec![]);
        };

        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip.id())?;
        revwalk.set_sorting(Sort::TIME)?;

        let mut commits = Vec::new();
        for oid in revwalk {
            let commit = self.repo.find_commit(oid?)?;
            let authored_at = signature_time(&commit.author().when());
            if authored_at >= from && authored_at <= to {
                commits.push(to_record(&commit, pattern));
            }
        }

        Ok(commits)
    }

    /// Look up a commit by full or abbreviated hash
    pub fn lookup_commit(
        &self,
        hash: &str,
        pattern: Option<&TicketPattern>,
    ) -> Option<CommitRecord> {
        let hash = hash.trim();
        if hash.len() < 4 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        match self.repo.find_commit_by_prefix(hash) {
            Ok(commit) => Some(to_record(&commit, pattern)),
            Err(e) => {
                debug!("Commit {hash} not found: {}", e.message());
                None
            }
        }
    }

    /// Create `name` at the tip of `base_branch` and check it out
    ///
    /// The branch checked out before the call is remembered so that
    /// [`RepositoryConnector::abort_cherry_pick`] can return to it.
    pub fn create_branch(&mut self, name: &str, base_branch: &str) -> Result<String> {
        let original_head = self.current_head()?;
        let base_id = self
            .resolve_branch_tip(base_branch)
            .with_context(|| format!("Branch '{base_branch}' not found"))?
            .id();
        self.original_head = Some(original_head);
        let base_tip = self.repo.find_commit(base_id)?;

        let branch = self
            .repo
            .branch(name, &base_tip, false)
            .with_context(|| format!("Failed to create branch '{name}'"))?;
        let ref_name = branch
            .get()
            .name()
            .context("Branch reference name is not valid UTF-8")?
            .to_string();

        self.repo
            .checkout_tree(base_tip.as_object(), Some(CheckoutBuilder::new().safe()))
            .with_context(|| format!("Failed to check out '{name}'"))?;
        self.repo.set_head(&ref_name)?;

        info!(
            "Created branch {name} from {base_branch} at {}",
            base_tip.id()
        );
        Ok(name.to_string())
    }

    /// Apply `commits` in order onto the current branch
    ///
    /// Stops at the first commit that conflicts or cannot be applied and
    /// returns it, leaving the working tree as it is so the caller can decide
    /// how to clean up.
    pub fn cherry_pick(&self, commits: &[CommitRecord]) -> Option<CommitRecord> {
        for (i, record) in commits.iter().enumerate() {
            debug!(
                "Cherry-picking {}/{}: {} {}",
                i + 1,
                commits.len(),
                record.short_hash(),
                record.summary
            );

            if let Err(e) = self.apply_commit(record) {
                warn!("Cherry-pick of {} failed: {e:#}", record.short_hash());
                return Some(record.clone());
            }
        }

        None
    }

    fn apply_commit(&self, record: &CommitRecord) -> Result<()> {
        let commit = self
            .repo
            .find_commit_by_prefix(&record.hash)
            .with_context(|| format!("Commit {} not found", record.hash))?;

        let mut options = CherrypickOptions::new();
        if commit.parent_count() > 1 {
            options.mainline(1);
        }
        self.repo.cherrypick(&commit, Some(&mut options))?;

        let mut index = self.repo.index()?;
        if index.has_conflicts() {
            bail!("conflicts in {}", conflicted_paths(&index)?.join(", "));
        }

        let tree_id = index.write_tree()?;
        let head = self.repo.head()?.peel_to_commit()?;
        if tree_id == head.tree_id() {
            info!("{} is already applied, skipping", record.short_hash());
            self.repo.cleanup_state()?;
            return Ok(());
        }

        let tree = self.repo.find_tree(tree_id)?;
        let author = commit.author();
        let committer = match self.repo.signature() {
            Ok(signature) => signature,
            Err(_) => Signature::now(
                author.name().unwrap_or("backport"),
                author.email().unwrap_or("backport@localhost"),
            )?,
        };
        let message = String::from_utf8_lossy(commit.message_bytes());

        let new_id = self
            .repo
            .commit(Some("HEAD"), &author, &committer, &message, &tree, &[&head])?;
        self.repo.cleanup_state()?;

        debug!("Applied {} as {new_id}", record.short_hash());
        Ok(())
    }

    /// Push the local branch `branch_name` to `origin`
    ///
    /// The credential is sent as the username with an empty password, which
    /// is how GitHub accepts personal access tokens over HTTPS.
    pub fn push(&self, branch_name: &str, credential: &str) -> Result<()> {
        self.repo
            .find_branch(branch_name, BranchType::Local)
            .with_context(|| format!("Branch '{branch_name}' not found"))?;

        let mut remote = self
            .repo
            .find_remote(ORIGIN)
            .with_context(|| format!("No '{ORIGIN}' remote configured"))?;

        let refspec = format!("refs/heads/{branch_name}:refs/heads/{branch_name}");
        let attempts = Cell::new(0u32);
        let rejection: RefCell<Option<String>> = RefCell::new(None);

        {
            let mut callbacks = RemoteCallbacks::new();
            callbacks.credentials(|_url, _username, _allowed| {
                // libgit2 asks again after a rejected credential; don't loop forever
                attempts.set(attempts.get() + 1);
                if attempts.get() > 1 {
                    return Err(git2::Error::from_str("credentials were rejected"));
                }
                Cred::userpass_plaintext(credential, "")
            });
            callbacks.push_update_reference(|refname, status| {
                if let Some(message) = status {
                    *rejection.borrow_mut() = Some(format!("{refname}: {message}"));
                }
                Ok(())
            });

            let mut options = PushOptions::new();
            options.remote_callbacks(callbacks);

            remote
                .push(&[refspec.as_str()], Some(&mut options))
                .with_context(|| format!("Failed to push branch '{branch_name}' to '{ORIGIN}'"))?;
        }

        if let Some(reason) = rejection.into_inner() {
            bail!("Remote rejected branch '{branch_name}': {reason}");
        }

        info!("Pushed {branch_name} to {ORIGIN}");
        Ok(())
    }

    /// Discard any half-applied cherry-pick and return to the original branch
    ///
    /// Does nothing when no cherry-pick is in progress and no branch was
    /// created, so it is safe to call repeatedly.
    pub fn abort_cherry_pick(&mut self) -> Result<()> {
        let in_progress = self.repo.state() != RepositoryState::Clean;
        if !in_progress && self.original_head.is_none() {
            debug!("No cherry-pick in progress, nothing to abort");
            return Ok(());
        }

        {
            let head = self
                .repo
                .head()
                .and_then(|head| head.peel_to_commit())
                .context("Failed to resolve HEAD")?;
            self.repo
                .reset(head.as_object(), ResetType::Hard, None)
                .context("Failed to reset working tree")?;
        }
        self.repo.cleanup_state()?;

        match self.original_head.clone() {
            Some(OriginalHead::Branch(name)) => {
                if self.repo.find_branch(&name, BranchType::Local).is_ok() {
                    self.checkout_local(&name, true)?;
                    info!("Restored branch {name}");
                } else {
                    warn!("Original branch {name} no longer exists, staying on current branch");
                }
            }
            Some(OriginalHead::Detached(oid)) => {
                let commit = self.repo.find_commit(oid)?;
                self.repo
                    .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
                self.repo.set_head_detached(oid)?;
                info!("Restored detached HEAD at {oid}");
            }
            None => {}
        }

        self.original_head = None;
        Ok(())
    }

    /// Check out a local branch, or detach at `origin/<name>` if there is none
    pub fn checkout_branch(&self, name: &str) -> Result<()> {
        if self.repo.find_branch(name, BranchType::Local).is_ok() {
            return self.checkout_local(name, false);
        }

        let remote_name = format!("{ORIGIN}/{name}");
        let branch = self
            .repo
            .find_branch(&remote_name, BranchType::Remote)
            .with_context(|| format!("Branch '{name}' not found"))?;
        let commit = branch.get().peel_to_commit()?;

        self.repo
            .checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().safe()))
            .with_context(|| format!("Failed to check out '{remote_name}'"))?;
        self.repo.set_head_detached(commit.id())?;
        Ok(())
    }

    fn checkout_local(&self, name: &str, force: bool) -> Result<()> {
        let branch = self.repo.find_branch(name, BranchType::Local)?;
        let ref_name = branch
            .get()
            .name()
            .context("Branch reference name is not valid UTF-8")?
            .to_string();
        let commit = branch.get().peel_to_commit()?;

        let mut checkout = CheckoutBuilder::new();
        if force {
            checkout.force();
        } else {
            checkout.safe();
        }

        self.repo
            .checkout_tree(commit.as_object(), Some(&mut checkout))
            .with_context(|| format!("Failed to check out '{name}'"))?;
        self.repo.set_head(&ref_name)?;
        Ok(())
    }

    fn current_head(&self) -> Result<OriginalHead> {
        let head = self
            .repo
            .head()
            .context("Repository has no checked-out commit")?;

        if head.is_branch()
            && let Some(name) = head.shorthand()
        {
            return Ok(OriginalHead::Branch(name.to_string()));
        }

        let oid = head.target().context("HEAD does not point at a commit")?;
        Ok(OriginalHead::Detached(oid))
    }
}

fn to_record(commit: &Commit<'_>, pattern: Option<&TicketPattern>) -> CommitRecord {
    let author = commit.author();
    let message = String::from_utf8_lossy(commit.message_bytes());

    CommitRecord {
        hash: commit.id().to_string(),
        summary: commit.summary().unwrap_or_default().to_string(),
        author: author.name().unwrap_or("Unknown").to_string(),
        committed_at: signature_time(&author.when()),
        ticket: pattern.and_then(|p| p.extract(&message)),
    }
}

fn signature_time(time: &git2::Time) -> DateTime<FixedOffset> {
    let offset = FixedOffset::east_opt(time.offset_minutes() * 60).unwrap_or(Utc.fix());
    DateTime::from_timestamp(time.seconds(), 0)
        .unwrap_or_default()
        .with_timezone(&offset)
}

fn conflicted_paths(index: &Index) -> Result<Vec<String>> {
    let mut paths = Vec::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let entry = conflict.our.or(conflict.their).or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).into_owned());
        }
    }
    Ok(paths)
}

/// Kahn's algorithm, picking the most recent ready commit at each step
fn ancestors_first(commits: Vec<Commit<'_>>) -> Vec<Commit<'_>> {
    let index: HashMap<Oid, usize> = commits
        .iter()
        .enumerate()
        .map(|(i, commit)| (commit.id(), i))
        .collect();

    let mut pending_parents = vec![0usize; commits.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); commits.len()];
    for (i, commit) in commits.iter().enumerate() {
        for parent in commit.parent_ids() {
            if let Some(&p) = index.get(&parent) {
                pending_parents[i] += 1;
                children[p].push(i);
            }
        }
    }

    let key = |i: usize| (commits[i].time().seconds(), commits[i].id(), i);
    let mut ready: BinaryHeap<(i64, Oid, usize)> = (0..commits.len())
        .filter(|&i| pending_parents[i] == 0)
        .map(key)
        .collect();

    let mut order = Vec::with_capacity(commits.len());
    while let Some((_, _, i)) = ready.pop() {
        order.push(i);
        for &child in &children[i] {
            pending_parents[child] -= 1;
            if pending_parents[child] == 0 {
                ready.push(key(child));
            }
        }
    }

    let mut slots: Vec<Option<Commit<'_>>> = commits.into_iter().map(Some).collect();
    order
        .into_iter()
        .filter_map(|i| slots[i].take())
        .collect()
}
