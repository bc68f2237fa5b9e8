use anyhow::{Result, bail};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use crate::error::{FailureKind, WorkflowError};
use crate::ticket::DEFAULT_TICKET_PATTERN;

pub const DEFAULT_SOURCE_BRANCH: &str = "main";
pub const DEFAULT_TARGET_BRANCH: &str = "stable";

const SHORT_HASH_LEN: usize = 7;

/// A commit as shown to the user and handed to the cherry-pick workflow
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub hash: String,
    pub summary: String,
    pub author: String,
    pub committed_at: DateTime<FixedOffset>,
    pub ticket: Option<String>,
}

impl CommitRecord {
    /// First seven characters of the hash, or the whole hash if shorter
    pub fn short_hash(&self) -> &str {
        match self.hash.char_indices().nth(SHORT_HASH_LEN) {
            Some((idx, _)) => &self.hash[..idx],
            None => &self.hash,
        }
    }
}

// Identity is the full hash only.
impl PartialEq for CommitRecord {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
    }
}

impl Eq for CommitRecord {}

impl Hash for CommitRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.hash.hash(state);
    }
}

/// Repository and workflow settings for a single request
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    pub local_path: PathBuf,
    pub owner: String,
    pub repo_name: String,
    pub source_branch: String,
    pub target_branch: String,
    pub credential: Option<String>,
    pub ticket_pattern: String,
}

impl RepositoryConfig {
    pub fn new(
        local_path: impl Into<PathBuf>,
        owner: impl Into<String>,
        repo_name: impl Into<String>,
    ) -> Self {
        Self {
            local_path: local_path.into(),
            owner: owner.into(),
            repo_name: repo_name.into(),
            source_branch: DEFAULT_SOURCE_BRANCH.to_string(),
            target_branch: DEFAULT_TARGET_BRANCH.to_string(),
            credential: None,
            ticket_pattern: DEFAULT_TICKET_PATTERN.to_string(),
        }
    }

    /// The credential, if one was supplied and is not blank
    pub fn credential(&self) -> Option<&str> {
        self.credential
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
    }
}

/// Commits to backport plus the metadata of the pull request to open
#[derive(Debug, Clone)]
pub struct CherryPickRequest {
    pub config: RepositoryConfig,
    commits: Vec<CommitRecord>,
    pub branch_name: Option<String>,
    pub pr_title: String,
    pub pr_description: Option<String>,
}

impl CherryPickRequest {
    /// Build a request; commits are applied in the given order
    pub fn new(
        config: RepositoryConfig,
        commits: Vec<CommitRecord>,
        pr_title: impl Into<String>,
    ) -> Result<Self> {
        if commits.is_empty() {
            bail!("At least one commit is required to cherry-pick");
        }

        Ok(Self {
            config,
            commits,
            branch_name: None,
            pr_title: pr_title.into(),
            pr_description: None,
        })
    }

    pub fn with_branch_name(mut self, name: impl Into<String>) -> Self {
        self.branch_name = Some(name.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.pr_description = Some(description.into());
        self
    }

    pub fn commits(&self) -> &[CommitRecord] {
        &self.commits
    }
}

/// A pull request opened on the code host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
    pub url: String,
}

/// Outcome of one cherry-pick workflow
///
/// Built only through [`CherryPickResult::succeeded`] and
/// [`CherryPickResult::failed`], so a successful result always carries the
/// branch and pull request and a failed one always carries an error message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CherryPickResult {
    success: bool,
    branch_name: Option<String>,
    pull_request_url: Option<String>,
    pull_request_number: Option<u64>,
    error_message: Option<String>,
    error_kind: Option<FailureKind>,
    failed_commit: Option<CommitRecord>,
}

impl CherryPickResult {
    pub fn succeeded(branch_name: impl Into<String>, pull_request: PullRequestRef) -> Self {
        Self {
            success: true,
            branch_name: Some(branch_name.into()),
            pull_request_url: Some(pull_request.url),
            pull_request_number: Some(pull_request.number),
            error_message: None,
            error_kind: None,
            failed_commit: None,
        }
    }

    pub fn failed(error: WorkflowError) -> Self {
        let kind = error.kind();
        let message = error.to_string();
        let failed_commit = error.into_failed_commit();

        Self {
            success: false,
            branch_name: None,
            pull_request_url: None,
            pull_request_number: None,
            error_message: Some(message),
            error_kind: Some(kind),
            failed_commit,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch_name.as_deref()
    }

    pub fn pull_request_url(&self) -> Option<&str> {
        self.pull_request_url.as_deref()
    }

    pub fn pull_request_number(&self) -> Option<u64> {
        self.pull_request_number
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn error_kind(&self) -> Option<FailureKind> {
        self.error_kind
    }

    pub fn failed_commit(&self) -> Option<&CommitRecord> {
        self.failed_commit.as_ref()
    }
}
