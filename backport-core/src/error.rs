use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::types::CommitRecord;

/// Coarse classification of a workflow failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FailureKind {
    RepositoryUnavailable,
    AuthenticationFailure,
    NetworkFailure,
    ConflictFailure,
    RemoteRejection,
    Cancelled,
    WorkingTreeBusy,
}

/// Why a cherry-pick workflow stopped
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{0}")]
    RepositoryUnavailable(String),

    #[error("GitHub token is required")]
    MissingCredential,

    #[error("Invalid GitHub token")]
    InvalidCredential,

    #[error("{0}")]
    Network(String),

    #[error(
        "Cherry-pick failed on commit '{short}': {summary}",
        short = .commit.short_hash(),
        summary = .commit.summary
    )]
    Conflict { commit: Box<CommitRecord> },

    #[error("{0}")]
    RemoteRejection(String),

    #[error("Cherry-pick workflow cancelled")]
    Cancelled,

    #[error("A cherry-pick workflow is already running for '{}'", .0.display())]
    Busy(PathBuf),
}

impl WorkflowError {
    pub fn open_failed(path: &Path) -> Self {
        Self::RepositoryUnavailable(format!(
            "Could not open repository at '{path}'",
            path = path.display()
        ))
    }

    pub fn conflict(commit: CommitRecord) -> Self {
        Self::Conflict {
            commit: Box::new(commit),
        }
    }

    /// Repository-side failure, keeping the whole context chain in the message
    pub fn repository(err: anyhow::Error) -> Self {
        Self::RepositoryUnavailable(format!("{err:#}"))
    }

    pub fn network(err: anyhow::Error) -> Self {
        Self::Network(format!("{err:#}"))
    }

    pub fn remote_rejection(err: anyhow::Error) -> Self {
        Self::RemoteRejection(format!("{err:#}"))
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::RepositoryUnavailable(_) => FailureKind::RepositoryUnavailable,
            Self::MissingCredential | Self::InvalidCredential => {
                FailureKind::AuthenticationFailure
            }
            Self::Network(_) => FailureKind::NetworkFailure,
            Self::Conflict { .. } => FailureKind::ConflictFailure,
            Self::RemoteRejection(_) => FailureKind::RemoteRejection,
            Self::Cancelled => FailureKind::Cancelled,
            Self::Busy(_) => FailureKind::WorkingTreeBusy,
        }
    }

    pub fn failed_commit(&self) -> Option<&CommitRecord> {
        match self {
            Self::Conflict { commit } => Some(commit),
            _ => None,
        }
    }

    pub fn into_failed_commit(self) -> Option<CommitRecord> {
        match self {
            Self::Conflict { commit } => Some(*commit),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    #[test]
    fn test_failure_kind_display() {
        assert_eq!(
            FailureKind::AuthenticationFailure.to_string(),
            "authentication_failure"
        );
        assert_eq!(FailureKind::WorkingTreeBusy.to_string(), "working_tree_busy");
        assert_eq!(
            "conflict_failure".parse::<FailureKind>().unwrap(),
            FailureKind::ConflictFailure
        );
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            WorkflowError::open_failed(Path::new("/srv/missing")).to_string(),
            "Could not open repository at '/srv/missing'"
        );
        assert_eq!(
            WorkflowError::MissingCredential.to_string(),
            "GitHub token is required"
        );
        assert_eq!(
            WorkflowError::InvalidCredential.to_string(),
            "Invalid GitHub token"
        );
        assert_eq!(
            WorkflowError::Busy(PathBuf::from("/srv/repo")).to_string(),
            "A cherry-pick workflow is already running for '/srv/repo'"
        );
    }

    #[test]
    fn test_context_chain_is_kept() {
        let err = anyhow!("connection refused").context("Failed to push branch 'x'");
        let wrapped = WorkflowError::network(err);
        assert_eq!(wrapped.kind(), FailureKind::NetworkFailure);
        assert_eq!(
            wrapped.to_string(),
            "Failed to push branch 'x': connection refused"
        );
    }

    #[test]
    fn test_kinds() {
        assert_eq!(
            WorkflowError::MissingCredential.kind(),
            FailureKind::AuthenticationFailure
        );
        assert_eq!(
            WorkflowError::remote_rejection(anyhow!("A pull request already exists")).kind(),
            FailureKind::RemoteRejection
        );
        assert_eq!(WorkflowError::Cancelled.kind(), FailureKind::Cancelled);
        assert!(WorkflowError::Cancelled.failed_commit().is_none());
    }
}
