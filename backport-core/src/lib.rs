pub mod error;
pub mod github;
pub mod orchestrator;
pub mod remote;
pub mod repo;
pub mod settings;
pub mod ticket;
pub mod types;

// Re-export main types and functions for convenience
pub use error::{FailureKind, WorkflowError};
pub use github::{CodeHost, CodeHostSession, GitHubHost, GitHubSession, PullRequestRejected};
pub use orchestrator::{
    CherryPickOrchestrator, ProgressSink, SilentProgress, WorkflowState, build_pr_body,
    default_pr_title, generate_branch_name,
};
pub use remote::{detect_github_repo, parse_github_remote};
pub use repo::RepositoryConnector;
pub use settings::{SettingKey, Settings, get_settings_path};
pub use ticket::{DEFAULT_TICKET_PATTERN, TicketPattern, extract_ticket};
pub use tokio_util::sync::CancellationToken;
pub use types::{
    CherryPickRequest, CherryPickResult, CommitRecord, PullRequestRef, RepositoryConfig,
};
