use serde::Deserialize;

/// One entry of `backport commits --json`
#[derive(Debug, Clone, Deserialize)]
pub struct CommitEntry {
    pub hash: String,
    pub summary: String,
    pub author: String,
    pub committed_at: String,
    pub ticket: Option<String>,
}

impl CommitEntry {
    /// Find a commit by summary in a list
    pub fn find_by_summary<'a>(commits: &'a [CommitEntry], summary: &str) -> Option<&'a CommitEntry> {
        commits.iter().find(|c| c.summary == summary)
    }
}

/// The result printed by `backport pick --output json`
#[derive(Debug, Clone, Deserialize)]
pub struct PickOutcome {
    pub success: bool,
    pub branch_name: Option<String>,
    pub pull_request_url: Option<String>,
    pub error_message: Option<String>,
    pub error_kind: Option<String>,
    pub failed_commit: Option<CommitEntry>,
}
