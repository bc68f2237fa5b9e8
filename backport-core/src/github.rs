//! Code host access
//!
//! [`CodeHost::initialize`] binds a credential and hands back a
//! [`CodeHostSession`]; every remote operation goes through that session, so
//! the credential is scoped to the request that supplied it.

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use octocrab::Octocrab;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::types::PullRequestRef;

/// Default timeout for every GitHub API request
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The code host refused the pull request (duplicate, missing branch,
/// permissions). Network and transport failures are reported separately.
#[derive(Debug, Error)]
#[error("GitHub rejected the pull request: {0}")]
pub struct PullRequestRejected(pub String);

/// Client errors that retrying cannot fix; auth and rate-limit responses excluded
fn is_rejection_status(status: u16) -> bool {
    (400..500).contains(&status) && status != 401 && status != 429
}

/// A remote code host that pull requests are opened on
pub trait CodeHost: Send + Sync {
    /// Bind a session to `credential`
    fn initialize(&self, credential: &str) -> Result<Box<dyn CodeHostSession>>;
}

/// Operations available once a credential has been bound
#[async_trait]
pub trait CodeHostSession: Send + Sync {
    /// Look up the authenticated user; any failure means `false`
    async fn validate_credential(&self) -> bool;

    /// Open exactly one pull request from `head_branch` into `base_branch`
    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PullRequestRef>;

    /// Check that `owner/repo` exists and is readable; any failure means `false`
    async fn validate_repository(&self, owner: &str, repo: &str) -> bool;
}

/// GitHub (or GitHub Enterprise) through octocrab
#[derive(Debug, Clone)]
pub struct GitHubHost {
    base_uri: Option<String>,
    timeout: Duration,
}

impl Default for GitHubHost {
    fn default() -> Self {
        Self::new()
    }
}

impl GitHubHost {
    pub fn new() -> Self {
        Self {
            base_uri: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Use a different API root, e.g. `https://ghe.example.com/api/v3`
    pub fn with_base_uri(mut self, base_uri: impl Into<String>) -> Self {
        self.base_uri = Some(base_uri.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl CodeHost for GitHubHost {
    fn initialize(&self, credential: &str) -> Result<Box<dyn CodeHostSession>> {
        if credential.trim().is_empty() {
            bail!("GitHub token is required");
        }

        let mut builder = Octocrab::builder()
            .personal_token(credential.to_string())
            .set_connect_timeout(Some(self.timeout))
            .set_read_timeout(Some(self.timeout))
            .set_write_timeout(Some(self.timeout));

        if let Some(uri) = &self.base_uri {
            builder = builder
                .base_uri(uri.as_str())
                .with_context(|| format!("Invalid GitHub API URL '{uri}'"))?;
        }

        let octocrab = builder.build().context("Failed to build GitHub client")?;
        debug!(
            "GitHub client ready for {}",
            self.base_uri.as_deref().unwrap_or("https://api.github.com")
        );

        Ok(Box::new(GitHubSession {
            octocrab: Arc::new(octocrab),
        }))
    }
}

/// A GitHub client bound to one credential
#[derive(Debug, Clone)]
pub struct GitHubSession {
    octocrab: Arc<Octocrab>,
}

#[async_trait]
impl CodeHostSession for GitHubSession {
    async fn validate_credential(&self) -> bool {
        match self.octocrab.current().user().await {
            Ok(user) => {
                debug!("Authenticated as {}", user.login);
                true
            }
            Err(e) => {
                warn!("GitHub token validation failed: {e}");
                false
            }
        }
    }

    async fn create_pull_request(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: &str,
        head_branch: &str,
        base_branch: &str,
    ) -> Result<PullRequestRef> {
        debug!("Creating PR {owner}/{repo}: {head_branch} -> {base_branch}");

        let pulls = self.octocrab.pulls(owner, repo);
        let pr = match pulls
            .create(title, head_branch, base_branch)
            .body(body)
            .send()
            .await
        {
            Ok(pr) => pr,
            Err(octocrab::Error::GitHub { source, .. })
                if is_rejection_status(source.status_code.as_u16()) =>
            {
                let details: Vec<String> = source
                    .errors
                    .iter()
                    .flatten()
                    .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                    .map(str::to_string)
                    .collect();
                let reason = if details.is_empty() {
                    source.message.clone()
                } else {
                    format!("{}: {}", source.message, details.join("; "))
                };
                return Err(PullRequestRejected(reason).into());
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("Failed to create pull request on {owner}/{repo}")));
            }
        };

        let url = pr
            .html_url
            .map(|u| u.to_string())
            .context("GitHub did not return a pull request URL")?;

        info!("Created pull request #{} at {url}", pr.number);
        Ok(PullRequestRef {
            number: pr.number,
            url,
        })
    }

    async fn validate_repository(&self, owner: &str, repo: &str) -> bool {
        match self.octocrab.repos(owner, repo).get().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Repository {owner}/{repo} is not accessible: {e}");
                false
            }
        }
    }
}
