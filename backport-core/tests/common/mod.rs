#![allow(dead_code)]

use anyhow::{Context, Result};
use async_trait::async_trait;
use backport_core::{CodeHost, CodeHostSession, PullRequestRef, PullRequestRejected};
use git2::{BranchType, Oid, Repository, RepositoryInitOptions, Signature};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// A working clone plus the bare repository it uses as `origin`
///
/// History: `main` and `stable` both start at `base`, where `a.txt` contains
/// "base". `stable` then gets a commit rewriting `a.txt` to "stable".
pub struct Fixture {
    _dir: TempDir,
    pub work: PathBuf,
    pub origin: PathBuf,
    pub base: Oid,
}

impl Fixture {
    pub fn new() -> Result<Self> {
        let dir = TempDir::new()?;
        let work = dir.path().join("work");
        let origin = dir.path().join("origin.git");

        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        let repo = Repository::init_opts(&work, &options)?;
        {
            let mut config = repo.config()?;
            config.set_str("user.name", "Backport Tester")?;
            config.set_str("user.email", "tester@example.com")?;
        }

        let base = commit_file(&repo, "a.txt", "base\n", "Initial commit")?;
        {
            let base_commit = repo.find_commit(base)?;
            repo.branch("stable", &base_commit, false)?;
        }

        Repository::init_bare(&origin)?;
        repo.remote("origin", origin.to_str().context("non UTF-8 temp path")?)?;

        let fixture = Self {
            _dir: dir,
            work,
            origin,
            base,
        };

        fixture.on_branch("stable", |repo| {
            commit_file(repo, "a.txt", "stable\n", "Stable-only change")
        })?;
        fixture.publish(&["main", "stable"])?;
        Ok(fixture)
    }

    pub fn repo(&self) -> Result<Repository> {
        Ok(Repository::open(&self.work)?)
    }

    /// Commit on `main` (the checked-out branch)
    pub fn commit(&self, file: &str, content: &str, message: &str) -> Result<Oid> {
        commit_file(&self.repo()?, file, content, message)
    }

    /// Run `f` with `branch` checked out, then return to `main`
    pub fn on_branch<T>(&self, branch: &str, f: impl FnOnce(&Repository) -> Result<T>) -> Result<T> {
        let repo = self.repo()?;
        checkout(&repo, branch)?;
        let result = f(&repo);
        checkout(&repo, "main")?;
        result
    }

    /// Push local branches to the bare origin
    pub fn publish(&self, branches: &[&str]) -> Result<()> {
        let repo = self.repo()?;
        let mut remote = repo.find_remote("origin")?;
        let refspecs: Vec<String> = branches
            .iter()
            .map(|b| format!("+refs/heads/{b}:refs/heads/{b}"))
            .collect();
        remote.push(&refspecs, None)?;
        Ok(())
    }

    pub fn head_branch(&self) -> Result<Option<String>> {
        let repo = self.repo()?;
        let head = repo.head()?;
        Ok(head.shorthand().map(str::to_string))
    }

    pub fn local_branches(&self) -> Result<Vec<String>> {
        branch_names(&self.repo()?)
    }

    pub fn origin_branches(&self) -> Result<Vec<String>> {
        branch_names(&Repository::open_bare(&self.origin)?)
    }

    /// Messages from the tip of `branch` down to (not including) `base`
    pub fn messages_since_base(&self, repo_path: &Path, branch: &str) -> Result<Vec<String>> {
        let repo = Repository::open(repo_path)?;
        let tip = repo
            .find_branch(branch, BranchType::Local)?
            .get()
            .peel_to_commit()?;
        let mut walk = repo.revwalk()?;
        walk.push(tip.id())?;
        walk.hide(self.base)?;
        let mut messages = Vec::new();
        for oid in walk {
            let commit = repo.find_commit(oid?)?;
            messages.push(commit.summary().unwrap_or_default().to_string());
        }
        Ok(messages)
    }
}

pub fn commit_file(repo: &Repository, file: &str, content: &str, message: &str) -> Result<Oid> {
    let workdir = repo.workdir().context("bare repository")?;
    fs::write(workdir.join(file), content)?;

    let mut index = repo.index()?;
    index.add_path(Path::new(file))?;
    index.write()?;
    let tree = repo.find_tree(index.write_tree()?)?;

    let signature = Signature::now("Backport Tester", "tester@example.com")?;
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

    Ok(repo.commit(
        Some("HEAD"),
        &signature,
        &signature,
        message,
        &tree,
        &parents,
    )?)
}

fn checkout(repo: &Repository, branch: &str) -> Result<()> {
    let reference = repo.find_branch(branch, BranchType::Local)?.into_reference();
    let commit = reference.peel_to_commit()?;
    repo.checkout_tree(
        commit.as_object(),
        Some(git2::build::CheckoutBuilder::new().force()),
    )?;
    repo.set_head(reference.name().context("non UTF-8 ref")?)?;
    Ok(())
}

fn branch_names(repo: &Repository) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for branch in repo.branches(Some(BranchType::Local))? {
        let (branch, _) = branch?;
        if let Some(name) = branch.name()? {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}

/// Code host double that records every call
#[derive(Clone, Default)]
pub struct FakeHost {
    pub calls: Arc<Mutex<Vec<String>>>,
    pub reject_token: bool,
    pub reject_pull_request: bool,
    pub auth_delay: Option<Duration>,
}

impl FakeHost {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl CodeHost for FakeHost {
    fn initialize(&self, credential: &str) -> Result<Box<dyn CodeHostSession>> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("initialize {credential}"));
        Ok(Box::new(self.clone()))
    }
}

#[async_trait]
impl CodeHostSession for FakeHost {
    async fn validate_credential(&self) -> bool {
        self.calls.lock().unwrap().push("validate_credential".into());
        if let Some(delay) = self.auth_delay {
            tokio::time::sleep(delay).await;
        }
        !self.reject_token
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
        self.calls.lock().unwrap().push(format!(
            "create_pull_request {owner}/{repo} {head_branch} -> {base_branch}\n{title}\n{body}"
        ));
        if self.reject_pull_request {
            return Err(PullRequestRejected("A pull request already exists".into()).into());
        }
        Ok(PullRequestRef {
            number: 42,
            url: format!("https://github.com/{owner}/{repo}/pull/42"),
        })
    }

    async fn validate_repository(&self, owner: &str, repo: &str) -> bool {
        self.calls
            .lock()
            .unwrap()
            .push(format!("validate_repository {owner}/{repo}"));
        true
    }
}
