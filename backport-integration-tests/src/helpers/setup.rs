use anyhow::{Context, Result, bail};
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use crate::cli::RunOptions;

/// Test context that holds temporary directories and configuration
pub struct TestContext {
    temp_dir: Option<TempDir>,
    pub root: PathBuf,
    pub repo_path: PathBuf,
    pub origin_path: PathBuf,
    pub home_dir: PathBuf,
    pub verbose: bool,
    pub keep_temp: bool,
}

impl TestContext {
    /// Create a new test context with temporary directories
    pub fn new(options: RunOptions) -> Result<Self> {
        let temp_dir = if options.keep_temp {
            TempDir::new_in("/tmp")?
        } else {
            TempDir::new()?
        };

        let repo_path = temp_dir.path().join("work");
        let origin_path = temp_dir.path().join("origin.git");
        let home_dir = temp_dir.path().join("home");

        std::fs::create_dir_all(&repo_path)?;
        std::fs::create_dir_all(&home_dir)?;

        if options.verbose {
            println!("  📂 Test directory: {}", temp_dir.path().display());
        }

        Ok(Self {
            root: temp_dir.path().to_path_buf(),
            temp_dir: Some(temp_dir),
            repo_path,
            origin_path,
            home_dir,
            verbose: options.verbose,
            keep_temp: options.keep_temp,
        })
    }

    pub fn repo_arg(&self) -> String {
        self.repo_path.to_string_lossy().to_string()
    }

    /// Path of the settings file the CLI uses under the scratch HOME
    pub fn settings_file(&self) -> PathBuf {
        self.home_dir.join(".config/backport/settings.json")
    }

    /// Run git in the working clone and return trimmed stdout
    pub fn git(&self, args: &[&str]) -> Result<String> {
        git_in(&self.repo_path, args)
    }

    /// `main` and `stable` at a shared base commit, published to a bare origin
    pub fn setup_git_repo(&self) -> Result<()> {
        let origin = self.origin_path.to_string_lossy().to_string();
        git_in(&self.root, &["init", "--bare", "-q", origin.as_str()])?;

        self.git(&["init", "-q"])?;
        self.git(&["symbolic-ref", "HEAD", "refs/heads/main"])?;
        self.git(&["config", "user.email", "test@example.com"])?;
        self.git(&["config", "user.name", "Test User"])?;
        self.git(&["config", "commit.gpgsign", "false"])?;

        self.commit_file("README.md", "base\n", "Initial commit")?;
        self.git(&["branch", "stable"])?;
        self.git(&["remote", "add", "origin", origin.as_str()])?;
        self.push_all()?;

        if self.verbose {
            println!("    ✓ Created git repo with main and stable branches");
        }
        Ok(())
    }

    /// Write `file`, commit it on the current branch and return the commit hash
    pub fn commit_file(&self, file: &str, content: &str, message: &str) -> Result<String> {
        std::fs::write(self.repo_path.join(file), content)?;
        self.git(&["add", file])?;
        self.git(&["commit", "-q", "-m", message])?;
        self.git(&["rev-parse", "HEAD"])
    }

    pub fn push_all(&self) -> Result<()> {
        self.git(&["push", "-q", "origin", "main", "stable"])?;
        Ok(())
    }

    pub fn current_branch(&self) -> Result<String> {
        self.git(&["rev-parse", "--abbrev-ref", "HEAD"])
    }

    /// Local branches whose name starts with `prefix`
    pub fn branches_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let pattern = format!("{prefix}*");
        let output = self.git(&["branch", "--list", pattern.as_str(), "--format=%(refname:short)"])?;
        Ok(output
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect())
    }
}

fn git_in(dir: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

    if !output.status.success() {
        bail!(
            "git {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

impl Drop for TestContext {
    fn drop(&mut self) {
        if self.keep_temp
            && let Some(dir) = self.temp_dir.take()
        {
            println!("  📌 Keeping test directory: {}", dir.into_path().display());
        }
    }
}
