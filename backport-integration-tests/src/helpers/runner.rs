use anyhow::{Context, Result};
use assert_cmd::Command;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Variables a developer's shell may set that would leak into the tests
const INHERITED_VARS: &[&str] = &[
    "GITHUB_TOKEN",
    "BACKPORT_REPO_PATH",
    "BACKPORT_OWNER",
    "BACKPORT_REPO",
    "BACKPORT_SOURCE",
    "BACKPORT_TARGET",
    "BACKPORT_TICKET_PATTERN",
    "BACKPORT_API_URL",
    "BACKPORT_SETTINGS",
];

/// Runner for backport commands
pub struct BackportRunner {
    verbose: bool,
    home_dir: PathBuf,
}

impl BackportRunner {
    /// Create a new runner with HOME pointed at a scratch directory
    pub fn new(home_dir: &Path, verbose: bool) -> Self {
        Self {
            verbose,
            home_dir: home_dir.to_path_buf(),
        }
    }

    /// Run a backport command with arguments
    pub fn run(&self, args: &[&str]) -> Result<CommandOutput> {
        self.run_with_env(args, vec![])
    }

    /// Run a backport command expecting success
    pub fn run_success(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if !output.success {
            anyhow::bail!(
                "Command failed: backport {}\nstderr: {}\nstdout: {}",
                args.join(" "),
                output.stderr,
                output.stdout
            );
        }
        Ok(output)
    }

    /// Run a backport command expecting failure
    pub fn run_failure(&self, args: &[&str]) -> Result<CommandOutput> {
        let output = self.run(args)?;
        if output.success {
            anyhow::bail!(
                "Command unexpectedly succeeded: backport {}\nstdout: {}",
                args.join(" "),
                output.stdout
            );
        }
        Ok(output)
    }

    /// Run command with custom environment variables
    pub fn run_with_env(&self, args: &[&str], env: Vec<(&str, &str)>) -> Result<CommandOutput> {
        if self.verbose {
            println!("    $ backport {}", args.join(" "));
            for (key, val) in &env {
                println!("      env: {key}={val}");
            }
        }
        debug!("Running backport {args:?}");

        let mut cmd = Command::cargo_bin("backport").context("backport binary not built")?;
        for var in INHERITED_VARS {
            cmd.env_remove(var);
        }
        cmd.args(args)
            .env("HOME", &self.home_dir)
            .env("RUST_LOG", "error");
        for (key, val) in env {
            cmd.env(key, val);
        }

        let output = cmd.output()?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if self.verbose {
            if !result.stderr.is_empty() {
                println!("      stderr: {}", result.stderr.trim());
            }
            if !result.stdout.is_empty() {
                println!("      stdout: {}", result.stdout.trim());
            }
        }

        Ok(result)
    }
}

/// Command output structure
#[derive(Debug)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
    pub exit_code: i32,
}

impl CommandOutput {
    /// Parse stdout as JSON
    pub fn stdout_json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.stdout)
            .with_context(|| format!("Failed to parse JSON from stdout: {}", self.stdout))
    }

    /// Parse stdout as a commit list
    pub fn parse_commits(&self) -> Result<Vec<crate::helpers::CommitEntry>> {
        self.stdout_json()
    }

    /// Parse stdout as a pick result
    pub fn parse_pick(&self) -> Result<crate::helpers::PickOutcome> {
        self.stdout_json()
    }
}
