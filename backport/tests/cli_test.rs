use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

/// `backport` with an isolated settings file and none of our variables inherited
fn backport(settings: &Path) -> Result<Command> {
    let mut cmd = Command::cargo_bin("backport")?;
    for var in [
        "GITHUB_TOKEN",
        "BACKPORT_REPO_PATH",
        "BACKPORT_OWNER",
        "BACKPORT_REPO",
        "BACKPORT_SOURCE",
        "BACKPORT_TARGET",
        "BACKPORT_TICKET_PATTERN",
        "BACKPORT_API_URL",
        "RUST_LOG",
    ] {
        cmd.env_remove(var);
    }
    cmd.env("BACKPORT_SETTINGS", settings);
    Ok(cmd)
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("pick"))
        .stdout(predicate::str::contains("commits"))
        .stdout(predicate::str::contains("validate-token"))
        .stdout(predicate::str::contains("validate-repo"))
        .stdout(predicate::str::contains("config"));
    Ok(())
}

#[test]
fn test_config_path_uses_override() -> Result<()> {
    let dir = TempDir::new()?;
    let settings = dir.path().join("settings.json");

    backport(&settings)?
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains(settings.display().to_string()));
    Ok(())
}

#[test]
fn test_config_set_show_unset() -> Result<()> {
    let dir = TempDir::new()?;
    let settings = dir.path().join("nested").join("settings.json");

    backport(&settings)?
        .args(["config", "set", "owner", "octo"])
        .assert()
        .success();
    backport(&settings)?
        .args(["config", "set", "target-branch", "release/2.3"])
        .assert()
        .success();

    let output = backport(&settings)?
        .args(["config", "show", "--json"])
        .output()?;
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["owner"], "octo");
    assert_eq!(json["target_branch"], "release/2.3");
    assert!(json.get("repo").is_none());

    backport(&settings)?
        .args(["config", "unset", "owner"])
        .assert()
        .success();
    backport(&settings)?
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::is_match(r"owner\s+\(not set\)")?)
        .stdout(predicate::str::contains("release/2.3"));
    Ok(())
}

#[test]
fn test_config_rejects_bad_input() -> Result<()> {
    let dir = TempDir::new()?;
    let settings = dir.path().join("settings.json");

    backport(&settings)?
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure();
    backport(&settings)?
        .args(["config", "set", "ticket-pattern", "(unclosed"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid ticket pattern"));
    assert!(!settings.exists());
    Ok(())
}

#[test]
fn test_pick_requires_commits() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .args(["pick", "--owner", "octo", "--repo", "widgets", "--token", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--commit"));
    Ok(())
}

#[test]
fn test_pick_outside_repository() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .args(["pick", "--owner", "octo", "--repo", "widgets", "--token", "x"])
        .args(["--commit", "abc1234"])
        .arg("--repo-path")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not open repository"));
    Ok(())
}

#[test]
fn test_pick_needs_github_repository() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .args(["pick", "--token", "x", "--commit", "abc1234"])
        .arg("--repo-path")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("--owner and --repo"));
    Ok(())
}

#[test]
fn test_commits_outside_repository() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .arg("commits")
        .arg("--repo-path")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Could not open repository"));
    Ok(())
}

#[test]
fn test_commits_rejects_conflicting_filters() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .args(["commits", "--search", "fix", "--from", "2025-01-01"])
        .assert()
        .failure();
    backport(&dir.path().join("settings.json"))?
        .args(["commits", "--to", "2025-01-01"])
        .assert()
        .failure();
    Ok(())
}

#[test]
fn test_validate_token_rejects_blank_token() -> Result<()> {
    let dir = TempDir::new()?;
    backport(&dir.path().join("settings.json"))?
        .args(["validate-token", "--token", "  "])
        .assert()
        .failure()
        .stdout(predicate::str::contains("GitHub token is required"));
    Ok(())
}
