use anyhow::{Context, Result};
use regex::Regex;

/// Assert that a string contains another string
pub fn assert_contains(haystack: &str, needle: &str, message: &str) -> Result<()> {
    if !haystack.contains(needle) {
        anyhow::bail!(
            "{}\nExpected to contain: '{}'\nActual: '{}'",
            message,
            needle,
            haystack
        );
    }
    Ok(())
}

/// Assert that a string matches a regex pattern
pub fn assert_matches(text: &str, pattern: &str, message: &str) -> Result<()> {
    let re = Regex::new(pattern).context("Invalid regex pattern")?;
    if !re.is_match(text) {
        anyhow::bail!(
            "{}\nExpected to match pattern: '{}'\nActual: '{}'",
            message,
            pattern,
            text
        );
    }
    Ok(())
}

/// Assert that two values are equal
pub fn assert_eq_with<T: PartialEq + std::fmt::Debug>(
    actual: T,
    expected: T,
    message: &str,
) -> Result<()> {
    if actual != expected {
        anyhow::bail!("{message}\nExpected: {expected:?}\nActual: {actual:?}");
    }
    Ok(())
}

/// Assert that a file contains text
pub fn assert_file_contains(path: &std::path::Path, text: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    if !content.contains(text) {
        anyhow::bail!(
            "File {} does not contain expected text: '{}'",
            path.display(),
            text
        );
    }

    Ok(())
}

/// Assert that the process exited with `code`
pub fn assert_exit_code(output: &crate::helpers::CommandOutput, code: i32) -> Result<()> {
    if output.exit_code != code {
        anyhow::bail!(
            "Expected exit code {code}, got {}\nstderr: {}",
            output.exit_code,
            output.stderr
        );
    }
    Ok(())
}
