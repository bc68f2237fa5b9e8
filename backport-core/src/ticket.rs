use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};
use tracing::debug;

/// Ticket IDs look like `betty-1234` unless the caller says otherwise
pub const DEFAULT_TICKET_PATTERN: &str = r"betty-\d+";

/// A compiled, case-insensitive ticket pattern
#[derive(Debug, Clone)]
pub struct TicketPattern {
    regex: Regex,
}

impl TicketPattern {
    pub fn new(pattern: &str) -> Result<Self> {
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .with_context(|| format!("Invalid ticket pattern '{pattern}'"))?;
        Ok(Self { regex })
    }

    /// Literal text of the first match in `message`
    pub fn extract(&self, message: &str) -> Option<String> {
        self.regex.find(message).map(|m| m.as_str().to_string())
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Extract a ticket ID from a commit message
///
/// Returns `None` when there is no pattern, the pattern does not compile, or
/// nothing matches.
pub fn extract_ticket(message: &str, pattern: Option<&str>) -> Option<String> {
    let pattern = pattern.filter(|p| !p.is_empty())?;
    match TicketPattern::new(pattern) {
        Ok(compiled) => compiled.extract(message),
        Err(e) => {
            debug!("Skipping ticket extraction: {e:#}");
            None
        }
    }
}
