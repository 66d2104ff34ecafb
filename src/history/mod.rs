//! Commit history types and identity normalization
//!
//! The analyzer works on a plain ordered commit list; fetching that list from
//! a repository is the git collector's job.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

mod analyzer;

pub use analyzer::{CommitHistoryAnalyzer, GitMetrics};

/// A single commit as read from repository history. Immutable once read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub author_name: String,
    pub author_email: String,
    pub authored_at: DateTime<Utc>,
    pub message: String,
}

impl Commit {
    /// Normalized author key for contributor counting
    pub fn identity(&self) -> String {
        normalize_identity(&self.author_email)
    }
}

fn github_noreply_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\d+\+(.+)@users\.noreply\.github\.com$").expect("valid noreply regex")
    })
}

/// Normalize an email address to a canonical identity key.
///
/// Only the unambiguous GitHub noreply case is rewritten:
/// `12345+user@users.noreply.github.com` becomes
/// `user@users.noreply.github.com`, so the same human behind a rotating
/// numeric prefix is not double-counted. General emails are lowercased but
/// otherwise preserved; merging by local part falsely merges unrelated people
/// who share common usernames.
pub fn normalize_identity(email: &str) -> String {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return email;
    }

    if let Some(caps) = github_noreply_re().captures(&email) {
        return format!("{}@users.noreply.github.com", &caps[1]);
    }

    email
}

/// Bot marker check used to exclude automation (dependabot, renovate, etc.)
/// from takeover detection.
pub fn is_bot(identity: &str, display_name: &str) -> bool {
    identity.contains("[bot]") || display_name.contains("[bot]")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noreply_prefix_collapsed() {
        assert_eq!(
            normalize_identity("12345+cfconrad@users.noreply.github.com"),
            "cfconrad@users.noreply.github.com"
        );
    }

    #[test]
    fn test_plain_email_lowercased() {
        assert_eq!(normalize_identity("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn test_non_email_passthrough() {
        assert_eq!(normalize_identity("not-an-email"), "not-an-email");
    }

    #[test]
    fn test_noreply_without_prefix_unchanged() {
        assert_eq!(
            normalize_identity("user@users.noreply.github.com"),
            "user@users.noreply.github.com"
        );
    }

    #[test]
    fn test_bot_detection() {
        assert!(is_bot("dependabot[bot]@users.noreply.github.com", ""));
        assert!(is_bot("x@example.com", "renovate[bot]"));
        assert!(!is_bot("alice@example.com", "Alice"));
    }
}
