//! Point-in-time governance metrics from a commit list
//!
//! Pure computation: the same commit list and `as_of` timestamp always yield
//! the same `GitMetrics`. No network or disk access happens here.

use ahash::{HashMap, HashMapExt};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::history::{is_bot, Commit};
use crate::scoring::ScoringConfig;

/// Derived governance metrics for a repository as of a given date
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitMetrics {
    pub total_commits: usize,
    pub commits_last_year: usize,
    pub unique_contributors: usize,
    /// Share of last-year commits by the single largest contributor (0-100).
    /// 100 when the recent window is empty: no activity reads as maximal
    /// concentration by convention, not as an error.
    pub concentration_last_year: f64,
    pub top_contributor_identity: String,
    pub top_contributor_name: String,
    pub top_contributor_commits: usize,
    pub first_commit_date: Option<DateTime<Utc>>,
    pub last_commit_date: Option<DateTime<Utc>>,

    // Lifetime stats and maturity classification
    pub lifetime_contributors: usize,
    pub lifetime_concentration: f64,
    pub is_mature: bool,
    pub repo_age_years: f64,

    // Takeover-shift detection (percentage points; 0 when no signal)
    pub takeover_shift: f64,
    pub takeover_suspect_identity: String,
    pub takeover_suspect_name: String,

    /// Messages of commits in the recent window, for sentiment analysis at
    /// the same cutoff.
    pub recent_messages: Vec<String>,
}

/// Derives `GitMetrics` from an ordered commit list and an `as_of` timestamp.
///
/// The caller hands over the full, unfiltered history; windowing is done
/// here so that replaying past cutoffs stays consistent with live scoring.
pub struct CommitHistoryAnalyzer {
    config: ScoringConfig,
}

impl CommitHistoryAnalyzer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Compute metrics as of the given date.
    ///
    /// Commits authored after `as_of` are ignored entirely, which is what
    /// makes synthetic-cutoff replay equivalent to having run the analysis
    /// on that date.
    pub fn analyze(&self, commits: &[Commit], as_of: DateTime<Utc>) -> GitMetrics {
        let mut lifetime: Vec<&Commit> = commits.iter().filter(|c| c.authored_at <= as_of).collect();
        lifetime.sort_by_key(|c| c.authored_at);

        if lifetime.is_empty() {
            return GitMetrics {
                concentration_last_year: 100.0,
                lifetime_concentration: 100.0,
                ..GitMetrics::default()
            };
        }

        let first_commit_date = lifetime[0].authored_at;
        let last_commit_date = lifetime[lifetime.len() - 1].authored_at;
        let one_year_ago = as_of - Duration::days(365);

        // Lifetime stats over everything up to as_of
        let mut lifetime_counts: HashMap<String, usize> = HashMap::new();
        for commit in &lifetime {
            *lifetime_counts.entry(commit.identity()).or_insert(0) += 1;
        }
        let lifetime_contributors = lifetime_counts.len();
        let lifetime_concentration = modal_share(&lifetime_counts, lifetime.len())
            .map(|(_, share)| share)
            .unwrap_or(100.0);

        // Recent window: last 365 days before as_of
        let recent: Vec<&&Commit> = lifetime
            .iter()
            .filter(|c| c.authored_at >= one_year_ago)
            .collect();
        let total_recent = recent.len();

        let mut recent_counts: HashMap<String, usize> = HashMap::new();
        let mut recent_names: HashMap<String, String> = HashMap::new();
        for commit in &recent {
            let identity = commit.identity();
            *recent_counts.entry(identity.clone()).or_insert(0) += 1;
            recent_names.insert(identity, commit.author_name.clone());
        }
        let unique_contributors = recent_counts.len();

        let (top_identity, concentration, top_commits) =
            match modal_share(&recent_counts, total_recent) {
                Some((identity, share)) => {
                    let count = recent_counts[&identity];
                    (identity, share, count)
                }
                // No commits in the window: maximum concentration (abandoned)
                None => (String::new(), 100.0, 0),
            };

        // Maturity: age, substance, and recent existence must all hold.
        // Age alone does not imply substance, commit count alone does not
        // imply longevity, and either without a commit in the last five
        // years means "dead", which is scored as abandonment.
        let repo_age_years = (as_of - first_commit_date).num_days() as f64 / 365.25;
        let days_since_last_commit = (as_of - last_commit_date).num_days();
        let is_mature = repo_age_years >= self.config.mature_min_age_years
            && lifetime.len() >= self.config.mature_min_commits
            && days_since_last_commit < self.config.mature_recency_days;

        // Takeover detection: a formerly marginal contributor suddenly
        // dominating the recent window (the xz-utils pattern). Established
        // maintainers whose share naturally drifts are excluded via the
        // historical-share floor.
        let mut takeover_shift = 0.0;
        let mut takeover_suspect_identity = String::new();
        let mut takeover_suspect_name = String::new();

        if is_mature && total_recent >= self.config.takeover_min_recent_commits {
            let hist_total = lifetime.len() - total_recent;
            let mut hist_counts: HashMap<String, usize> = HashMap::new();
            for commit in &lifetime {
                if commit.authored_at < one_year_ago {
                    *hist_counts.entry(commit.identity()).or_insert(0) += 1;
                }
            }

            // Deterministic iteration order so replays are bit-identical
            let mut identities: Vec<&String> = recent_counts.keys().collect();
            identities.sort();

            for identity in identities {
                let name = recent_names.get(identity).cloned().unwrap_or_default();
                if is_bot(identity, &name) {
                    continue;
                }

                let recent_pct = recent_counts[identity] as f64 / total_recent as f64 * 100.0;
                let hist_pct = if hist_total > 0 {
                    hist_counts.get(identity).copied().unwrap_or(0) as f64 / hist_total as f64
                        * 100.0
                } else {
                    0.0
                };

                if hist_pct >= self.config.takeover_historical_floor {
                    continue;
                }

                let shift = recent_pct - hist_pct;
                if shift > takeover_shift {
                    takeover_shift = shift;
                    takeover_suspect_identity = identity.clone();
                    takeover_suspect_name = name;
                }
            }
        }

        let recent_messages = recent.iter().map(|c| c.message.clone()).collect();

        GitMetrics {
            total_commits: lifetime.len(),
            commits_last_year: total_recent,
            unique_contributors,
            concentration_last_year: concentration,
            top_contributor_identity: top_identity.clone(),
            top_contributor_name: recent_names.get(&top_identity).cloned().unwrap_or_default(),
            top_contributor_commits: top_commits,
            first_commit_date: Some(first_commit_date),
            last_commit_date: Some(last_commit_date),
            lifetime_contributors,
            lifetime_concentration,
            is_mature,
            repo_age_years,
            takeover_shift,
            takeover_suspect_identity,
            takeover_suspect_name,
            recent_messages,
        }
    }
}

/// Modal contributor and their percentage share. Ties break on identity so
/// results are deterministic regardless of map iteration order.
fn modal_share(counts: &HashMap<String, usize>, total: usize) -> Option<(String, f64)> {
    if total == 0 || counts.is_empty() {
        return None;
    }

    let (identity, count) = counts
        .iter()
        .max_by(|a, b| a.1.cmp(b.1).then_with(|| b.0.cmp(a.0)))?;

    Some((identity.clone(), *count as f64 / total as f64 * 100.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit(email: &str, name: &str, days_before: i64, as_of: DateTime<Utc>) -> Commit {
        Commit {
            sha: format!("{email}-{days_before}"),
            author_name: name.to_string(),
            author_email: email.to_string(),
            authored_at: as_of - Duration::days(days_before),
            message: "update".to_string(),
        }
    }

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
    }

    fn analyzer() -> CommitHistoryAnalyzer {
        CommitHistoryAnalyzer::new(ScoringConfig::default())
    }

    #[test]
    fn test_empty_history_is_maximal_concentration() {
        let metrics = analyzer().analyze(&[], as_of());
        assert_eq!(metrics.concentration_last_year, 100.0);
        assert_eq!(metrics.commits_last_year, 0);
        assert!(!metrics.is_mature);
    }

    #[test]
    fn test_empty_recent_window_defaults_to_100() {
        // Plenty of lifetime history but nothing in the last year
        let now = as_of();
        let commits: Vec<Commit> = (0..40)
            .map(|i| commit("alice@example.com", "Alice", 400 + i * 10, now))
            .collect();

        let metrics = analyzer().analyze(&commits, now);
        assert_eq!(metrics.commits_last_year, 0);
        assert_eq!(metrics.concentration_last_year, 100.0);
        assert!(metrics.lifetime_concentration > 99.0);
    }

    #[test]
    fn test_concentration_is_modal_share() {
        let now = as_of();
        let mut commits = Vec::new();
        for i in 0..6 {
            commits.push(commit("alice@example.com", "Alice", 10 + i, now));
        }
        for i in 0..4 {
            commits.push(commit("bob@example.com", "Bob", 20 + i, now));
        }

        let metrics = analyzer().analyze(&commits, now);
        assert_eq!(metrics.commits_last_year, 10);
        assert_eq!(metrics.unique_contributors, 2);
        assert!((metrics.concentration_last_year - 60.0).abs() < 1e-9);
        assert_eq!(metrics.top_contributor_identity, "alice@example.com");
    }

    #[test]
    fn test_commits_after_as_of_are_ignored() {
        let now = as_of();
        let mut commits = vec![commit("alice@example.com", "Alice", 10, now)];
        // Authored in the "future" relative to the cutoff
        commits.push(commit("mallory@example.com", "Mallory", -10, now));

        let metrics = analyzer().analyze(&commits, now);
        assert_eq!(metrics.total_commits, 1);
        assert_eq!(metrics.top_contributor_identity, "alice@example.com");
    }

    #[test]
    fn test_noreply_identities_merge() {
        let now = as_of();
        let commits = vec![
            commit("123+dev@users.noreply.github.com", "Dev", 5, now),
            commit("456+dev@users.noreply.github.com", "Dev", 6, now),
        ];

        let metrics = analyzer().analyze(&commits, now);
        assert_eq!(metrics.unique_contributors, 1);
        assert_eq!(metrics.concentration_last_year, 100.0);
    }

    #[test]
    fn test_maturity_requires_all_three_conditions() {
        let now = as_of();

        // Old and substantial, recent commit: mature
        let mut commits: Vec<Commit> = (0..35)
            .map(|i| commit("alice@example.com", "Alice", 2200 - i * 60, now))
            .collect();
        commits.push(commit("alice@example.com", "Alice", 30, now));
        assert!(analyzer().analyze(&commits, now).is_mature);

        // Old but only a handful of commits: not mature
        let sparse: Vec<Commit> = (0..5)
            .map(|i| commit("alice@example.com", "Alice", 2200 - i * 100, now))
            .collect();
        assert!(!analyzer().analyze(&sparse, now).is_mature);

        // Substantial but young: not mature
        let young: Vec<Commit> = (0..40)
            .map(|i| commit("alice@example.com", "Alice", 300 - i * 5, now))
            .collect();
        assert!(!analyzer().analyze(&young, now).is_mature);

        // Old and substantial but last commit 6 years ago: dead, not mature
        let dead: Vec<Commit> = (0..40)
            .map(|i| commit("alice@example.com", "Alice", 2200 + i * 10, now))
            .collect();
        assert!(!analyzer().analyze(&dead, now).is_mature);
    }

    /// A contributor with under 1% of lifetime history taking half the recent
    /// window is the pattern the detector exists for.
    #[test]
    fn test_takeover_shift_detected() {
        let now = as_of();
        let mut commits = Vec::new();

        // Founder: ~500 historical commits over eight years
        for i in 0..500 {
            commits.push(commit("founder@example.com", "Founder", 380 + i * 5, now));
        }
        // Newcomer: 4 historical commits (0.8% of history), then 10 of the
        // 20 recent commits
        for i in 0..4 {
            commits.push(commit("newcomer@example.com", "Newcomer", 400 + i * 7, now));
        }
        for i in 0..10 {
            commits.push(commit("newcomer@example.com", "Newcomer", 10 + i, now));
        }
        for i in 0..10 {
            commits.push(commit("founder@example.com", "Founder", 100 + i, now));
        }

        let metrics = analyzer().analyze(&commits, now);
        assert!(metrics.is_mature);
        assert_eq!(metrics.commits_last_year, 20);
        // ~50% recent minus ~0.8% historical
        assert!(metrics.takeover_shift > 45.0, "shift={}", metrics.takeover_shift);
        assert_eq!(metrics.takeover_suspect_identity, "newcomer@example.com");
    }

    #[test]
    fn test_established_maintainer_not_flagged() {
        let now = as_of();
        let mut commits = Vec::new();

        // Founder holds 40% of history, then does all recent work: large
        // shift but above the historical floor, so no signal.
        for i in 0..200 {
            commits.push(commit("founder@example.com", "Founder", 380 + i * 10, now));
        }
        for i in 0..300 {
            commits.push(commit("others@example.com", "Others", 380 + i * 7, now));
        }
        for i in 0..20 {
            commits.push(commit("founder@example.com", "Founder", 5 + i, now));
        }

        let metrics = analyzer().analyze(&commits, now);
        assert!(metrics.is_mature);
        assert_eq!(metrics.takeover_shift, 0.0);
        assert!(metrics.takeover_suspect_identity.is_empty());
    }

    #[test]
    fn test_bots_excluded_from_takeover() {
        let now = as_of();
        let mut commits = Vec::new();
        for i in 0..500 {
            commits.push(commit("founder@example.com", "Founder", 380 + i * 5, now));
        }
        for i in 0..15 {
            commits.push(commit(
                "49699333+dependabot[bot]@users.noreply.github.com",
                "dependabot[bot]",
                5 + i,
                now,
            ));
        }
        for i in 0..5 {
            commits.push(commit("founder@example.com", "Founder", 50 + i, now));
        }

        let metrics = analyzer().analyze(&commits, now);
        assert!(metrics.is_mature);
        assert_eq!(metrics.takeover_shift, 0.0);
    }

    #[test]
    fn test_takeover_skipped_below_min_recent_commits() {
        let now = as_of();
        let mut commits = Vec::new();
        for i in 0..100 {
            commits.push(commit("founder@example.com", "Founder", 380 + i * 20, now));
        }
        // Only 3 recent commits, all from a newcomer: too sparse to judge
        for i in 0..3 {
            commits.push(commit("newcomer@example.com", "Newcomer", 10 + i, now));
        }

        let metrics = analyzer().analyze(&commits, now);
        assert_eq!(metrics.takeover_shift, 0.0);
    }
}
