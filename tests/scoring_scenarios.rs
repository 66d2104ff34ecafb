//! End-to-end scoring scenarios modeled on well-known supply chain incidents
//! and healthy baselines, running the full analyzer -> scorer pipeline on
//! synthetic commit histories.

use chrono::{DateTime, Duration, TimeZone, Utc};
use custodian::history::{Commit, CommitHistoryAnalyzer};
use custodian::scoring::{
    PackageMetrics, ReputationBreakdown, RiskLevel, RiskScorer, ScoringConfig,
};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn commit(email: &str, name: &str, days_before: i64) -> Commit {
    Commit {
        sha: format!("{email}-{days_before}"),
        author_name: name.to_string(),
        author_email: email.to_string(),
        authored_at: as_of() - Duration::days(days_before),
        message: "routine maintenance".to_string(),
    }
}

fn pipeline(commits: &[Commit]) -> PackageMetrics {
    let metrics = CommitHistoryAnalyzer::new(ScoringConfig::default()).analyze(commits, as_of());
    PackageMetrics {
        maintainer_concentration: metrics.concentration_last_year,
        commits_last_year: metrics.commits_last_year,
        unique_contributors: metrics.unique_contributors,
        total_commits: metrics.total_commits,
        lifetime_contributors: metrics.lifetime_contributors,
        lifetime_concentration: metrics.lifetime_concentration,
        is_mature: metrics.is_mature,
        repo_age_years: metrics.repo_age_years,
        takeover_shift: metrics.takeover_shift,
        takeover_suspect_identity: metrics.takeover_suspect_identity,
        takeover_suspect_name: metrics.takeover_suspect_name,
        last_commit_date: metrics.last_commit_date,
        ..PackageMetrics::default()
    }
}

/// Single-maintainer package handed to a stranger: very high concentration,
/// barely any activity, no protective factors.
#[test]
fn test_abandoned_single_maintainer_is_critical() {
    let metrics = PackageMetrics {
        maintainer_concentration: 90.0,
        commits_last_year: 4,
        unique_contributors: 2,
        ..PackageMetrics::default()
    };

    let breakdown = RiskScorer::default().calculate("event-stream", "npm", &metrics, None, None);

    assert_eq!(breakdown.base_risk, 100);
    assert_eq!(breakdown.activity_modifier, 0);
    assert_eq!(breakdown.final_score, 100);
    assert_eq!(breakdown.risk_level, RiskLevel::Critical);
    assert!(breakdown
        .recommendations
        .iter()
        .any(|r| r.contains("IMMEDIATE")));
}

/// Famous single-maintainer package with a heavyweight maintainer and huge
/// install base: concentration alone does not make it risky.
#[test]
fn test_reputable_popular_package_scores_low() {
    let reputation = ReputationBreakdown {
        username: "sindresorhus".to_string(),
        tenure_score: 15,
        portfolio_score: 15,
        stars_score: 15,
        sponsors_score: 15,
        ..ReputationBreakdown::default()
    };

    let metrics = PackageMetrics {
        maintainer_concentration: 80.0,
        commits_last_year: 30,
        unique_contributors: 8,
        weekly_downloads: 60_000_000,
        has_sponsors_listing: true,
        reputation: Some(reputation),
        ..PackageMetrics::default()
    };

    let breakdown = RiskScorer::default().calculate("chalk", "npm", &metrics, None, None);

    // base 80, activity -15, reputation -25, funding -15, visibility -20
    assert_eq!(breakdown.base_risk, 80);
    assert_eq!(breakdown.activity_modifier, -15);
    assert_eq!(breakdown.protective_factors.reputation_score, -25);
    assert_eq!(breakdown.protective_factors.funding_score, -15);
    assert_eq!(breakdown.protective_factors.visibility_score, -20);
    assert!(breakdown.final_score <= 40);
    assert!(matches!(
        breakdown.risk_level,
        RiskLevel::Low | RiskLevel::VeryLow
    ));
}

/// Healthy org-backed project: distributed commits, active community,
/// multiple admins.
#[test]
fn test_well_governed_org_project_is_very_low() {
    let metrics = PackageMetrics {
        maintainer_concentration: 37.0,
        commits_last_year: 109,
        unique_contributors: 31,
        is_org_owned: true,
        org_admin_count: 4,
        is_mature: true,
        lifetime_concentration: 35.0,
        total_commits: 5000,
        repo_age_years: 14.0,
        lifetime_contributors: 300,
        ..PackageMetrics::default()
    };

    let breakdown = RiskScorer::default().calculate("urllib3", "pypi", &metrics, None, None);

    assert_eq!(breakdown.protective_factors.org_score, -15);
    assert_eq!(breakdown.protective_factors.distributed_score, -10);
    assert_eq!(breakdown.protective_factors.community_score, -10);
    assert!(breakdown.final_score <= 20);
    assert_eq!(breakdown.risk_level, RiskLevel::VeryLow);
}

/// Frustration adds exactly its configured penalty before clamping.
#[test]
fn test_frustration_adds_exact_penalty() {
    let calm = PackageMetrics {
        maintainer_concentration: 50.0,
        commits_last_year: 20,
        ..PackageMetrics::default()
    };
    let frustrated = PackageMetrics {
        frustration_detected: true,
        frustration_evidence: vec!["[commit] Found keywords: [\"unpaid work\"]".to_string()],
        ..calm.clone()
    };

    let scorer = RiskScorer::default();
    let base = scorer.calculate("pkg", "npm", &calm, None, None);
    let flagged = scorer.calculate("pkg", "npm", &frustrated, None, None);

    assert_eq!(flagged.final_score - base.final_score, 20);
    assert!(flagged
        .recommendations
        .first()
        .map(|r| r.contains("URGENT"))
        .unwrap_or(false));
}

/// The xz-utils shape: two decades of one maintainer, then a newcomer with a
/// negligible historical share dominates the last year. The full pipeline
/// must surface the shift, add the penalty, and refuse the activity bonus.
#[test]
fn test_newcomer_takeover_pattern_detected() {
    let mut commits = Vec::new();
    // Founder commits monthly for ~19 years before the recent window
    for month in 0..230 {
        commits.push(commit("founder@example.org", "Founder", 370 + month * 30));
    }
    // One marginal historical commit from the future suspect (<5% share)
    commits.push(commit("helper@example.com", "Helpful Newcomer", 400));
    // Recent window: the newcomer outpaces the founder heavily
    for week in 0..50 {
        commits.push(commit("helper@example.com", "Helpful Newcomer", week * 7));
    }
    for i in 0..10 {
        commits.push(commit("founder@example.org", "Founder", 10 + i * 30));
    }

    let metrics = pipeline(&commits);
    assert!(metrics.is_mature);
    assert!(
        metrics.takeover_shift > 30.0,
        "shift was {:.1}",
        metrics.takeover_shift
    );
    assert_eq!(metrics.takeover_suspect_identity, "helper@example.com");

    let breakdown = RiskScorer::default().calculate("xz-like", "github", &metrics, None, None);
    assert_eq!(breakdown.protective_factors.takeover_risk_score, 20);
    // 60 commits in the window would normally earn -30
    assert_eq!(breakdown.activity_modifier, 0);
    assert!(breakdown
        .recommendations
        .first()
        .map(|r| r.contains("ALERT"))
        .unwrap_or(false));
}

/// An established co-maintainer increasing their share is not a takeover.
#[test]
fn test_established_maintainer_shift_not_flagged() {
    let mut commits = Vec::new();
    for month in 0..120 {
        commits.push(commit("alice@example.org", "Alice", 370 + month * 30));
        if month % 2 == 0 {
            commits.push(commit("bob@example.org", "Bob", 371 + month * 30));
        }
    }
    // Bob (33% historical) takes over the recent window
    for week in 0..40 {
        commits.push(commit("bob@example.org", "Bob", week * 9));
    }

    let metrics = pipeline(&commits);
    assert!(metrics.is_mature);
    assert_eq!(metrics.takeover_shift, 0.0);
}

#[test]
fn test_score_clamped_at_both_ends() {
    let scorer = RiskScorer::default();

    // Everything bad at once: raw score far above 100
    let worst = PackageMetrics {
        maintainer_concentration: 100.0,
        commits_last_year: 0,
        is_mature: false,
        frustration_detected: true,
        average_sentiment: -0.9,
        ..PackageMetrics::default()
    };
    let breakdown = scorer.calculate("doomed", "npm", &worst, None, None);
    assert_eq!(breakdown.final_score, 100);

    // Everything good at once: raw score far below 0
    let best = PackageMetrics {
        maintainer_concentration: 10.0,
        commits_last_year: 400,
        unique_contributors: 100,
        weekly_downloads: 80_000_000,
        has_sponsors_listing: true,
        is_org_owned: true,
        org_admin_count: 10,
        average_sentiment: 0.5,
        reputation: Some(ReputationBreakdown {
            username: "core-team".to_string(),
            tenure_score: 15,
            portfolio_score: 15,
            stars_score: 15,
            sponsors_score: 15,
            ..ReputationBreakdown::default()
        }),
        ..PackageMetrics::default()
    };
    let breakdown = scorer.calculate("rock-solid", "npm", &best, None, None);
    assert_eq!(breakdown.final_score, 0);
    assert_eq!(breakdown.risk_level, RiskLevel::VeryLow);
}

/// A repository with no commits before the cutoff reads as maximal
/// concentration and abandonment, not as healthy.
#[test]
fn test_empty_history_scores_as_abandoned() {
    let metrics = pipeline(&[]);
    assert_eq!(metrics.maintainer_concentration, 100.0);
    assert_eq!(metrics.commits_last_year, 0);

    let breakdown = RiskScorer::default().calculate("ghost", "npm", &metrics, None, None);
    assert_eq!(breakdown.base_risk, 100);
    assert_eq!(breakdown.activity_modifier, 20);
    assert_eq!(breakdown.risk_level, RiskLevel::Critical);
}
