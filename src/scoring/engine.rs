//! Risk scoring engine
//!
//! Score = Base Risk + Activity Modifier + Protective Factors, clamped to
//! 0-100 (higher = riskier). Pure and deterministic: the engine never errors
//! on well-formed metrics; out-of-range inputs are a collaborator contract
//! violation and are rejected at the boundary, not clamped here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scoring::config::ScoringConfig;
use crate::scoring::factors::{ProtectiveFactors, RiskBreakdown, RiskLevel};
use crate::scoring::reputation::{
    MaintainerProfile, MaintainerRepo, ReputationBreakdown, ReputationScorer,
};

/// CII best-practices badge level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiiBadgeLevel {
    #[default]
    None,
    Passing,
    Silver,
    Gold,
}

impl CiiBadgeLevel {
    fn earned(&self) -> bool {
        !matches!(self, CiiBadgeLevel::None)
    }
}

/// Collected metrics for a package, the engine's sole input
#[derive(Debug, Clone, Default)]
pub struct PackageMetrics {
    // Core metrics from git history
    pub maintainer_concentration: f64,
    pub commits_last_year: usize,
    pub unique_contributors: usize,
    pub top_contributor_identity: String,
    pub top_contributor_name: String,
    pub last_commit_date: Option<DateTime<Utc>>,

    // External registry/repository data
    pub weekly_downloads: u64,
    /// GitHub stars: visibility proxy when no download data exists
    pub repo_stars: u64,

    // Maintainer facts (raw, for reputation scoring)
    pub maintainer_username: Option<String>,
    pub maintainer_account_created: Option<DateTime<Utc>>,
    pub maintainer_repos: Vec<MaintainerRepo>,
    pub maintainer_sponsor_count: Option<u32>,
    pub maintainer_orgs: Vec<String>,
    pub packages_maintained: Vec<String>,
    pub has_sponsors_listing: bool,

    /// Pre-computed reputation; when absent the engine computes one from the
    /// raw facts above
    pub reputation: Option<ReputationBreakdown>,

    // Repository governance
    pub is_org_owned: bool,
    pub org_admin_count: u32,
    pub cii_badge_level: CiiBadgeLevel,

    // Maturity and takeover signals from the analyzer
    pub total_commits: usize,
    pub lifetime_contributors: usize,
    pub lifetime_concentration: f64,
    pub is_mature: bool,
    pub repo_age_years: f64,
    pub takeover_shift: f64,
    pub takeover_suspect_identity: String,
    pub takeover_suspect_name: String,

    // Sentiment collaborator output
    pub average_sentiment: f64,
    pub frustration_detected: bool,
    pub frustration_evidence: Vec<String>,
}

/// Deterministic risk scorer
pub struct RiskScorer {
    config: ScoringConfig,
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self::new(ScoringConfig::default())
    }
}

impl RiskScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Base risk from maintainer concentration: five coarse buckets so the
    /// score moves in explainable jumps, monotonic non-decreasing.
    pub fn calculate_base_risk(&self, concentration: f64) -> i32 {
        let c = &self.config;
        if concentration < c.concentration_low {
            c.base_risk_distributed
        } else if concentration < c.concentration_moderate {
            c.base_risk_low
        } else if concentration < c.concentration_high {
            c.base_risk_moderate
        } else if concentration < c.concentration_critical {
            c.base_risk_high
        } else {
            c.base_risk_critical
        }
    }

    /// Activity modifier from commit frequency. The single largest
    /// abandonment signal, and intentionally the only component allowed to
    /// swing from -30 to +20.
    pub fn calculate_activity_modifier(&self, commits_last_year: usize) -> i32 {
        let c = &self.config;
        if commits_last_year > c.active_commits_per_year as usize {
            c.active_modifier
        } else if commits_last_year >= c.moderate_commits_per_year as usize {
            c.moderate_modifier
        } else if commits_last_year >= c.low_commits_per_year as usize {
            0
        } else {
            c.abandoned_modifier
        }
    }

    /// All eleven protective factors, computed independently
    pub fn calculate_protective_factors(
        &self,
        metrics: &PackageMetrics,
        ecosystem: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> ProtectiveFactors {
        let cfg = &self.config;
        let mut pf = ProtectiveFactors::default();

        // Factor 1: Maintainer reputation (composite tier)
        let reputation = match &metrics.reputation {
            Some(r) => r.clone(),
            None => {
                let profile = MaintainerProfile {
                    username: metrics.maintainer_username.as_deref().unwrap_or(""),
                    account_created: metrics.maintainer_account_created,
                    repos: &metrics.maintainer_repos,
                    sponsor_count: metrics.maintainer_sponsor_count,
                    orgs: &metrics.maintainer_orgs,
                    packages_maintained: &metrics.packages_maintained,
                };
                ReputationScorer::calculate(&profile, ecosystem, as_of)
            }
        };
        pf.reputation_score = reputation.tier().risk_reduction();
        if pf.reputation_score != 0 {
            pf.reputation_evidence = Some(format!(
                "{}: {} pts ({}) - tenure={}, portfolio={}, stars={}, sponsors={}",
                reputation.username,
                reputation.total_score(),
                reputation.tier().as_str(),
                reputation.tenure_score,
                reputation.portfolio_score,
                reputation.stars_score,
                reputation.sponsors_score,
            ));
        }

        // Factor 2: Economic sustainability
        if metrics.has_sponsors_listing {
            pf.funding_score = cfg.funding_bonus;
            pf.funding_evidence = Some("GitHub Sponsors enabled".to_string());
        }

        // Factor 3: Organization ownership
        if metrics.is_org_owned && metrics.org_admin_count >= cfg.org_min_admins {
            pf.org_score = cfg.org_bonus;
        }

        // Factor 4: Visibility. Download counts when available, GitHub stars
        // as a proxy for repos without download data.
        if metrics.weekly_downloads > cfg.massive_downloads_threshold {
            pf.visibility_score = cfg.visibility_massive_bonus;
        } else if metrics.weekly_downloads > cfg.high_downloads_threshold {
            pf.visibility_score = cfg.visibility_high_bonus;
        } else if metrics.weekly_downloads == 0 && metrics.repo_stars > 0 {
            if metrics.repo_stars > cfg.massive_stars_threshold {
                pf.visibility_score = cfg.visibility_massive_bonus;
            } else if metrics.repo_stars > cfg.high_stars_threshold {
                pf.visibility_score = cfg.visibility_high_bonus;
            }
        }

        // Factor 5: Distributed governance. The commit floor guards against
        // "low concentration because there were only 2 commits total".
        if metrics.maintainer_concentration < cfg.distributed_max_concentration
            && metrics.commits_last_year >= cfg.distributed_min_commits as usize
        {
            pf.distributed_score = cfg.distributed_bonus;
        }

        // Factor 6: Active community
        if metrics.unique_contributors > cfg.community_min_contributors as usize {
            pf.community_score = cfg.community_bonus;
        }

        // Factor 7: CII best practices badge
        if metrics.cii_badge_level.earned() {
            pf.cii_score = cfg.cii_bonus;
        }

        // Factor 8: Economic frustration
        if metrics.frustration_detected {
            pf.frustration_score = cfg.frustration_penalty;
            pf.frustration_evidence = metrics.frustration_evidence.clone();
        }

        // Factor 9: Sentiment
        if metrics.average_sentiment < cfg.negative_sentiment_threshold {
            pf.sentiment_score = cfg.negative_sentiment_penalty;
            pf.sentiment_evidence =
                vec!["Negative sentiment detected in communications".to_string()];
        } else if metrics.average_sentiment > cfg.positive_sentiment_threshold {
            pf.sentiment_score = cfg.positive_sentiment_bonus;
        }

        // Factor 10: Project maturity (informational). The real maturity
        // benefit is penalty suppression and the lifetime-concentration
        // fallback in calculate(), not a score bonus.
        if metrics.is_mature {
            pf.maturity_score = 0;
            pf.maturity_evidence = Some(format!(
                "Stable project: {} commits over {:.0} years, {} lifetime contributors",
                metrics.total_commits, metrics.repo_age_years, metrics.lifetime_contributors
            ));
        }

        // Factor 11: Takeover risk. Flags a minor historical contributor
        // suddenly dominating recent commits on a mature project.
        if metrics.is_mature && metrics.takeover_shift > cfg.takeover_shift_threshold {
            pf.takeover_risk_score = cfg.takeover_penalty;
            let suspect = if metrics.takeover_suspect_name.is_empty() {
                &metrics.takeover_suspect_identity
            } else {
                &metrics.takeover_suspect_name
            };
            pf.takeover_risk_evidence = Some(format!(
                "{}: {:+.0}pp shift in commit share on mature project (xz-utils pattern)",
                suspect, metrics.takeover_shift
            ));
        }

        pf
    }

    /// Human-readable explanation assembled from which thresholds fired
    fn generate_explanation(&self, breakdown: &RiskBreakdown, metrics: &PackageMetrics) -> String {
        let mut parts = Vec::new();

        if metrics.is_mature {
            parts.push(format!(
                "Mature project ({:.0} years, {} lifetime contributors)",
                metrics.repo_age_years, metrics.lifetime_contributors
            ));
        }

        if metrics.is_mature {
            let lt = metrics.lifetime_concentration;
            if lt >= 90.0 {
                parts.push(format!(
                    "Single-maintainer lifetime ({lt:.0}% lifetime concentration)"
                ));
            } else if lt >= 50.0 {
                parts.push(format!("Moderately concentrated lifetime ({lt:.0}% lifetime)"));
            } else {
                parts.push(format!("Distributed lifetime contributors ({lt:.0}% lifetime)"));
            }
        } else {
            let conc = breakdown.maintainer_concentration;
            if conc >= 90.0 {
                parts.push(format!(
                    "Critical concentration ({conc:.0}%): single person controls nearly all commits"
                ));
            } else if conc >= 70.0 {
                parts.push(format!(
                    "High concentration ({conc:.0}%): majority of commits from one person"
                ));
            } else if conc >= 50.0 {
                parts.push(format!("Moderate concentration ({conc:.0}%): some bus factor risk"));
            } else {
                parts.push(format!(
                    "Distributed commits ({conc:.0}%): healthy contributor diversity"
                ));
            }
        }

        let cfg = &self.config;
        if breakdown.activity_modifier == cfg.abandoned_modifier {
            parts.push("Project appears abandoned (<4 commits/year)".to_string());
        } else if breakdown.activity_modifier == cfg.active_modifier {
            parts.push("Actively maintained (>50 commits/year)".to_string());
        } else if breakdown.activity_modifier == cfg.moderate_modifier {
            parts.push("Moderately active (12-50 commits/year)".to_string());
        } else if metrics.is_mature
            && metrics.commits_last_year < cfg.low_commits_per_year as usize
        {
            parts.push("Low recent activity (expected for mature project)".to_string());
        } else {
            parts.push("Low activity (4-11 commits/year)".to_string());
        }

        let pf_total = breakdown.protective_factors.total();
        if pf_total < -30 {
            parts.push(format!("Strong protective factors ({pf_total:+} points)"));
        } else if pf_total < 0 {
            parts.push(format!("Some protective factors ({pf_total:+} points)"));
        } else if pf_total > 0 {
            parts.push(format!("Warning signals present ({pf_total:+} points)"));
        }

        if breakdown.protective_factors.frustration_score > 0 {
            parts.push("ALERT: Economic frustration signals detected".to_string());
        }
        if breakdown.protective_factors.takeover_risk_score > 0 {
            parts.push("ALERT: Newcomer takeover pattern detected on mature project".to_string());
        }

        format!(
            "{} {} ({}). {}",
            breakdown.risk_level.semaphore(),
            breakdown.risk_level,
            breakdown.final_score,
            parts.join(". ")
        )
    }

    /// Priority-ordered recommendations; frustration and takeover alerts are
    /// always inserted first when present.
    fn generate_recommendations(&self, breakdown: &RiskBreakdown) -> Vec<String> {
        let mut recs: Vec<String> = Vec::new();

        if breakdown.final_score >= 80 {
            recs.push("IMMEDIATE: Identify alternative packages or prepare to fork".to_string());
            recs.push("Do not accept new versions without manual code review".to_string());
            recs.push("Monitor for maintainer changes or ownership transfers".to_string());
        } else if breakdown.final_score >= 60 {
            recs.push("Review new releases carefully before updating".to_string());
            recs.push("Consider contributing to reduce maintainer concentration".to_string());
            recs.push("Monitor project health metrics monthly".to_string());
        } else if breakdown.final_score >= 40 {
            recs.push("Standard monitoring recommended".to_string());
            recs.push("Keep dependencies updated".to_string());
        } else {
            recs.push("Low risk - standard dependency management practices apply".to_string());
        }

        if breakdown.protective_factors.frustration_score > 0 {
            recs.insert(
                0,
                "URGENT: Maintainer frustration detected - elevated sabotage risk".to_string(),
            );
        }

        if breakdown.maintainer_concentration > 90.0 && breakdown.commits_last_year < 10 {
            recs.insert(
                0,
                "HIGH PRIORITY: Single maintainer + low activity = prime takeover target"
                    .to_string(),
            );
        }

        if breakdown.protective_factors.takeover_risk_score > 0 {
            recs.insert(
                0,
                "ALERT: New contributor dominates recent commits on mature project — review carefully (xz-utils pattern)"
                    .to_string(),
            );
        }

        recs
    }

    /// Calculate the complete risk score for a package.
    ///
    /// Two-track scoring for mature projects: a mature project with zero
    /// recent commits is treated as abandoned regardless of history, while
    /// one with 1-3 commits/year falls back to lifetime concentration (the
    /// recent window is too sparse to trust) with the abandonment penalty
    /// suppressed.
    pub fn calculate(
        &self,
        package_name: &str,
        ecosystem: &str,
        metrics: &PackageMetrics,
        repo_url: Option<String>,
        as_of: Option<DateTime<Utc>>,
    ) -> RiskBreakdown {
        let mut breakdown = RiskBreakdown::new(package_name, ecosystem, repo_url);

        breakdown.maintainer_concentration = metrics.maintainer_concentration;
        breakdown.commits_last_year = metrics.commits_last_year;
        breakdown.unique_contributors = metrics.unique_contributors;
        breakdown.weekly_downloads = metrics.weekly_downloads;

        let low_floor = self.config.low_commits_per_year as usize;
        if metrics.is_mature {
            if metrics.commits_last_year == 0 {
                // Zero activity is abandonment even for historically mature
                // projects; recent concentration defaults to 100 here.
                breakdown.base_risk = self.calculate_base_risk(metrics.maintainer_concentration);
                breakdown.activity_modifier = self.calculate_activity_modifier(0);
            } else if metrics.commits_last_year < low_floor {
                breakdown.base_risk = self.calculate_base_risk(metrics.lifetime_concentration);
                let raw = self.calculate_activity_modifier(metrics.commits_last_year);
                breakdown.activity_modifier = raw.min(0);
            } else {
                breakdown.base_risk = self.calculate_base_risk(metrics.maintainer_concentration);
                let raw = self.calculate_activity_modifier(metrics.commits_last_year);
                breakdown.activity_modifier = raw.min(0);
            }
        } else {
            breakdown.base_risk = self.calculate_base_risk(metrics.maintainer_concentration);
            breakdown.activity_modifier =
                self.calculate_activity_modifier(metrics.commits_last_year);
        }

        breakdown.protective_factors =
            self.calculate_protective_factors(metrics, ecosystem, as_of);

        // A takeover is frequently accompanied by a burst of new commits;
        // that burst must not cancel the takeover alarm.
        if breakdown.protective_factors.takeover_risk_score > 0
            && breakdown.activity_modifier < 0
        {
            breakdown.activity_modifier = 0;
        }

        let raw_score = breakdown.base_risk
            + breakdown.activity_modifier
            + breakdown.protective_factors.total();
        breakdown.final_score = raw_score.clamp(0, 100);
        breakdown.risk_level = RiskLevel::from_score(breakdown.final_score);

        breakdown.explanation = self.generate_explanation(&breakdown, metrics);
        breakdown.recommendations = self.generate_recommendations(&breakdown);

        breakdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scorer() -> RiskScorer {
        RiskScorer::default()
    }

    #[test]
    fn test_base_risk_buckets() {
        let s = scorer();
        assert_eq!(s.calculate_base_risk(0.0), 20);
        assert_eq!(s.calculate_base_risk(25.0), 20);
        assert_eq!(s.calculate_base_risk(30.0), 40);
        assert_eq!(s.calculate_base_risk(40.0), 40);
        assert_eq!(s.calculate_base_risk(50.0), 60);
        assert_eq!(s.calculate_base_risk(60.0), 60);
        assert_eq!(s.calculate_base_risk(70.0), 80);
        assert_eq!(s.calculate_base_risk(80.0), 80);
        assert_eq!(s.calculate_base_risk(90.0), 100);
        assert_eq!(s.calculate_base_risk(100.0), 100);
    }

    #[test]
    fn test_base_risk_monotonic() {
        let s = scorer();
        let mut prev = 0;
        for c in 0..=100 {
            let risk = s.calculate_base_risk(c as f64);
            assert!(risk >= prev, "base risk decreased at concentration {c}");
            assert!([20, 40, 60, 80, 100].contains(&risk));
            prev = risk;
        }
    }

    #[test]
    fn test_activity_modifier_buckets() {
        let s = scorer();
        assert_eq!(s.calculate_activity_modifier(100), -30);
        assert_eq!(s.calculate_activity_modifier(51), -30);
        assert_eq!(s.calculate_activity_modifier(50), -15);
        assert_eq!(s.calculate_activity_modifier(12), -15);
        assert_eq!(s.calculate_activity_modifier(11), 0);
        assert_eq!(s.calculate_activity_modifier(4), 0);
        assert_eq!(s.calculate_activity_modifier(3), 20);
        assert_eq!(s.calculate_activity_modifier(0), 20);
    }

    #[test]
    fn test_activity_modifier_monotonic_non_increasing() {
        let s = scorer();
        let mut prev = i32::MAX;
        for commits in 0..200usize {
            let m = s.calculate_activity_modifier(commits);
            assert!(m <= prev, "modifier increased at {commits} commits");
            assert!([-30, -15, 0, 20].contains(&m));
            prev = m;
        }
    }

    #[test]
    fn test_mature_low_activity_uses_lifetime_concentration() {
        let metrics = PackageMetrics {
            maintainer_concentration: 100.0,
            lifetime_concentration: 35.0,
            commits_last_year: 2,
            is_mature: true,
            ..PackageMetrics::default()
        };
        let breakdown = scorer().calculate("stable-lib", "pypi", &metrics, None, None);
        // Lifetime 35% -> bucket 40, and the abandonment penalty is suppressed
        assert_eq!(breakdown.base_risk, 40);
        assert_eq!(breakdown.activity_modifier, 0);
    }

    #[test]
    fn test_mature_zero_activity_is_abandoned() {
        let metrics = PackageMetrics {
            maintainer_concentration: 100.0,
            lifetime_concentration: 30.0,
            commits_last_year: 0,
            is_mature: true,
            ..PackageMetrics::default()
        };
        let breakdown = scorer().calculate("dead-lib", "pypi", &metrics, None, None);
        assert_eq!(breakdown.base_risk, 100);
        assert_eq!(breakdown.activity_modifier, 20);
    }

    #[test]
    fn test_takeover_suppresses_activity_bonus() {
        let metrics = PackageMetrics {
            maintainer_concentration: 50.0,
            commits_last_year: 120,
            is_mature: true,
            takeover_shift: 49.2,
            takeover_suspect_identity: "newcomer@example.com".to_string(),
            ..PackageMetrics::default()
        };
        let breakdown = scorer().calculate("compression-lib", "github", &metrics, None, None);
        assert_eq!(breakdown.protective_factors.takeover_risk_score, 20);
        // 120 commits/year would earn -30, forced back to 0 by the alarm
        assert_eq!(breakdown.activity_modifier, 0);
        assert!(breakdown
            .recommendations
            .first()
            .map(|r| r.contains("ALERT"))
            .unwrap_or(false));
    }

    #[test]
    fn test_takeover_below_threshold_does_not_fire() {
        let metrics = PackageMetrics {
            maintainer_concentration: 50.0,
            commits_last_year: 120,
            is_mature: true,
            takeover_shift: 25.0,
            ..PackageMetrics::default()
        };
        let breakdown = scorer().calculate("pkg", "npm", &metrics, None, None);
        assert_eq!(breakdown.protective_factors.takeover_risk_score, 0);
        assert_eq!(breakdown.activity_modifier, -30);
    }

    #[test]
    fn test_distributed_governance_needs_commit_floor() {
        let sparse = PackageMetrics {
            maintainer_concentration: 30.0,
            commits_last_year: 2,
            ..PackageMetrics::default()
        };
        let pf = scorer().calculate_protective_factors(&sparse, "npm", None);
        assert_eq!(pf.distributed_score, 0);

        let active = PackageMetrics {
            maintainer_concentration: 30.0,
            commits_last_year: 40,
            ..PackageMetrics::default()
        };
        let pf = scorer().calculate_protective_factors(&active, "npm", None);
        assert_eq!(pf.distributed_score, -10);
    }

    #[test]
    fn test_stars_fallback_only_without_downloads() {
        let starred = PackageMetrics {
            repo_stars: 60_000,
            weekly_downloads: 0,
            ..PackageMetrics::default()
        };
        let pf = scorer().calculate_protective_factors(&starred, "github", None);
        assert_eq!(pf.visibility_score, -20);

        // Download data present: stars are ignored
        let downloaded = PackageMetrics {
            repo_stars: 60_000,
            weekly_downloads: 1_000,
            ..PackageMetrics::default()
        };
        let pf = scorer().calculate_protective_factors(&downloaded, "github", None);
        assert_eq!(pf.visibility_score, 0);
    }
}
