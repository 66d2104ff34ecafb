//! Collection and temporal replay
//!
//! Splits scoring into collect-once and score-many: all network work (one
//! registry lookup, one clone, one GitHub pass) happens in `collect_once`,
//! after which any number of cutoffs can be scored from the same immutable
//! state. Replaying a past date filters the commit list instead of
//! re-walking the repository, so a 24-point history costs one clone.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Months, TimeZone, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::cache::ScoreCache;
use crate::collectors::{
    Ecosystem, GitHubClient, GitSource, MaintainerFacts, RegistryClient, RegistryFacts,
};
use crate::config::Config;
use crate::error::{CustodianError, Result};
use crate::history::{Commit, CommitHistoryAnalyzer};
use crate::scoring::{HistoricalScore, PackageMetrics, RiskBreakdown, RiskScorer};
use crate::sentiment::SentimentAnalyzer;

/// Everything collected for a package, sufficient to score any cutoff
#[derive(Debug, Clone)]
pub struct CollectedState {
    pub package: String,
    pub ecosystem: Ecosystem,
    pub repo_url: String,
    pub commits: Vec<Commit>,
    pub registry: RegistryFacts,
    pub maintainer: MaintainerFacts,
    pub packages_maintained: Vec<String>,
    pub warnings: Vec<String>,
}

/// A scored package, with provenance
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub breakdown: RiskBreakdown,
    pub from_cache: bool,
}

/// Batch outcome; failures are isolated per package
#[derive(Debug, Default)]
pub struct BatchResult {
    pub results: Vec<ScoringResult>,
    pub failures: Vec<(String, String)>,
}

/// Orchestrates collectors, analyzer, scorer, and cache
pub struct TemporalReplayService {
    config: Config,
    analyzer: CommitHistoryAnalyzer,
    scorer: RiskScorer,
    sentiment: SentimentAnalyzer,
    registry: RegistryClient,
    github: GitHubClient,
    git: GitSource,
    cache: ScoreCache,
}

impl TemporalReplayService {
    pub fn new(config: Config) -> Result<Self> {
        let git = GitSource::new(config.repos_dir())?;
        let cache = ScoreCache::open(&config.cache_db_path())?;
        let github = GitHubClient::new(config.github.token.clone())?;
        let scoring = config.scoring.clone();
        Ok(Self {
            config,
            analyzer: CommitHistoryAnalyzer::new(scoring.clone()),
            scorer: RiskScorer::new(scoring),
            sentiment: SentimentAnalyzer::new(),
            registry: RegistryClient::new()?,
            github,
            git,
            cache,
        })
    }

    pub fn cache(&self) -> &ScoreCache {
        &self.cache
    }

    /// Collect everything needed to score a package, exactly once.
    ///
    /// Degraded sub-collections (GitHub down, no token) are recorded as
    /// warnings; only an unresolvable repository or a failed clone is fatal.
    pub async fn collect_once(
        &self,
        package: &str,
        ecosystem: Ecosystem,
    ) -> Result<CollectedState> {
        tracing::info!(package, %ecosystem, "collecting package data");

        let registry = self.registry.lookup(ecosystem, package).await?;
        if registry.repository_url.is_empty() {
            return Err(CustodianError::UnresolvedPackage {
                package: package.to_string(),
                ecosystem: ecosystem.to_string(),
            });
        }
        let repo_url = registry.repository_url.clone();

        let commits = self.git.collect(&repo_url).await?;
        tracing::info!(package, commits = commits.len(), "history extracted");

        let mut warnings = Vec::new();
        let mut maintainer = match self.github.collect(&repo_url).await {
            Ok(facts) => facts,
            Err(e) => {
                warnings.push(format!("GitHub data unavailable: {e}"));
                MaintainerFacts::default()
            }
        };

        // Org-owned repositories carry no maintainer of record; recover one
        // from the top contributor when their noreply identity names a login.
        if maintainer.username.is_none() {
            let now_metrics = self.analyzer.analyze(&commits, Utc::now());
            if let Some(login) = noreply_login(&now_metrics.top_contributor_identity) {
                match self.github.maintainer(&login).await {
                    Ok(facts) => {
                        maintainer.username = facts.username;
                        maintainer.account_created = facts.account_created;
                        maintainer.repos = facts.repos;
                        maintainer.sponsor_count = facts.sponsor_count;
                        maintainer.has_sponsors_listing |= facts.has_sponsors_listing;
                        maintainer.orgs = facts.orgs;
                    }
                    Err(e) => warnings.push(format!("Maintainer lookup failed: {e}")),
                }
            } else {
                warnings.push("Maintainer reputation unavailable for this repository".to_string());
            }
        }

        let packages_maintained = match &maintainer.username {
            Some(username) => self
                .registry
                .maintained_packages(ecosystem, username)
                .await
                .unwrap_or_else(|e| {
                    warnings.push(format!("Package listing failed: {e}"));
                    Vec::new()
                }),
            None => Vec::new(),
        };

        Ok(CollectedState {
            package: package.to_string(),
            ecosystem,
            repo_url,
            commits,
            registry,
            maintainer,
            packages_maintained,
            warnings,
        })
    }

    /// Score collected state as of a cutoff. Pure given the state: the same
    /// state and cutoff always produce an identical breakdown.
    pub fn score_at(&self, state: &CollectedState, cutoff: DateTime<Utc>) -> RiskBreakdown {
        let git_metrics = self.analyzer.analyze(&state.commits, cutoff);

        let mut issue_texts = Vec::new();
        for issue in &state.maintainer.issues {
            issue_texts.extend(issue.texts());
        }
        let sentiment = self
            .sentiment
            .analyze_commits(&git_metrics.recent_messages)
            .merge(self.sentiment.analyze_issues(&issue_texts));

        let metrics = PackageMetrics {
            maintainer_concentration: git_metrics.concentration_last_year,
            commits_last_year: git_metrics.commits_last_year,
            unique_contributors: git_metrics.unique_contributors,
            top_contributor_identity: git_metrics.top_contributor_identity.clone(),
            top_contributor_name: git_metrics.top_contributor_name.clone(),
            last_commit_date: git_metrics.last_commit_date,

            weekly_downloads: state.registry.weekly_downloads,
            repo_stars: state.maintainer.repo_stars,

            maintainer_username: state.maintainer.username.clone(),
            maintainer_account_created: state.maintainer.account_created,
            maintainer_repos: state.maintainer.repos.clone(),
            maintainer_sponsor_count: state.maintainer.sponsor_count,
            maintainer_orgs: state.maintainer.orgs.clone(),
            packages_maintained: state.packages_maintained.clone(),
            has_sponsors_listing: state.maintainer.has_sponsors_listing,
            reputation: None,

            is_org_owned: state.maintainer.is_org_owned,
            org_admin_count: state.maintainer.org_admin_count,
            cii_badge_level: state.maintainer.cii_badge_level,

            total_commits: git_metrics.total_commits,
            lifetime_contributors: git_metrics.lifetime_contributors,
            lifetime_concentration: git_metrics.lifetime_concentration,
            is_mature: git_metrics.is_mature,
            repo_age_years: git_metrics.repo_age_years,
            takeover_shift: git_metrics.takeover_shift,
            takeover_suspect_identity: git_metrics.takeover_suspect_identity.clone(),
            takeover_suspect_name: git_metrics.takeover_suspect_name.clone(),

            average_sentiment: sentiment.average_compound,
            frustration_detected: sentiment.frustration_detected(),
            frustration_evidence: sentiment.frustration_evidence.clone(),
        };

        let mut breakdown = self.scorer.calculate(
            &state.package,
            state.ecosystem.as_str(),
            &metrics,
            Some(state.repo_url.clone()),
            Some(cutoff),
        );
        breakdown.warnings = state.warnings.clone();
        breakdown
    }

    /// Score a package now, serving a fresh cached result unless forced
    pub async fn score_now(&self, package: &str, ecosystem: Ecosystem, force: bool) -> Result<ScoringResult> {
        if !force {
            if let Some(cached) =
                self.cache
                    .get_fresh(package, ecosystem.as_str(), self.config.cache.freshness_days)?
            {
                tracing::info!(package, "serving cached score");
                return Ok(ScoringResult {
                    breakdown: cached,
                    from_cache: true,
                });
            }
        }

        let state = self.collect_once(package, ecosystem).await?;
        let breakdown = self.score_at(&state, Utc::now());
        self.cache.store(&breakdown, None)?;
        Ok(ScoringResult {
            breakdown,
            from_cache: false,
        })
    }

    /// Replay a package's score over the past `months` months.
    ///
    /// Cutoffs are anchored to the last commit (or now, for an active repo),
    /// normalized to the first of each month, and returned oldest first.
    pub async fn score_history(
        &self,
        package: &str,
        ecosystem: Ecosystem,
        months: u32,
    ) -> Result<Vec<HistoricalScore>> {
        let state = self.collect_once(package, ecosystem).await?;

        let reference = state
            .commits
            .last()
            .map(|c| c.authored_at)
            .unwrap_or_else(Utc::now);

        let mut series = Vec::new();
        for cutoff in monthly_cutoffs(reference, months) {
            let breakdown = self.score_at(&state, cutoff);
            self.cache.store(&breakdown, Some(cutoff))?;
            series.push(HistoricalScore {
                date: cutoff,
                score: breakdown.final_score,
                risk_level: breakdown.risk_level,
                concentration: breakdown.maintainer_concentration,
                commits_year: breakdown.commits_last_year,
                contributors: breakdown.unique_contributors,
            });
        }
        self.cache.mark_analyzed(package, ecosystem.as_str())?;
        Ok(series)
    }

    /// Score many packages with bounded concurrency. Individual failures are
    /// reported, never propagated; one broken package must not sink a batch.
    pub async fn score_batch(
        self: &Arc<Self>,
        packages: Vec<(String, Ecosystem)>,
        force: bool,
    ) -> BatchResult {
        let semaphore = Arc::new(Semaphore::new(self.config.batch.concurrency));
        let mut tasks = JoinSet::new();

        for (package, ecosystem) in packages {
            let service = Arc::clone(self);
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire().await;
                let outcome = service.score_now(&package, ecosystem, force).await;
                (package, outcome)
            });
        }

        let mut batch = BatchResult::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((package, Ok(result))) => {
                    tracing::info!(
                        package,
                        score = result.breakdown.final_score,
                        cached = result.from_cache,
                        "package scored"
                    );
                    batch.results.push(result);
                }
                Ok((package, Err(e))) => {
                    tracing::warn!(package, error = %e, "package failed");
                    batch.failures.push((package, e.to_string()));
                }
                Err(e) => batch.failures.push(("<task>".to_string(), e.to_string())),
            }
        }
        batch
            .results
            .sort_by(|a, b| b.breakdown.final_score.cmp(&a.breakdown.final_score));
        batch
    }
}

/// Extract the login from a `user@users.noreply.github.com` identity
fn noreply_login(identity: &str) -> Option<String> {
    identity
        .strip_suffix("@users.noreply.github.com")
        .map(str::to_string)
        .filter(|login| !login.is_empty())
}

/// Ascending first-of-month cutoffs, ending at the reference month
fn monthly_cutoffs(reference: DateTime<Utc>, months: u32) -> Vec<DateTime<Utc>> {
    let Some(anchor) = Utc
        .with_ymd_and_hms(reference.year(), reference.month(), 1, 0, 0, 0)
        .single()
    else {
        return Vec::new();
    };

    let mut cutoffs: Vec<DateTime<Utc>> = (0..months)
        .filter_map(|i| anchor.checked_sub_months(Months::new(i)))
        .collect();
    cutoffs.sort();
    cutoffs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monthly_cutoffs_ascending_first_of_month() {
        let reference = Utc.with_ymd_and_hms(2024, 3, 17, 14, 30, 0).unwrap();
        let cutoffs = monthly_cutoffs(reference, 3);

        assert_eq!(cutoffs.len(), 3);
        assert_eq!(cutoffs[0], Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(cutoffs[1], Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(cutoffs[2], Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_monthly_cutoffs_cross_year_boundary() {
        let reference = Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap();
        let cutoffs = monthly_cutoffs(reference, 4);
        assert_eq!(cutoffs[0], Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap());
        assert_eq!(cutoffs[3], Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_noreply_login_extraction() {
        assert_eq!(
            noreply_login("octocat@users.noreply.github.com"),
            Some("octocat".to_string())
        );
        assert_eq!(noreply_login("dev@example.com"), None);
        assert_eq!(noreply_login("@users.noreply.github.com"), None);
    }
}
