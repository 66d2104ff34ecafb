//! Composite reputation scoring for maintainers
//!
//! Seven independently boolean-gated signals, each contributing a fixed point
//! value. None depends on another, so new signals can be added without
//! perturbing existing ones and "why did this maintainer get Tier-1?" is
//! answered by inspecting which booleans fired.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reputation tier derived from the composite score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReputationTier {
    Tier1,
    Tier2,
    Unknown,
}

impl ReputationTier {
    pub fn from_score(score: i32) -> Self {
        if score >= 60 {
            ReputationTier::Tier1
        } else if score >= 30 {
            ReputationTier::Tier2
        } else {
            ReputationTier::Unknown
        }
    }

    /// Risk reduction this tier contributes to the protective factors
    pub fn risk_reduction(&self) -> i32 {
        match self {
            ReputationTier::Tier1 => -25,
            ReputationTier::Tier2 => -10,
            ReputationTier::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReputationTier::Tier1 => "TIER_1",
            ReputationTier::Tier2 => "TIER_2",
            ReputationTier::Unknown => "UNKNOWN",
        }
    }
}

/// Organizations whose membership confers institutional backing
const RECOGNIZED_ORGS: &[&str] = &[
    // JavaScript/Node
    "nodejs",
    "openjs-foundation",
    "npm",
    "expressjs",
    "mochajs",
    "eslint",
    "webpack",
    "babel",
    "rollup",
    "vitejs",
    // Python
    "python",
    "psf",
    "pypa",
    "pallets",
    "django",
    "encode",
    "tiangolo",
    // General
    "apache",
    "cncf",
    "linux-foundation",
    "mozilla",
    "rust-lang",
    "golang",
    // Cloud/Infra
    "kubernetes",
    "docker",
    "hashicorp",
];

const TOP_NPM_PACKAGES: &[&str] = &[
    "lodash", "chalk", "express", "react", "vue", "axios", "moment", "webpack", "babel", "eslint",
    "typescript", "next", "prettier", "jest", "mocha", "commander", "debug", "async", "request",
    "underscore", "uuid", "minimist", "glob", "yargs", "semver", "fs-extra", "bluebird", "rxjs",
    "socket.io", "mongoose",
];

const TOP_PYPI_PACKAGES: &[&str] = &[
    "requests", "numpy", "pandas", "django", "flask", "pytest", "boto3", "urllib3", "setuptools",
    "pip", "certifi", "pyyaml", "cryptography", "pillow", "sqlalchemy", "jinja2", "click", "scipy",
    "matplotlib", "tensorflow", "pytorch", "fastapi", "pydantic", "httpx", "aiohttp", "redis",
    "celery", "scrapy", "beautifulsoup4", "lxml",
];

/// Curated top-package allowlist for an ecosystem (starter lists)
fn top_packages(ecosystem: &str) -> &'static [&'static str] {
    match ecosystem {
        "npm" => TOP_NPM_PACKAGES,
        "pypi" => TOP_PYPI_PACKAGES,
        _ => &[],
    }
}

/// A maintainer-owned repository, as reported by the facts collector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaintainerRepo {
    pub fork: bool,
    pub star_count: u64,
}

/// Detailed breakdown of a maintainer's reputation score
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationBreakdown {
    pub username: String,

    // Individual signal scores (each 0 or its fixed contribution)
    pub tenure_score: i32,
    pub portfolio_score: i32,
    pub stars_score: i32,
    pub sponsors_score: i32,
    pub packages_score: i32,
    pub top_package_score: i32,
    pub org_membership_score: i32,

    // Evidence for each signal
    pub account_age_years: f64,
    pub original_repos_with_stars: usize,
    pub total_stars: u64,
    pub sponsor_count: Option<u32>,
    pub packages_published: usize,
    pub top_packages_maintained: Vec<String>,
    pub recognized_orgs: Vec<String>,
}

impl ReputationBreakdown {
    pub fn total_score(&self) -> i32 {
        self.tenure_score
            + self.portfolio_score
            + self.stars_score
            + self.sponsors_score
            + self.packages_score
            + self.top_package_score
            + self.org_membership_score
    }

    pub fn tier(&self) -> ReputationTier {
        ReputationTier::from_score(self.total_score())
    }
}

/// Externally supplied maintainer facts, evaluated against fixed thresholds
#[derive(Debug, Clone, Default)]
pub struct MaintainerProfile<'a> {
    pub username: &'a str,
    pub account_created: Option<DateTime<Utc>>,
    pub repos: &'a [MaintainerRepo],
    /// None means unknown (collector could not determine), not zero
    pub sponsor_count: Option<u32>,
    pub orgs: &'a [String],
    pub packages_maintained: &'a [String],
}

/// Calculates the composite reputation score for a maintainer.
///
/// Supports an `as_of` date for historical (T-1) analysis, but note the
/// limitation: only tenure can be reconstructed historically. Portfolio,
/// stars, sponsors, and org membership reflect current facts and leak future
/// information into past cutoffs.
pub struct ReputationScorer;

impl ReputationScorer {
    const TENURE_YEARS: f64 = 5.0;
    const MIN_REPOS_WITH_STARS: usize = 50;
    const MIN_STARS_PER_REPO: u64 = 10;
    const TOTAL_STARS_THRESHOLD: u64 = 50_000;
    const MIN_SPONSORS: u32 = 10;
    const MIN_PACKAGES: usize = 20;

    pub fn calculate(
        profile: &MaintainerProfile<'_>,
        ecosystem: &str,
        as_of: Option<DateTime<Utc>>,
    ) -> ReputationBreakdown {
        let mut breakdown = ReputationBreakdown {
            username: profile.username.to_string(),
            ..ReputationBreakdown::default()
        };

        // Signal 1: Tenure (+15 for >=5 years)
        if let Some(created) = profile.account_created {
            let now = as_of.unwrap_or_else(Utc::now);
            let age_years = (now - created).num_days() as f64 / 365.25;
            breakdown.account_age_years = (age_years * 10.0).round() / 10.0;
            if age_years >= Self::TENURE_YEARS {
                breakdown.tenure_score = 15;
            }
        }

        // Signals 2+3: Portfolio and total stars over non-fork repos
        let mut original_repos_with_stars = 0;
        let mut total_stars = 0u64;
        for repo in profile.repos {
            if !repo.fork {
                total_stars += repo.star_count;
                if repo.star_count >= Self::MIN_STARS_PER_REPO {
                    original_repos_with_stars += 1;
                }
            }
        }
        breakdown.original_repos_with_stars = original_repos_with_stars;
        breakdown.total_stars = total_stars;

        if original_repos_with_stars >= Self::MIN_REPOS_WITH_STARS {
            breakdown.portfolio_score = 15;
        }
        if total_stars >= Self::TOTAL_STARS_THRESHOLD {
            breakdown.stars_score = 15;
        }

        // Signal 4: Sponsors (+15 for >=10 backers; None stays ungated)
        breakdown.sponsor_count = profile.sponsor_count;
        if matches!(profile.sponsor_count, Some(n) if n >= Self::MIN_SPONSORS) {
            breakdown.sponsors_score = 15;
        }

        // Signal 5: Packages published (+10 for >=20)
        breakdown.packages_published = profile.packages_maintained.len();
        if profile.packages_maintained.len() >= Self::MIN_PACKAGES {
            breakdown.packages_score = 10;
        }

        // Signal 6: Maintains a curated top package (+15)
        let allowlist = top_packages(ecosystem);
        breakdown.top_packages_maintained = profile
            .packages_maintained
            .iter()
            .filter(|p| allowlist.contains(&p.to_lowercase().as_str()))
            .cloned()
            .collect();
        if !breakdown.top_packages_maintained.is_empty() {
            breakdown.top_package_score = 15;
        }

        // Signal 7: Recognized org membership (+15)
        breakdown.recognized_orgs = profile
            .orgs
            .iter()
            .filter(|org| RECOGNIZED_ORGS.contains(&org.to_lowercase().as_str()))
            .cloned()
            .collect();
        if !breakdown.recognized_orgs.is_empty() {
            breakdown.org_membership_score = 15;
        }

        tracing::debug!(
            username = %breakdown.username,
            total = breakdown.total_score(),
            tier = breakdown.tier().as_str(),
            "reputation calculated"
        );

        breakdown
    }
}
