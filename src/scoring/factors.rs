//! Risk levels, protective factors, and the final score breakdown

use serde::{Deserialize, Serialize};
use std::fmt;

/// Risk level classification, a total function of the final score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RiskLevel {
    Critical,
    High,
    Moderate,
    Low,
    VeryLow,
}

impl RiskLevel {
    /// Classify a final score. Defined for every value, so scoring can never
    /// fail at this step.
    pub fn from_score(score: i32) -> Self {
        if score >= 80 {
            RiskLevel::Critical
        } else if score >= 60 {
            RiskLevel::High
        } else if score >= 40 {
            RiskLevel::Moderate
        } else if score >= 20 {
            RiskLevel::Low
        } else {
            RiskLevel::VeryLow
        }
    }

    /// Semaphore marker used by the CLI output
    pub fn semaphore(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "🔴",
            RiskLevel::High => "🟠",
            RiskLevel::Moderate => "🟡",
            RiskLevel::Low | RiskLevel::VeryLow => "🟢",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "Immediate risk - action required",
            RiskLevel::High => "Elevated risk - intervention recommended",
            RiskLevel::Moderate => "Requires active monitoring",
            RiskLevel::Low => "Minor concerns, generally stable",
            RiskLevel::VeryLow => "Safe, well-governed package",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Critical => "CRITICAL",
            RiskLevel::High => "HIGH",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::Low => "LOW",
            RiskLevel::VeryLow => "VERY_LOW",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CRITICAL" => Some(RiskLevel::Critical),
            "HIGH" => Some(RiskLevel::High),
            "MODERATE" => Some(RiskLevel::Moderate),
            "LOW" => Some(RiskLevel::Low),
            "VERY_LOW" => Some(RiskLevel::VeryLow),
            _ => None,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Breakdown of protective factors.
///
/// Negative contributions reduce risk; frustration and takeover are the only
/// contributions that can be positive. Each factor is computed independently
/// so the breakdown stays auditable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtectiveFactors {
    pub reputation_score: i32,
    pub funding_score: i32,
    pub org_score: i32,
    pub visibility_score: i32,
    pub distributed_score: i32,
    pub community_score: i32,
    pub cii_score: i32,
    pub frustration_score: i32,
    pub sentiment_score: i32,
    pub maturity_score: i32,
    pub takeover_risk_score: i32,

    pub reputation_evidence: Option<String>,
    pub funding_evidence: Option<String>,
    pub frustration_evidence: Vec<String>,
    pub sentiment_evidence: Vec<String>,
    pub maturity_evidence: Option<String>,
    pub takeover_risk_evidence: Option<String>,
}

impl ProtectiveFactors {
    /// Total protective modifier (sum of all eleven contributions)
    pub fn total(&self) -> i32 {
        self.reputation_score
            + self.funding_score
            + self.org_score
            + self.visibility_score
            + self.distributed_score
            + self.community_score
            + self.cii_score
            + self.frustration_score
            + self.sentiment_score
            + self.maturity_score
            + self.takeover_risk_score
    }
}

/// Complete risk assessment for one package at one cutoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskBreakdown {
    pub package_name: String,
    pub ecosystem: String,
    pub repo_url: Option<String>,

    // Core metrics at time of scoring
    pub maintainer_concentration: f64,
    pub commits_last_year: usize,
    pub unique_contributors: usize,
    pub weekly_downloads: u64,

    // Score components
    pub base_risk: i32,
    pub activity_modifier: i32,
    pub protective_factors: ProtectiveFactors,

    // Final score: clamp(base + activity + protective, 0, 100)
    pub final_score: i32,
    pub risk_level: RiskLevel,

    pub explanation: String,
    pub recommendations: Vec<String>,
    pub warnings: Vec<String>,
}

impl RiskBreakdown {
    pub fn new(package_name: &str, ecosystem: &str, repo_url: Option<String>) -> Self {
        Self {
            package_name: package_name.to_string(),
            ecosystem: ecosystem.to_string(),
            repo_url,
            maintainer_concentration: 0.0,
            commits_last_year: 0,
            unique_contributors: 0,
            weekly_downloads: 0,
            base_risk: 0,
            activity_modifier: 0,
            protective_factors: ProtectiveFactors::default(),
            final_score: 0,
            risk_level: RiskLevel::VeryLow,
            explanation: String::new(),
            recommendations: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

/// One point on a replayed score time-series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalScore {
    pub date: chrono::DateTime<chrono::Utc>,
    pub score: i32,
    pub risk_level: RiskLevel,
    pub concentration: f64,
    pub commits_year: usize,
    pub contributors: usize,
}
