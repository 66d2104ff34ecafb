//! Tunable scoring constants
//!
//! Every threshold and point value used by the analyzer and the engine lives
//! here as a plain field, so parameter sweeps substitute values instead of
//! patching code. Defaults mirror the published methodology.

use serde::{Deserialize, Serialize};

/// All thresholds and point values for risk scoring
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    // Base risk: concentration bucket edges and the points per bucket.
    pub concentration_low: f64,
    pub concentration_moderate: f64,
    pub concentration_high: f64,
    pub concentration_critical: f64,
    pub base_risk_distributed: i32,
    pub base_risk_low: i32,
    pub base_risk_moderate: i32,
    pub base_risk_high: i32,
    pub base_risk_critical: i32,

    // Activity modifier: commits/year bucket edges and modifiers.
    pub active_commits_per_year: u32,
    pub moderate_commits_per_year: u32,
    pub low_commits_per_year: u32,
    pub active_modifier: i32,
    pub moderate_modifier: i32,
    pub abandoned_modifier: i32,

    // Maturity classification (three-way AND).
    pub mature_min_age_years: f64,
    pub mature_min_commits: usize,
    pub mature_recency_days: i64,

    // Takeover-shift detection.
    pub takeover_shift_threshold: f64,
    pub takeover_historical_floor: f64,
    pub takeover_min_recent_commits: usize,
    pub takeover_penalty: i32,

    // Protective factors.
    pub funding_bonus: i32,
    pub org_bonus: i32,
    pub org_min_admins: u32,
    pub massive_downloads_threshold: u64,
    pub high_downloads_threshold: u64,
    pub massive_stars_threshold: u64,
    pub high_stars_threshold: u64,
    pub visibility_massive_bonus: i32,
    pub visibility_high_bonus: i32,
    pub distributed_max_concentration: f64,
    pub distributed_min_commits: u32,
    pub distributed_bonus: i32,
    pub community_min_contributors: u32,
    pub community_bonus: i32,
    pub cii_bonus: i32,
    pub frustration_penalty: i32,
    pub negative_sentiment_threshold: f64,
    pub positive_sentiment_threshold: f64,
    pub negative_sentiment_penalty: i32,
    pub positive_sentiment_bonus: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            concentration_low: 30.0,
            concentration_moderate: 50.0,
            concentration_high: 70.0,
            concentration_critical: 90.0,
            base_risk_distributed: 20,
            base_risk_low: 40,
            base_risk_moderate: 60,
            base_risk_high: 80,
            base_risk_critical: 100,

            active_commits_per_year: 50,
            moderate_commits_per_year: 12,
            low_commits_per_year: 4,
            active_modifier: -30,
            moderate_modifier: -15,
            abandoned_modifier: 20,

            mature_min_age_years: 5.0,
            mature_min_commits: 30,
            mature_recency_days: 5 * 365,

            takeover_shift_threshold: 30.0,
            takeover_historical_floor: 5.0,
            takeover_min_recent_commits: 5,
            takeover_penalty: 20,

            funding_bonus: -15,
            org_bonus: -15,
            org_min_admins: 3,
            massive_downloads_threshold: 50_000_000,
            high_downloads_threshold: 10_000_000,
            massive_stars_threshold: 50_000,
            high_stars_threshold: 10_000,
            visibility_massive_bonus: -20,
            visibility_high_bonus: -10,
            distributed_max_concentration: 40.0,
            distributed_min_commits: 10,
            distributed_bonus: -10,
            community_min_contributors: 20,
            community_bonus: -10,
            cii_bonus: -10,
            frustration_penalty: 20,
            negative_sentiment_threshold: -0.3,
            positive_sentiment_threshold: 0.3,
            negative_sentiment_penalty: 10,
            positive_sentiment_bonus: -5,
        }
    }
}
