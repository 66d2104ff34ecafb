//! Risk scoring: factors, maintainer reputation, and the scoring engine

mod config;
mod engine;
mod factors;
mod reputation;

pub use config::ScoringConfig;
pub use engine::{CiiBadgeLevel, PackageMetrics, RiskScorer};
pub use factors::{HistoricalScore, ProtectiveFactors, RiskBreakdown, RiskLevel};
pub use reputation::{
    MaintainerProfile, MaintainerRepo, ReputationBreakdown, ReputationScorer, ReputationTier,
};
