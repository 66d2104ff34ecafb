//! External data collectors
//!
//! Registry, git, and GitHub collaborators. Everything here is boundary code:
//! the scoring core never performs I/O itself.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::error::CustodianError;

mod git;
mod github;
mod registry;

pub use git::GitSource;
pub use github::{GitHubClient, IssueThread, MaintainerFacts};
pub use registry::RegistryClient;

/// Supported package ecosystems.
///
/// Dispatch to the per-registry lookup happens by matching on this enum at
/// the boundary; `Github` is the pseudo-ecosystem for scoring a bare
/// `owner/repo` with stars as the visibility proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Npm,
    Pypi,
    Cargo,
    Rubygems,
    Packagist,
    Nuget,
    Go,
    Github,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::Pypi => "pypi",
            Ecosystem::Cargo => "cargo",
            Ecosystem::Rubygems => "rubygems",
            Ecosystem::Packagist => "packagist",
            Ecosystem::Nuget => "nuget",
            Ecosystem::Go => "go",
            Ecosystem::Github => "github",
        }
    }
}

impl FromStr for Ecosystem {
    type Err = CustodianError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "npm" => Ok(Ecosystem::Npm),
            "pypi" => Ok(Ecosystem::Pypi),
            "cargo" | "crates" => Ok(Ecosystem::Cargo),
            "rubygems" | "gem" => Ok(Ecosystem::Rubygems),
            "packagist" | "composer" => Ok(Ecosystem::Packagist),
            "nuget" => Ok(Ecosystem::Nuget),
            "go" | "golang" => Ok(Ecosystem::Go),
            "github" => Ok(Ecosystem::Github),
            other => Err(CustodianError::UnsupportedEcosystem(other.to_string())),
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified metadata from any package registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFacts {
    pub name: String,
    pub version: String,
    pub description: String,
    pub repository_url: String,
    pub weekly_downloads: u64,
}

/// Fixed-interval gate invoked before each external call.
///
/// Serializes callers and spaces requests at least `interval` apart, instead
/// of sleeps sprinkled through request handlers.
pub struct RateLimiter {
    interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_call: Mutex::new(None),
        }
    }

    /// Wait until at least `interval` has passed since the previous call
    pub async fn acquire(&self) {
        let mut last = self.last_call.lock().await;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ecosystem_roundtrip() {
        for eco in [
            Ecosystem::Npm,
            Ecosystem::Pypi,
            Ecosystem::Cargo,
            Ecosystem::Rubygems,
            Ecosystem::Packagist,
            Ecosystem::Nuget,
            Ecosystem::Go,
            Ecosystem::Github,
        ] {
            assert_eq!(eco.as_str().parse::<Ecosystem>().unwrap(), eco);
        }
    }

    #[test]
    fn test_ecosystem_aliases() {
        assert_eq!("crates".parse::<Ecosystem>().unwrap(), Ecosystem::Cargo);
        assert_eq!("composer".parse::<Ecosystem>().unwrap(), Ecosystem::Packagist);
        assert!("maven".parse::<Ecosystem>().is_err());
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_calls() {
        let limiter = RateLimiter::new(Duration::from_millis(50));
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        // Two gaps of at least 50ms each
        assert!(start.elapsed() >= Duration::from_millis(100));
    }
}
