//! Per-ecosystem registry lookups
//!
//! Each ecosystem fetches `repository_url` and `weekly_downloads` from its
//! registry API; all other scoring data comes from the shared git/GitHub
//! pipeline. Registries without weekly figures are approximated from the
//! totals they do publish.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::collectors::{Ecosystem, RegistryFacts};
use crate::error::{CustodianError, Result};

const USER_AGENT: &str = "custodian-risk (https://github.com/anicka-net/custodian)";

/// Registry metadata client, one implementation per ecosystem selected by
/// `Ecosystem` at the call site
pub struct RegistryClient {
    client: Client,
}

impl RegistryClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CustodianError::Http {
                source: e,
                context: "building registry HTTP client".to_string(),
            })?;
        Ok(Self { client })
    }

    /// Look up registry facts for a package.
    ///
    /// A missing or partial answer degrades to empty fields rather than
    /// erroring; only transport-level failures surface as errors.
    pub async fn lookup(&self, ecosystem: Ecosystem, package: &str) -> Result<RegistryFacts> {
        match ecosystem {
            Ecosystem::Npm => self.lookup_npm(package).await,
            Ecosystem::Pypi => self.lookup_pypi(package).await,
            Ecosystem::Cargo => self.lookup_crates(package).await,
            Ecosystem::Rubygems => self.lookup_rubygems(package).await,
            Ecosystem::Packagist => self.lookup_packagist(package).await,
            Ecosystem::Nuget => self.lookup_nuget(package).await,
            Ecosystem::Go => self.lookup_goproxy(package).await,
            Ecosystem::Github => Ok(Self::github_passthrough(package)),
        }
    }

    /// The github pseudo-ecosystem has no registry: `owner/repo` is the
    /// repository, and visibility later comes from stars.
    fn github_passthrough(package: &str) -> RegistryFacts {
        let name = package.trim_matches('/');
        let repository_url = if name.starts_with("https://") {
            name.to_string()
        } else {
            format!("https://github.com/{name}")
        };
        RegistryFacts {
            name: name.to_string(),
            repository_url,
            ..RegistryFacts::default()
        }
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| CustodianError::Http {
                source: e,
                context: format!("GET {url}"),
            })?;

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "registry lookup miss");
            return Ok(None);
        }

        let value = response.json().await.map_err(|e| CustodianError::Http {
            source: e,
            context: format!("decoding {url}"),
        })?;
        Ok(Some(value))
    }

    /// Packages published under a maintainer's registry account.
    ///
    /// Only npm exposes a maintainer search; other registries return an empty
    /// list and the packages reputation signal stays ungated.
    pub async fn maintained_packages(
        &self,
        ecosystem: Ecosystem,
        username: &str,
    ) -> Result<Vec<String>> {
        if ecosystem != Ecosystem::Npm || username.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!(
            "https://registry.npmjs.org/-/v1/search?text=maintainer:{username}&size=250"
        );
        let Some(results) = self.get_json(&url).await? else {
            return Ok(Vec::new());
        };

        let packages = results["objects"]
            .as_array()
            .map(|objects| {
                objects
                    .iter()
                    .filter_map(|o| o["package"]["name"].as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        Ok(packages)
    }

    async fn lookup_npm(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        if let Some(info) = self
            .get_json(&format!("https://registry.npmjs.org/{package}"))
            .await?
        {
            facts.version = info["dist-tags"]["latest"].as_str().unwrap_or("").to_string();
            facts.description = info["description"].as_str().unwrap_or("").to_string();
            let repo = match &info["repository"] {
                Value::String(s) => s.clone(),
                other => other["url"].as_str().unwrap_or("").to_string(),
            };
            facts.repository_url = clean_repo_url(&repo);
        }

        if let Some(downloads) = self
            .get_json(&format!(
                "https://api.npmjs.org/downloads/point/last-week/{package}"
            ))
            .await?
        {
            facts.weekly_downloads = downloads["downloads"].as_u64().unwrap_or(0);
        }

        Ok(facts)
    }

    async fn lookup_pypi(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        if let Some(info) = self
            .get_json(&format!("https://pypi.org/pypi/{package}/json"))
            .await?
        {
            let meta = &info["info"];
            facts.version = meta["version"].as_str().unwrap_or("").to_string();
            facts.description = meta["summary"].as_str().unwrap_or("").to_string();

            // Prefer explicit source links from project_urls, then home_page
            let urls = &meta["project_urls"];
            let mut repo = String::new();
            if let Some(map) = urls.as_object() {
                for key in ["Source", "Source Code", "Repository", "Code", "Homepage"] {
                    if let Some(url) = map.get(key).and_then(Value::as_str) {
                        if url.contains("github.com") || url.contains("gitlab.com") {
                            repo = url.to_string();
                            break;
                        }
                    }
                }
            }
            if repo.is_empty() {
                if let Some(home) = meta["home_page"].as_str() {
                    if home.contains("github.com") || home.contains("gitlab.com") {
                        repo = home.to_string();
                    }
                }
            }
            facts.repository_url = clean_repo_url(&repo);
        }

        // pypistats.org publishes recent download counts
        if let Some(stats) = self
            .get_json(&format!("https://pypistats.org/api/packages/{package}/recent"))
            .await?
        {
            facts.weekly_downloads = stats["data"]["last_week"].as_u64().unwrap_or(0);
        }

        Ok(facts)
    }

    async fn lookup_crates(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        if let Some(info) = self
            .get_json(&format!("https://crates.io/api/v1/crates/{package}"))
            .await?
        {
            let krate = &info["crate"];
            facts.version = krate["newest_version"].as_str().unwrap_or("").to_string();
            facts.description = krate["description"].as_str().unwrap_or("").to_string();
            facts.repository_url = clean_repo_url(krate["repository"].as_str().unwrap_or(""));
            // recent_downloads covers the last 90 days (~13 weeks)
            facts.weekly_downloads = krate["recent_downloads"].as_u64().unwrap_or(0) / 13;
        }

        Ok(facts)
    }

    async fn lookup_rubygems(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        if let Some(gem) = self
            .get_json(&format!("https://rubygems.org/api/v1/gems/{package}.json"))
            .await?
        {
            facts.version = gem["version"].as_str().unwrap_or("").to_string();
            facts.description = gem["info"].as_str().unwrap_or("").to_string();
            let repo = gem["source_code_uri"]
                .as_str()
                .filter(|s| !s.is_empty())
                .or_else(|| gem["homepage_uri"].as_str())
                .unwrap_or("");
            // Strip version-specific paths such as /tree/v8.1.2
            let repo = repo.split("/tree/").next().unwrap_or(repo);
            facts.repository_url = clean_repo_url(repo);
            // Total downloads only; approximate a weekly figure assuming a
            // five-year lifetime
            facts.weekly_downloads = gem["downloads"].as_u64().unwrap_or(0) / 260;
        }

        Ok(facts)
    }

    async fn lookup_packagist(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        if let Some(info) = self
            .get_json(&format!("https://packagist.org/packages/{package}.json"))
            .await?
        {
            let pkg = &info["package"];
            facts.description = pkg["description"].as_str().unwrap_or("").to_string();
            facts.repository_url = clean_repo_url(pkg["repository"].as_str().unwrap_or(""));
            facts.weekly_downloads = pkg["downloads"]["daily"].as_u64().unwrap_or(0) * 7;
            if let Some(versions) = pkg["versions"].as_object() {
                if let Some((_, first)) = versions.iter().next() {
                    facts.version = first["version"].as_str().unwrap_or("").to_string();
                }
            }
        }

        Ok(facts)
    }

    async fn lookup_nuget(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        let url = format!(
            "https://azuresearch-usnc.nuget.org/query?q=packageid:{package}&take=1"
        );
        if let Some(info) = self.get_json(&url).await? {
            if let Some(pkg) = info["data"].as_array().and_then(|a| a.first()) {
                facts.version = pkg["version"].as_str().unwrap_or("").to_string();
                facts.description = pkg["description"].as_str().unwrap_or("").to_string();
                facts.weekly_downloads = pkg["totalDownloads"].as_u64().unwrap_or(0) / 260;

                let project_url = pkg["projectUrl"].as_str().unwrap_or("");
                if project_url.contains("github.com") || project_url.contains("gitlab.com") {
                    facts.repository_url = clean_repo_url(project_url);
                }
            }
        }

        Ok(facts)
    }

    async fn lookup_goproxy(&self, package: &str) -> Result<RegistryFacts> {
        let mut facts = RegistryFacts {
            name: package.to_string(),
            ..RegistryFacts::default()
        };

        // For Go modules the module path often IS the repo URL
        if package.starts_with("github.com/") {
            facts.repository_url = format!("https://{package}");
        } else if let Some(name) = package.strip_prefix("golang.org/x/") {
            facts.repository_url = format!("https://github.com/golang/{name}");
        }

        if let Some(info) = self
            .get_json(&format!("https://proxy.golang.org/{package}/@latest"))
            .await?
        {
            facts.version = info["Version"]
                .as_str()
                .unwrap_or("")
                .trim_start_matches('v')
                .to_string();
        }

        // No public download stats for the Go proxy; stars serve as the
        // visibility proxy downstream
        Ok(facts)
    }
}

/// Normalize the various repository URL spellings registries hand back
fn clean_repo_url(url: &str) -> String {
    let mut url = url
        .trim()
        .trim_start_matches("git+")
        .replace("git://", "https://")
        .replace("ssh://git@", "https://");
    if let Some(stripped) = url.strip_suffix(".git") {
        url = stripped.to_string();
    }
    url.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_repo_url() {
        assert_eq!(
            clean_repo_url("git+https://github.com/chalk/chalk.git"),
            "https://github.com/chalk/chalk"
        );
        assert_eq!(
            clean_repo_url("git://github.com/a/b.git"),
            "https://github.com/a/b"
        );
        assert_eq!(
            clean_repo_url("ssh://git@github.com/a/b"),
            "https://github.com/a/b"
        );
        assert_eq!(clean_repo_url("https://github.com/a/b/"), "https://github.com/a/b");
    }

    #[test]
    fn test_client_construction_succeeds() {
        assert!(RegistryClient::new().is_ok());
    }

    #[test]
    fn test_github_passthrough() {
        let facts = RegistryClient::github_passthrough("tukaani-project/xz");
        assert_eq!(facts.repository_url, "https://github.com/tukaani-project/xz");
        assert_eq!(facts.weekly_downloads, 0);

        let facts = RegistryClient::github_passthrough("https://github.com/a/b");
        assert_eq!(facts.repository_url, "https://github.com/a/b");
    }
}
