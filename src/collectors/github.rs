//! GitHub repository and maintainer facts
//!
//! REST for repository/user/org data, GraphQL for sponsorship (REST does not
//! expose it). Every sub-fetch degrades to defaults with a warning rather
//! than failing the whole collection; an unauthenticated client works within
//! GitHub's 60 req/hour budget, a `GITHUB_TOKEN` raises that to 5000.

use std::sync::OnceLock;
use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use serde_json::{json, Value};

use crate::collectors::RateLimiter;
use crate::error::{CustodianError, Result};
use crate::scoring::{CiiBadgeLevel, MaintainerRepo};

const API_BASE: &str = "https://api.github.com";
const USER_AGENT: &str = "custodian-risk (https://github.com/anicka-net/custodian)";
const REQUEST_DELAY: Duration = Duration::from_millis(500);

const MAX_REPO_PAGES: usize = 10;
const MAX_ISSUES: usize = 30;
const MAX_ISSUES_WITH_COMMENTS: usize = 10;

fn repo_url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"github\.com[/:]([A-Za-z0-9_.-]+)/([A-Za-z0-9_.-]+)")
            .expect("valid repo url regex")
    })
}

/// `owner/repo` extracted from any GitHub URL spelling
pub fn parse_repo_url(repo_url: &str) -> Option<(String, String)> {
    let caps = repo_url_pattern().captures(repo_url)?;
    let owner = caps.get(1)?.as_str().to_string();
    let repo = caps.get(2)?.as_str().trim_end_matches(".git").to_string();
    Some((owner, repo))
}

/// An issue with its discussion, input to sentiment analysis
#[derive(Debug, Clone, Default)]
pub struct IssueThread {
    pub title: String,
    pub body: String,
    pub comments: Vec<String>,
}

impl IssueThread {
    /// Every text in the thread, for the analyzer
    pub fn texts(&self) -> Vec<String> {
        let mut texts = vec![format!("{} {}", self.title, self.body)];
        texts.extend(self.comments.iter().cloned());
        texts
    }
}

/// Everything the scoring engine needs from GitHub about a repository and
/// its maintainer
#[derive(Debug, Clone, Default)]
pub struct MaintainerFacts {
    pub username: Option<String>,
    pub account_created: Option<DateTime<Utc>>,
    pub repos: Vec<MaintainerRepo>,
    /// None when sponsorship could not be determined (no token)
    pub sponsor_count: Option<u32>,
    pub has_sponsors_listing: bool,
    pub orgs: Vec<String>,

    pub is_org_owned: bool,
    pub org_admin_count: u32,
    pub repo_stars: u64,
    pub cii_badge_level: CiiBadgeLevel,

    pub issues: Vec<IssueThread>,
}

/// GitHub API client with fixed-interval rate limiting
pub struct GitHubClient {
    client: reqwest::Client,
    token: Option<String>,
    limiter: RateLimiter,
}

impl GitHubClient {
    pub fn new(token: Option<String>) -> Result<Self> {
        let token = token.or_else(|| std::env::var("GITHUB_TOKEN").ok());
        if token.is_none() {
            tracing::warn!("no GITHUB_TOKEN set, using unauthenticated rate limits");
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CustodianError::Http {
                source: e,
                context: "building GitHub HTTP client".to_string(),
            })?;
        Ok(Self {
            client,
            token,
            limiter: RateLimiter::new(REQUEST_DELAY),
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &self.token {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers
    }

    async fn get_json(&self, url: &str) -> Result<Option<Value>> {
        self.limiter.acquire().await;
        let response = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| CustodianError::Http {
                source: e,
                context: format!("GET {url}"),
            })?;

        if !response.status().is_success() {
            tracing::debug!(url, status = %response.status(), "github api miss");
            return Ok(None);
        }

        let value = response.json().await.map_err(|e| CustodianError::Http {
            source: e,
            context: format!("decoding {url}"),
        })?;
        Ok(Some(value))
    }

    /// Collect repository and maintainer facts for a GitHub repository.
    ///
    /// A URL that is not a GitHub repository yields empty facts: scoring then
    /// runs on git history and registry data alone.
    pub async fn collect(&self, repo_url: &str) -> Result<MaintainerFacts> {
        let Some((owner, repo)) = parse_repo_url(repo_url) else {
            tracing::warn!(repo_url, "not a GitHub repository, skipping maintainer facts");
            return Ok(MaintainerFacts::default());
        };

        let mut facts = MaintainerFacts::default();

        let Some(repo_info) = self
            .get_json(&format!("{API_BASE}/repos/{owner}/{repo}"))
            .await?
        else {
            tracing::warn!(repo_url, "repository not found on GitHub");
            return Ok(facts);
        };

        facts.repo_stars = repo_info["stargazers_count"].as_u64().unwrap_or(0);
        facts.is_org_owned = repo_info["owner"]["type"].as_str() == Some("Organization");

        if facts.is_org_owned {
            facts.org_admin_count = self.org_admin_count(&owner).await;
        } else {
            // User-owned repository: the owner is the maintainer of record
            facts.username = Some(owner.clone());
            self.fill_maintainer(&mut facts, &owner).await;
        }

        facts.cii_badge_level = self.cii_badge(&owner, &repo).await;
        facts.issues = self.recent_issues(&owner, &repo).await;

        Ok(facts)
    }

    /// Maintainer facts for an explicit username (org-owned repositories
    /// where the active maintainer is known from the git history)
    pub async fn maintainer(&self, username: &str) -> Result<MaintainerFacts> {
        let mut facts = MaintainerFacts {
            username: Some(username.to_string()),
            ..MaintainerFacts::default()
        };
        self.fill_maintainer(&mut facts, username).await;
        Ok(facts)
    }

    async fn fill_maintainer(&self, facts: &mut MaintainerFacts, username: &str) {
        match self.get_json(&format!("{API_BASE}/users/{username}")).await {
            Ok(Some(user)) => {
                facts.account_created = user["created_at"]
                    .as_str()
                    .and_then(|s| s.parse::<DateTime<Utc>>().ok());
            }
            Ok(None) => tracing::warn!(username, "github user not found"),
            Err(e) => tracing::warn!(username, error = %e, "user lookup failed"),
        }

        facts.repos = self.user_repos(username).await;
        facts.orgs = self.user_orgs(username).await;

        match self.sponsors(username).await {
            Ok(Some((listing, count))) => {
                facts.has_sponsors_listing = listing;
                facts.sponsor_count = Some(count);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(username, error = %e, "sponsors lookup failed"),
        }
    }

    /// All non-fork repositories a user owns, paginated
    async fn user_repos(&self, username: &str) -> Vec<MaintainerRepo> {
        let mut repos = Vec::new();
        for page in 1..=MAX_REPO_PAGES {
            let url = format!("{API_BASE}/users/{username}/repos?per_page=100&page={page}");
            let batch = match self.get_json(&url).await {
                Ok(Some(Value::Array(items))) => items,
                Ok(_) => break,
                Err(e) => {
                    tracing::warn!(username, error = %e, "repo listing failed");
                    break;
                }
            };
            let len = batch.len();
            for item in batch {
                repos.push(MaintainerRepo {
                    fork: item["fork"].as_bool().unwrap_or(false),
                    star_count: item["stargazers_count"].as_u64().unwrap_or(0),
                });
            }
            if len < 100 {
                break;
            }
        }
        repos
    }

    async fn user_orgs(&self, username: &str) -> Vec<String> {
        match self
            .get_json(&format!("{API_BASE}/users/{username}/orgs"))
            .await
        {
            Ok(Some(Value::Array(items))) => items
                .iter()
                .filter_map(|o| o["login"].as_str().map(str::to_string))
                .collect(),
            Ok(_) => Vec::new(),
            Err(e) => {
                tracing::warn!(username, error = %e, "org listing failed");
                Vec::new()
            }
        }
    }

    /// Number of organization admins; 0 when membership is not visible
    async fn org_admin_count(&self, org: &str) -> u32 {
        match self
            .get_json(&format!(
                "{API_BASE}/orgs/{org}/members?role=admin&per_page=100"
            ))
            .await
        {
            Ok(Some(Value::Array(items))) => items.len() as u32,
            Ok(_) => 0,
            Err(e) => {
                tracing::warn!(org, error = %e, "admin listing failed");
                0
            }
        }
    }

    /// Sponsorship via GraphQL; Ok(None) when no token is configured
    async fn sponsors(&self, username: &str) -> Result<Option<(bool, u32)>> {
        if self.token.is_none() {
            return Ok(None);
        }

        let query = json!({
            "query": "query($login: String!) { user(login: $login) { hasSponsorsListing sponsors { totalCount } } }",
            "variables": { "login": username },
        });

        self.limiter.acquire().await;
        let response = self
            .client
            .post(format!("{API_BASE}/graphql"))
            .headers(self.headers())
            .json(&query)
            .send()
            .await
            .map_err(|e| CustodianError::Http {
                source: e,
                context: "POST /graphql".to_string(),
            })?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: Value = response.json().await.map_err(|e| CustodianError::Http {
            source: e,
            context: "decoding /graphql".to_string(),
        })?;

        let user = &body["data"]["user"];
        if user.is_null() {
            return Ok(None);
        }
        Ok(Some((
            user["hasSponsorsListing"].as_bool().unwrap_or(false),
            user["sponsors"]["totalCount"].as_u64().unwrap_or(0) as u32,
        )))
    }

    /// OpenSSF best-practices badge level for the repository
    async fn cii_badge(&self, owner: &str, repo: &str) -> CiiBadgeLevel {
        let url = format!(
            "https://www.bestpractices.dev/projects.json?url=https://github.com/{owner}/{repo}"
        );
        let Ok(Some(Value::Array(projects))) = self.get_json(&url).await else {
            return CiiBadgeLevel::None;
        };
        let Some(level) = projects
            .first()
            .and_then(|p| p["badge_level"].as_str())
        else {
            return CiiBadgeLevel::None;
        };
        match level {
            "gold" => CiiBadgeLevel::Gold,
            "silver" => CiiBadgeLevel::Silver,
            s if s.starts_with("passing") => CiiBadgeLevel::Passing,
            _ => CiiBadgeLevel::None,
        }
    }

    /// Recent issues with discussion, newest first. Comment bodies are only
    /// fetched for the first few threads to bound the request count.
    async fn recent_issues(&self, owner: &str, repo: &str) -> Vec<IssueThread> {
        let url = format!(
            "{API_BASE}/repos/{owner}/{repo}/issues?state=all&sort=created&direction=desc&per_page={MAX_ISSUES}"
        );
        let items = match self.get_json(&url).await {
            Ok(Some(Value::Array(items))) => items,
            Ok(_) => return Vec::new(),
            Err(e) => {
                tracing::warn!(owner, repo, error = %e, "issue listing failed");
                return Vec::new();
            }
        };

        let mut threads = Vec::new();
        let mut with_comments = 0usize;
        for item in items {
            // Pull requests appear in the issues listing too
            if !item["pull_request"].is_null() {
                continue;
            }
            let mut thread = IssueThread {
                title: item["title"].as_str().unwrap_or("").to_string(),
                body: item["body"].as_str().unwrap_or("").to_string(),
                comments: Vec::new(),
            };

            let comment_count = item["comments"].as_u64().unwrap_or(0);
            if comment_count > 0 && with_comments < MAX_ISSUES_WITH_COMMENTS {
                if let Some(comments_url) = item["comments_url"].as_str() {
                    if let Ok(Some(Value::Array(comments))) = self.get_json(comments_url).await {
                        thread.comments = comments
                            .iter()
                            .filter_map(|c| c["body"].as_str().map(str::to_string))
                            .collect();
                        with_comments += 1;
                    }
                }
            }

            threads.push(thread);
        }
        threads
    }
}
