//! Git repository source
//!
//! Clones or updates repositories (blobless partial clones: commit metadata
//! is needed for the full history, file content never is) and extracts the
//! complete, unfiltered commit list. Date filtering is the analyzer's job.

use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use chrono::{DateTime, Utc};
use tokio::process::Command;

use crate::error::{CustodianError, Result};
use crate::history::Commit;

// Unit/record separators keep multi-line commit messages parseable
const FIELD_SEP: char = '\x1f';
const RECORD_SEP: char = '\x1e';
const LOG_FORMAT: &str = "%H%x1f%an%x1f%ae%x1f%at%x1f%B%x1e";

/// Commit source backed by local clones under a working directory
pub struct GitSource {
    repos_dir: PathBuf,
}

impl GitSource {
    pub fn new(repos_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&repos_dir).map_err(|e| CustodianError::Io {
            source: e,
            context: format!("Failed to create repos directory: {:?}", repos_dir),
        })?;
        Ok(Self { repos_dir })
    }

    /// Local path for a repository: readable name plus a URL hash so
    /// different forks with the same name do not collide
    fn repo_path(&self, repo_url: &str) -> PathBuf {
        let mut hasher = ahash::AHasher::default();
        repo_url.hash(&mut hasher);
        let digest = hasher.finish();

        let name = repo_url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or("repo")
            .trim_end_matches(".git");
        self.repos_dir.join(format!("{name}_{digest:012x}"))
    }

    /// Clone a repository, or fetch if a clone already exists.
    ///
    /// Fresh clones go into a temporary directory and are renamed into place
    /// once complete, so a cancelled collection never leaves a partial clone
    /// visible to the next collection of the same package.
    pub async fn clone_or_update(&self, repo_url: &str) -> Result<PathBuf> {
        let repo_path = self.repo_path(repo_url);

        if repo_path.exists() {
            tracing::info!(path = ?repo_path, "updating existing repository");
            let status = Command::new("git")
                .arg("-C")
                .arg(&repo_path)
                .args(["fetch", "origin"])
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .status()
                .await
                .map_err(|e| CustodianError::Io {
                    source: e,
                    context: "Failed to run git fetch".to_string(),
                })?;

            if status.success() {
                return Ok(repo_path);
            }

            tracing::warn!(path = ?repo_path, "fetch failed, re-cloning");
            std::fs::remove_dir_all(&repo_path).map_err(|e| CustodianError::Io {
                source: e,
                context: format!("Failed to remove stale clone: {:?}", repo_path),
            })?;
        }

        tracing::info!(repo_url, "cloning repository");
        let staging = tempfile::tempdir_in(&self.repos_dir).map_err(|e| CustodianError::Io {
            source: e,
            context: "Failed to create clone staging directory".to_string(),
        })?;
        let staging_clone = staging.path().join("clone");

        let output = Command::new("git")
            .args(["clone", "--filter=blob:none", "--single-branch", repo_url])
            .arg(&staging_clone)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CustodianError::Io {
                source: e,
                context: "Failed to run git clone".to_string(),
            })?;

        if !output.status.success() {
            return Err(CustodianError::Git {
                repo_url: repo_url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        std::fs::rename(&staging_clone, &repo_path).map_err(|e| CustodianError::Io {
            source: e,
            context: format!("Failed to move clone into place: {:?}", repo_path),
        })?;

        Ok(repo_path)
    }

    /// Extract the full commit history, ordered oldest first
    pub async fn all_commits(&self, repo_path: &Path, repo_url: &str) -> Result<Vec<Commit>> {
        let output = Command::new("git")
            .arg("-C")
            .arg(repo_path)
            .args(["log", "--all", &format!("--pretty=format:{LOG_FORMAT}")])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| CustodianError::Io {
                source: e,
                context: "Failed to run git log".to_string(),
            })?;

        if !output.status.success() {
            return Err(CustodianError::Git {
                repo_url: repo_url.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout);
        let mut commits = parse_log(&text);
        commits.sort_by(|a, b| a.authored_at.cmp(&b.authored_at));
        Ok(commits)
    }

    /// Clone/update and extract history in one call
    pub async fn collect(&self, repo_url: &str) -> Result<Vec<Commit>> {
        let path = self.clone_or_update(repo_url).await?;
        self.all_commits(&path, repo_url).await
    }
}

fn parse_log(text: &str) -> Vec<Commit> {
    text.split(RECORD_SEP)
        .filter_map(|record| {
            let record = record.trim_start_matches(['\n', '\r']);
            let mut fields = record.splitn(5, FIELD_SEP);
            let sha = fields.next()?.trim();
            if sha.is_empty() {
                return None;
            }
            let author_name = fields.next()?.to_string();
            let author_email = fields.next()?.to_string();
            let timestamp: i64 = fields.next()?.trim().parse().ok()?;
            let message = fields.next().unwrap_or("").trim_end().to_string();

            let authored_at: DateTime<Utc> = DateTime::from_timestamp(timestamp, 0)?;

            Some(Commit {
                sha: sha.to_string(),
                author_name,
                author_email,
                authored_at,
                message,
            })
        })
        .collect()
}
