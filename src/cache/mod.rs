//! SQLite-backed score cache
//!
//! Stores full score breakdowns (JSON blob alongside the queryable columns)
//! so a cached answer reproduces the original output exactly. Current scores
//! and replayed time-series points share one table, distinguished by the
//! cutoff column; an empty cutoff marks the current score.

use std::path::Path;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::error::{CustodianError, Result};
use crate::scoring::{HistoricalScore, RiskBreakdown, RiskLevel};

const MIGRATIONS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS packages (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        ecosystem TEXT NOT NULL,
        repo_url TEXT,
        last_analyzed TEXT,
        UNIQUE(name, ecosystem)
    )",
    "CREATE TABLE IF NOT EXISTS scores (
        id INTEGER PRIMARY KEY,
        package_id INTEGER NOT NULL REFERENCES packages(id) ON DELETE CASCADE,
        cutoff_date TEXT NOT NULL DEFAULT '',
        final_score INTEGER NOT NULL,
        risk_level TEXT NOT NULL,
        base_risk INTEGER NOT NULL,
        activity_modifier INTEGER NOT NULL,
        protective_total INTEGER NOT NULL,
        concentration REAL NOT NULL,
        commits_last_year INTEGER NOT NULL,
        unique_contributors INTEGER NOT NULL,
        weekly_downloads INTEGER NOT NULL,
        breakdown TEXT NOT NULL,
        calculated_at TEXT NOT NULL,
        UNIQUE(package_id, cutoff_date)
    )",
    "CREATE INDEX IF NOT EXISTS idx_scores_package ON scores(package_id, cutoff_date)",
];

fn timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Persistent cache of risk scores, keyed by (package, ecosystem)
pub struct ScoreCache {
    pool: Pool<SqliteConnectionManager>,
}

impl ScoreCache {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CustodianError::Io {
                source: e,
                context: format!("Failed to create cache directory: {:?}", parent),
            })?;
        }

        let manager = SqliteConnectionManager::file(path).with_init(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode = WAL;
                 PRAGMA synchronous = NORMAL;
                 PRAGMA foreign_keys = ON;",
            )
        });
        let pool = Pool::builder()
            .max_size(4)
            .build(manager)
            .map_err(|e| CustodianError::Config(format!("Cache pool error: {e}")))?;

        let cache = Self { pool };
        cache.migrate()?;
        Ok(cache)
    }

    fn conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| CustodianError::Config(format!("Cache pool error: {e}")))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn()?;
        for migration in MIGRATIONS {
            conn.execute(migration, [])?;
        }
        Ok(())
    }

    fn package_id(
        &self,
        conn: &rusqlite::Connection,
        name: &str,
        ecosystem: &str,
        repo_url: Option<&str>,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO packages (name, ecosystem, repo_url) VALUES (?1, ?2, ?3)
             ON CONFLICT(name, ecosystem) DO UPDATE SET
                 repo_url = COALESCE(excluded.repo_url, packages.repo_url)",
            params![name, ecosystem, repo_url],
        )?;
        let id = conn.query_row(
            "SELECT id FROM packages WHERE name = ?1 AND ecosystem = ?2",
            params![name, ecosystem],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Store a breakdown. `cutoff` None means the current score; a replayed
    /// point at the same cutoff replaces the previous one.
    pub fn store(&self, breakdown: &RiskBreakdown, cutoff: Option<DateTime<Utc>>) -> Result<()> {
        let conn = self.conn()?;
        let package_id = self.package_id(
            &conn,
            &breakdown.package_name,
            &breakdown.ecosystem,
            breakdown.repo_url.as_deref(),
        )?;

        let blob = serde_json::to_string(breakdown).map_err(|e| CustodianError::Json {
            source: e,
            context: format!("serializing breakdown for {}", breakdown.package_name),
        })?;
        let now = timestamp(Utc::now());
        let cutoff_key = cutoff.map(timestamp).unwrap_or_default();

        conn.execute(
            "INSERT INTO scores (
                package_id, cutoff_date, final_score, risk_level, base_risk,
                activity_modifier, protective_total, concentration,
                commits_last_year, unique_contributors, weekly_downloads,
                breakdown, calculated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(package_id, cutoff_date) DO UPDATE SET
                 final_score = excluded.final_score,
                 risk_level = excluded.risk_level,
                 base_risk = excluded.base_risk,
                 activity_modifier = excluded.activity_modifier,
                 protective_total = excluded.protective_total,
                 concentration = excluded.concentration,
                 commits_last_year = excluded.commits_last_year,
                 unique_contributors = excluded.unique_contributors,
                 weekly_downloads = excluded.weekly_downloads,
                 breakdown = excluded.breakdown,
                 calculated_at = excluded.calculated_at",
            params![
                package_id,
                cutoff_key,
                breakdown.final_score,
                breakdown.risk_level.as_str(),
                breakdown.base_risk,
                breakdown.activity_modifier,
                breakdown.protective_factors.total(),
                breakdown.maintainer_concentration,
                breakdown.commits_last_year as i64,
                breakdown.unique_contributors as i64,
                breakdown.weekly_downloads as i64,
                blob,
                now,
            ],
        )?;

        if cutoff.is_none() {
            conn.execute(
                "UPDATE packages SET last_analyzed = ?1 WHERE id = ?2",
                params![now, package_id],
            )?;
        }
        Ok(())
    }

    /// Current score if one was calculated within the last `max_age_days`
    pub fn get_fresh(
        &self,
        name: &str,
        ecosystem: &str,
        max_age_days: u32,
    ) -> Result<Option<RiskBreakdown>> {
        let conn = self.conn()?;
        let threshold = timestamp(Utc::now() - Duration::days(i64::from(max_age_days)));

        let blob: Option<String> = conn
            .query_row(
                "SELECT s.breakdown FROM scores s
                 JOIN packages p ON p.id = s.package_id
                 WHERE p.name = ?1 AND p.ecosystem = ?2
                   AND s.cutoff_date = '' AND s.calculated_at >= ?3",
                params![name, ecosystem, threshold],
                |row| row.get(0),
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match blob {
            Some(json) => {
                let breakdown =
                    serde_json::from_str(&json).map_err(|e| CustodianError::Json {
                        source: e,
                        context: format!("deserializing cached breakdown for {name}"),
                    })?;
                Ok(Some(breakdown))
            }
            None => Ok(None),
        }
    }

    /// Record that a package was analyzed now, without touching its scores.
    /// Replay runs call this since they only write cutoff rows.
    pub fn mark_analyzed(&self, name: &str, ecosystem: &str) -> Result<()> {
        let conn = self.conn()?;
        let package_id = self.package_id(&conn, name, ecosystem, None)?;
        conn.execute(
            "UPDATE packages SET last_analyzed = ?1 WHERE id = ?2",
            params![timestamp(Utc::now()), package_id],
        )?;
        Ok(())
    }

    /// Replayed time-series points, oldest first
    pub fn history(&self, name: &str, ecosystem: &str) -> Result<Vec<HistoricalScore>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.cutoff_date, s.final_score, s.risk_level, s.concentration,
                    s.commits_last_year, s.unique_contributors
             FROM scores s
             JOIN packages p ON p.id = s.package_id
             WHERE p.name = ?1 AND p.ecosystem = ?2 AND s.cutoff_date != ''
             ORDER BY s.cutoff_date ASC",
        )?;

        let rows = stmt.query_map(params![name, ecosystem], |row| {
            let cutoff: String = row.get(0)?;
            let level: String = row.get(2)?;
            Ok((
                cutoff,
                row.get::<_, i32>(1)?,
                level,
                row.get::<_, f64>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;

        let mut points = Vec::new();
        for row in rows {
            let (cutoff, score, level, concentration, commits, contributors) = row?;
            let date = cutoff
                .parse::<DateTime<Utc>>()
                .map_err(|e| CustodianError::Config(format!("bad cutoff in cache: {e}")))?;
            points.push(HistoricalScore {
                date,
                score,
                risk_level: RiskLevel::parse(&level).unwrap_or(RiskLevel::VeryLow),
                concentration,
                commits_year: commits as usize,
                contributors: contributors as usize,
            });
        }
        Ok(points)
    }

    /// Drop all replayed points for a package, keeping the current score
    pub fn clear_history(&self, name: &str, ecosystem: &str) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM scores WHERE cutoff_date != '' AND package_id IN (
                 SELECT id FROM packages WHERE name = ?1 AND ecosystem = ?2
             )",
            params![name, ecosystem],
        )?;
        Ok(deleted)
    }

    /// Packages with a cached current score, most recently analyzed first
    pub fn list_packages(&self) -> Result<Vec<(String, String, i32, String)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT p.name, p.ecosystem, s.final_score, s.risk_level
             FROM packages p
             JOIN scores s ON s.package_id = p.id AND s.cutoff_date = ''
             ORDER BY p.last_analyzed DESC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
        })?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(CustodianError::from)
    }

    /// Remove everything cached for a package
    pub fn evict(&self, name: &str, ecosystem: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM packages WHERE name = ?1 AND ecosystem = ?2",
            params![name, ecosystem],
        )?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cache() -> (tempfile::TempDir, ScoreCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ScoreCache::open(&dir.path().join("scores.db")).unwrap();
        (dir, cache)
    }

    fn breakdown(name: &str, score: i32) -> RiskBreakdown {
        let mut b = RiskBreakdown::new(name, "npm", Some("https://github.com/a/b".to_string()));
        b.final_score = score;
        b.risk_level = RiskLevel::from_score(score);
        b.maintainer_concentration = 85.0;
        b.commits_last_year = 12;
        b.unique_contributors = 3;
        b
    }

    #[test]
    fn test_store_and_get_fresh_roundtrip() {
        let (_dir, cache) = cache();
        let b = breakdown("left-pad", 75);
        cache.store(&b, None).unwrap();

        let cached = cache.get_fresh("left-pad", "npm", 7).unwrap().unwrap();
        assert_eq!(cached, b);
    }

    #[test]
    fn test_get_fresh_misses_unknown_package() {
        let (_dir, cache) = cache();
        assert!(cache.get_fresh("ghost", "npm", 7).unwrap().is_none());
    }

    #[test]
    fn test_zero_freshness_always_misses() {
        let (_dir, cache) = cache();
        cache.store(&breakdown("pkg", 40), None).unwrap();
        assert!(cache.get_fresh("pkg", "npm", 0).unwrap().is_none());
    }

    #[test]
    fn test_store_replaces_current_score() {
        let (_dir, cache) = cache();
        cache.store(&breakdown("pkg", 40), None).unwrap();
        cache.store(&breakdown("pkg", 60), None).unwrap();

        let cached = cache.get_fresh("pkg", "npm", 7).unwrap().unwrap();
        assert_eq!(cached.final_score, 60);
        assert_eq!(cache.list_packages().unwrap().len(), 1);
    }

    #[test]
    fn test_history_sorted_and_cleared() {
        let (_dir, cache) = cache();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2023, 11, 1, 0, 0, 0).unwrap();

        cache.store(&breakdown("pkg", 50), Some(later)).unwrap();
        cache.store(&breakdown("pkg", 30), Some(earlier)).unwrap();
        cache.store(&breakdown("pkg", 55), None).unwrap();

        let history = cache.history("pkg", "npm").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, earlier);
        assert_eq!(history[0].score, 30);
        assert_eq!(history[1].score, 50);

        assert_eq!(cache.clear_history("pkg", "npm").unwrap(), 2);
        assert!(cache.history("pkg", "npm").unwrap().is_empty());
        // Current score survives
        assert!(cache.get_fresh("pkg", "npm", 7).unwrap().is_some());
    }

    #[test]
    fn test_evict_removes_everything() {
        let (_dir, cache) = cache();
        cache.store(&breakdown("pkg", 50), None).unwrap();
        assert!(cache.evict("pkg", "npm").unwrap());
        assert!(!cache.evict("pkg", "npm").unwrap());
        assert!(cache.get_fresh("pkg", "npm", 7).unwrap().is_none());
    }
}
