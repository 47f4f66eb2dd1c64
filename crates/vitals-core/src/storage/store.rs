use crate::model::{
    Build, BuildState, Cherrypick, CherrypickIssue, Commit, MetricResult, NewRelease,
    PullRequestStatus, Release,
};
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Timestamps are stored as fixed-width UTC text so that SQL range
/// comparisons are plain lexicographic comparisons.
const TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

fn ts_to_db(t: &DateTime<Utc>) -> String {
    t.format(TS_FORMAT).to_string()
}

fn ts_from_db(s: &str) -> anyhow::Result<DateTime<Utc>> {
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|n| n.and_utc())
        .with_context(|| format!("invalid stored timestamp: {s}"))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn in_placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // --- Writers ---
    //
    // Each writer wraps one record in its own transaction. Duplicate keys and
    // dangling references roll back that record alone and report a skip; a
    // bad record never aborts the page it arrived in.

    pub fn insert_commit(&self, commit: &Commit) -> anyhow::Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let res = tx.execute(
            "INSERT INTO commits(hash, committed_at, pull_request, pull_request_status)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(hash) DO NOTHING",
            params![
                commit.hash,
                ts_to_db(&commit.committed_at),
                commit.pull_request,
                commit.pull_request_status.as_str()
            ],
        );
        match res {
            Ok(n) => {
                tx.commit()?;
                Ok(n > 0)
            }
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(hash = %commit.hash, "dropping conflicting commit");
                Ok(false)
            }
            Err(e) => Err(e).context("insert commit"),
        }
    }

    pub fn insert_build(&self, build: &Build) -> anyhow::Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let res = tx.execute(
            "INSERT INTO builds(id, number, duration, state, started_at, commit_hash)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            params![
                build.id,
                build.number,
                build.duration,
                build.state.as_str(),
                build.started_at.as_ref().map(ts_to_db),
                build.commit_hash
            ],
        );
        match res {
            Ok(n) => {
                tx.commit()?;
                Ok(n > 0)
            }
            Err(e) if is_constraint_violation(&e) => {
                // Duplicate build, or a build for a commit not in the DB.
                tracing::debug!(id = build.id, "dropping conflicting build");
                Ok(false)
            }
            Err(e) => Err(e).context("insert build"),
        }
    }

    pub fn insert_release(&self, release: &NewRelease) -> anyhow::Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let res = tx.execute(
            "INSERT INTO releases(published_at, name) VALUES (?1, ?2)
             ON CONFLICT(name) DO NOTHING",
            params![ts_to_db(&release.published_at), release.name],
        );
        match res {
            Ok(n) => {
                tx.commit()?;
                Ok(n > 0)
            }
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(name = %release.name, "dropping conflicting release");
                Ok(false)
            }
            Err(e) => Err(e).context("insert release"),
        }
    }

    pub fn insert_cherrypick_issue(&self, issue: &CherrypickIssue) -> anyhow::Result<bool> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let res = tx.execute(
            "INSERT INTO cherrypick_issues(number, created_at, pull_request_number)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(number) DO NOTHING",
            params![
                issue.number,
                ts_to_db(&issue.created_at),
                issue.pull_request_number
            ],
        );
        match res {
            Ok(n) => {
                tx.commit()?;
                Ok(n > 0)
            }
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(number = issue.number, "dropping conflicting cherry-pick issue");
                Ok(false)
            }
            Err(e) => Err(e).context("insert cherry-pick issue"),
        }
    }

    /// Record the cherry-picks found for a release and flip its
    /// `scraped_cherrypicks` flag, in one transaction. The flag transitions
    /// false to true exactly once per release.
    pub fn record_release_cherrypicks(
        &self,
        release_id: i64,
        picks: &[Cherrypick],
    ) -> anyhow::Result<usize> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let mut saved = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO cherrypicks(hash, release_id) VALUES (?1, ?2)
                 ON CONFLICT(hash) DO NOTHING",
            )?;
            for pick in picks {
                saved += stmt.execute(params![pick.hash, release_id])?;
            }
        }
        tx.execute(
            "UPDATE releases SET scraped_cherrypicks = 1 WHERE id = ?1",
            params![release_id],
        )?;
        tx.commit()?;
        Ok(saved)
    }

    /// Append one metric result. Results are never updated or deleted.
    pub fn insert_metric_result(
        &self,
        name: &str,
        value: f64,
        computed_at: DateTime<Utc>,
    ) -> anyhow::Result<MetricResult> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO metric_results(name, value, computed_at) VALUES (?1, ?2, ?3)",
            params![name, value, ts_to_db(&computed_at)],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;
        Ok(MetricResult {
            id,
            name: name.to_string(),
            value,
            computed_at,
        })
    }

    // --- High- and low-water marks ---

    fn boundary_ts(&self, sql: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
        let conn = self.conn.lock().unwrap();
        let raw: Option<String> = conn.query_row(sql, [], |r| r.get(0)).optional()?;
        raw.as_deref().map(ts_from_db).transpose()
    }

    pub fn latest_commit_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts("SELECT committed_at FROM commits ORDER BY committed_at DESC LIMIT 1")
    }

    pub fn oldest_commit_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts("SELECT committed_at FROM commits ORDER BY committed_at ASC LIMIT 1")
    }

    pub fn latest_build_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts(
            "SELECT started_at FROM builds WHERE started_at IS NOT NULL
             ORDER BY started_at DESC LIMIT 1",
        )
    }

    pub fn oldest_build_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts(
            "SELECT started_at FROM builds WHERE started_at IS NOT NULL
             ORDER BY started_at ASC LIMIT 1",
        )
    }

    pub fn latest_release_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts("SELECT published_at FROM releases ORDER BY published_at DESC LIMIT 1")
    }

    pub fn oldest_release_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts("SELECT published_at FROM releases ORDER BY published_at ASC LIMIT 1")
    }

    pub fn latest_cherrypick_issue_time(&self) -> anyhow::Result<Option<DateTime<Utc>>> {
        self.boundary_ts(
            "SELECT created_at FROM cherrypick_issues ORDER BY created_at DESC LIMIT 1",
        )
    }

    // --- Metric input queries ---

    /// Number of builds per state, within the window, restricted to `states`.
    pub fn build_state_counts(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        states: &[BuildState],
    ) -> anyhow::Result<HashMap<BuildState, i64>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT state, COUNT(*) FROM builds
             WHERE started_at >= ?1 AND started_at <= ?2 AND state IN ({})
             GROUP BY state",
            in_placeholders(states.len())
        );
        let mut bind: Vec<String> = vec![ts_to_db(&since), ts_to_db(&until)];
        bind.extend(states.iter().map(|s| s.as_str().to_string()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut counts = HashMap::new();
        for row in rows {
            let (state, count) = row?;
            counts.insert(BuildState::parse(&state)?, count);
        }
        Ok(counts)
    }

    /// Builds in the window restricted to `states`, ordered by their owning
    /// commit's time. Builds with no stored commit are not returned.
    pub fn builds_by_commit_time(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        states: &[BuildState],
    ) -> anyhow::Result<Vec<Build>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT b.id, b.number, b.duration, b.state, b.started_at, b.commit_hash
             FROM builds b JOIN commits c ON b.commit_hash = c.hash
             WHERE b.started_at >= ?1 AND b.started_at <= ?2 AND b.state IN ({})
             ORDER BY c.committed_at ASC, b.id ASC",
            in_placeholders(states.len())
        );
        let mut bind: Vec<String> = vec![ts_to_db(&since), ts_to_db(&until)];
        bind.extend(states.iter().map(|s| s.as_str().to_string()));

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
            ))
        })?;

        let mut builds = Vec::new();
        for row in rows {
            let (id, number, duration, state, started_at, commit_hash) = row?;
            builds.push(Build {
                id,
                number,
                duration,
                state: BuildState::parse(&state)?,
                started_at: started_at.as_deref().map(ts_from_db).transpose()?,
                commit_hash,
            });
        }
        Ok(builds)
    }

    /// Mean duration in seconds of terminal builds in the window, or `None`
    /// when no such build exists.
    pub fn mean_build_duration(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Option<f64>> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT AVG(duration) FROM builds
             WHERE started_at >= ?1 AND started_at <= ?2
               AND duration IS NOT NULL AND state IN ({})",
            in_placeholders(BuildState::TERMINAL.len())
        );
        let mut bind: Vec<String> = vec![ts_to_db(&since), ts_to_db(&until)];
        bind.extend(BuildState::TERMINAL.iter().map(|s| s.as_str().to_string()));
        let mean: Option<f64> =
            conn.query_row(&sql, params_from_iter(bind.iter()), |r| r.get(0))?;
        Ok(mean)
    }

    pub fn count_builds_in_states(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
        states: &[BuildState],
    ) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT COUNT(*) FROM builds
             WHERE started_at >= ?1 AND started_at <= ?2 AND state IN ({})",
            in_placeholders(states.len())
        );
        let mut bind: Vec<String> = vec![ts_to_db(&since), ts_to_db(&until)];
        bind.extend(states.iter().map(|s| s.as_str().to_string()));
        let count = conn.query_row(&sql, params_from_iter(bind.iter()), |r| r.get(0))?;
        Ok(count)
    }

    /// Releases published in the window, newest first.
    pub fn releases_in_window(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Release>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, published_at, name, scraped_cherrypicks FROM releases
             WHERE published_at >= ?1 AND published_at <= ?2
             ORDER BY published_at DESC",
        )?;
        let rows = stmt.query_map(params![ts_to_db(&since), ts_to_db(&until)], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;
        let mut releases = Vec::new();
        for row in rows {
            let (id, published_at, name, scraped_cherrypicks) = row?;
            releases.push(Release {
                id,
                published_at: ts_from_db(&published_at)?,
                name,
                scraped_cherrypicks,
            });
        }
        Ok(releases)
    }

    pub fn count_commits_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM commits WHERE committed_at BETWEEN ?1 AND ?2",
            params![ts_to_db(&start), ts_to_db(&end)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    pub fn count_cherrypick_issues(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> anyhow::Result<i64> {
        let conn = self.conn.lock().unwrap();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM cherrypick_issues WHERE created_at >= ?1 AND created_at <= ?2",
            params![ts_to_db(&since), ts_to_db(&until)],
            |r| r.get(0),
        )?;
        Ok(count)
    }

    /// The most recent commit strictly before `base_time`.
    pub fn latest_commit_before(
        &self,
        base_time: DateTime<Utc>,
    ) -> anyhow::Result<Option<Commit>> {
        let conn = self.conn.lock().unwrap();
        let row: Option<(String, String, Option<i64>, String)> = conn
            .query_row(
                "SELECT hash, committed_at, pull_request, pull_request_status FROM commits
                 WHERE committed_at < ?1 ORDER BY committed_at DESC LIMIT 1",
                params![ts_to_db(&base_time)],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()?;
        row.map(|(hash, committed_at, pull_request, status)| {
            Ok(Commit {
                hash,
                committed_at: ts_from_db(&committed_at)?,
                pull_request,
                pull_request_status: PullRequestStatus::parse(&status)?,
            })
        })
        .transpose()
    }

    // --- Cherry-pick scraping support ---

    /// Releases whose cherry-picks have not been scraped yet, oldest first,
    /// optionally restricted to a publish-time window.
    pub fn releases_pending_cherrypicks(
        &self,
        window: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> anyhow::Result<Vec<Release>> {
        let conn = self.conn.lock().unwrap();
        let (sql, bind) = match window {
            Some((since, until)) => (
                "SELECT id, published_at, name, scraped_cherrypicks FROM releases
                 WHERE scraped_cherrypicks = 0 AND published_at >= ?1 AND published_at <= ?2
                 ORDER BY published_at ASC",
                vec![ts_to_db(&since), ts_to_db(&until)],
            ),
            None => (
                "SELECT id, published_at, name, scraped_cherrypicks FROM releases
                 WHERE scraped_cherrypicks = 0 ORDER BY published_at ASC",
                vec![],
            ),
        };
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(params_from_iter(bind.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;
        let mut releases = Vec::new();
        for row in rows {
            let (id, published_at, name, scraped_cherrypicks) = row?;
            releases.push(Release {
                id,
                published_at: ts_from_db(&published_at)?,
                name,
                scraped_cherrypicks,
            });
        }
        Ok(releases)
    }

    /// Every commit hash already known, either as a branch commit or as a
    /// previously recorded cherry-pick.
    pub fn known_commit_hashes(&self) -> anyhow::Result<HashSet<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT hash FROM commits UNION SELECT hash FROM cherrypicks")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut hashes = HashSet::new();
        for row in rows {
            hashes.insert(row?);
        }
        Ok(hashes)
    }

    // --- Metric results ---

    /// The single most recent result per metric name, via a join against a
    /// per-name max-timestamp subquery.
    pub fn latest_metric_results(&self, names: &[&str]) -> anyhow::Result<Vec<MetricResult>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT m.id, m.name, m.value, m.computed_at
             FROM metric_results m
             JOIN (SELECT name, MAX(computed_at) AS max_computed_at
                   FROM metric_results WHERE name IN ({})
                   GROUP BY name) latest
             ON m.name = latest.name AND m.computed_at = latest.max_computed_at",
            in_placeholders(names.len())
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(names.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, f64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut results = Vec::new();
        for row in rows {
            let (id, name, value, computed_at) = row?;
            results.push(MetricResult {
                id,
                name,
                value,
                computed_at: ts_from_db(&computed_at)?,
            });
        }
        Ok(results)
    }

    pub fn earliest_metric_result_time(
        &self,
        names: &[&str],
    ) -> anyhow::Result<Option<DateTime<Utc>>> {
        if names.is_empty() {
            return Ok(None);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!(
            "SELECT computed_at FROM metric_results WHERE name IN ({})
             ORDER BY computed_at ASC LIMIT 1",
            in_placeholders(names.len())
        );
        let raw: Option<String> = conn
            .query_row(&sql, params_from_iter(names.iter()), |r| r.get(0))
            .optional()?;
        raw.as_deref().map(ts_from_db).transpose()
    }

    // --- Retention ---

    /// Drop builds whose start time falls before `cutoff`.
    pub fn prune_builds_before(&self, cutoff: DateTime<Utc>) -> anyhow::Result<usize> {
        let conn = self.conn.lock().unwrap();
        let deleted = conn.execute(
            "DELETE FROM builds WHERE started_at < ?1",
            params![ts_to_db(&cutoff)],
        )?;
        tracing::info!(deleted, "pruned old builds");
        Ok(deleted)
    }

    // --- Diagnostics ---

    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        // Allowlist, since table names cannot be bound as parameters.
        const TABLES: [&str; 6] = [
            "commits",
            "builds",
            "releases",
            "cherrypicks",
            "cherrypick_issues",
            "metric_results",
        ];
        if !TABLES.contains(&table) {
            anyhow::bail!("invalid table name for count_rows: {}", table);
        }
        let conn = self.conn.lock().unwrap();
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn commit(hash: &str, at: DateTime<Utc>) -> Commit {
        Commit {
            hash: hash.to_string(),
            committed_at: at,
            pull_request: None,
            pull_request_status: PullRequestStatus::Unknown,
        }
    }

    fn store() -> Store {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    #[test]
    fn timestamps_round_trip_and_sort_lexicographically() {
        let a = ts(1, 0);
        let b = ts(2, 12);
        assert_eq!(ts_from_db(&ts_to_db(&a)).unwrap(), a);
        assert!(ts_to_db(&a) < ts_to_db(&b));
    }

    #[test]
    fn duplicate_commit_is_skipped() {
        let store = store();
        let c = commit("abc", ts(1, 0));
        assert!(store.insert_commit(&c).unwrap());
        assert!(!store.insert_commit(&c).unwrap());
        assert_eq!(store.count_rows("commits").unwrap(), 1);
    }

    #[test]
    fn build_for_missing_commit_is_dropped() {
        let store = store();
        let build = Build {
            id: 1,
            number: 1,
            duration: Some(60.0),
            state: BuildState::Passed,
            started_at: Some(ts(1, 0)),
            commit_hash: Some("missing".to_string()),
        };
        assert!(!store.insert_build(&build).unwrap());
        assert_eq!(store.count_rows("builds").unwrap(), 0);

        store.insert_commit(&commit("missing", ts(1, 0))).unwrap();
        assert!(store.insert_build(&build).unwrap());
        assert!(!store.insert_build(&build).unwrap());
        assert_eq!(store.count_rows("builds").unwrap(), 1);
    }

    #[test]
    fn release_names_are_unique() {
        let store = store();
        let release = NewRelease {
            published_at: ts(1, 0),
            name: "v1".to_string(),
        };
        assert!(store.insert_release(&release).unwrap());
        assert!(!store.insert_release(&release).unwrap());
        assert_eq!(store.count_rows("releases").unwrap(), 1);
    }

    #[test]
    fn recording_cherrypicks_flips_the_release_flag_once() {
        let store = store();
        store
            .insert_release(&NewRelease {
                published_at: ts(1, 0),
                name: "v1".to_string(),
            })
            .unwrap();
        let release = &store.releases_pending_cherrypicks(None).unwrap()[0];
        assert!(!release.scraped_cherrypicks);

        let picks = vec![
            Cherrypick {
                hash: "a".to_string(),
                release_id: release.id,
            },
            Cherrypick {
                hash: "b".to_string(),
                release_id: release.id,
            },
        ];
        assert_eq!(
            store.record_release_cherrypicks(release.id, &picks).unwrap(),
            2
        );
        assert!(store.releases_pending_cherrypicks(None).unwrap().is_empty());
        assert_eq!(store.count_rows("cherrypicks").unwrap(), 2);
    }

    #[test]
    fn latest_metric_results_picks_max_computed_at_per_name() {
        let store = store();
        store
            .insert_metric_result("AMetric", 1.0, ts(1, 0))
            .unwrap();
        store
            .insert_metric_result("AMetric", 2.0, ts(3, 0))
            .unwrap();
        store
            .insert_metric_result("BMetric", 9.0, ts(2, 0))
            .unwrap();

        let results = store
            .latest_metric_results(&["AMetric", "BMetric", "CMetric"])
            .unwrap();
        assert_eq!(results.len(), 2);
        let a = results.iter().find(|r| r.name == "AMetric").unwrap();
        assert_eq!(a.value, 2.0);
        assert_eq!(a.computed_at, ts(3, 0));
    }

    #[test]
    fn earliest_metric_result_time_spans_names() {
        let store = store();
        assert!(store
            .earliest_metric_result_time(&["AMetric"])
            .unwrap()
            .is_none());
        store
            .insert_metric_result("AMetric", 1.0, ts(5, 0))
            .unwrap();
        store
            .insert_metric_result("BMetric", 1.0, ts(2, 0))
            .unwrap();
        assert_eq!(
            store
                .earliest_metric_result_time(&["AMetric", "BMetric"])
                .unwrap(),
            Some(ts(2, 0))
        );
    }

    #[test]
    fn prune_drops_only_old_builds() {
        let store = store();
        store.insert_commit(&commit("c1", ts(1, 0))).unwrap();
        for (id, day) in [(1, 1), (2, 20)] {
            store
                .insert_build(&Build {
                    id,
                    number: id,
                    duration: Some(1.0),
                    state: BuildState::Passed,
                    started_at: Some(ts(day, 0)),
                    commit_hash: Some("c1".to_string()),
                })
                .unwrap();
        }
        assert_eq!(store.prune_builds_before(ts(10, 0)).unwrap(), 1);
        assert_eq!(store.count_rows("builds").unwrap(), 1);
    }

    #[test]
    fn latest_commit_before_is_strict() {
        let store = store();
        store.insert_commit(&commit("c1", ts(1, 0))).unwrap();
        store.insert_commit(&commit("c2", ts(5, 0))).unwrap();
        let found = store.latest_commit_before(ts(5, 0)).unwrap().unwrap();
        assert_eq!(found.hash, "c1");
        assert!(store.latest_commit_before(ts(1, 0)).unwrap().is_none());
    }
}
