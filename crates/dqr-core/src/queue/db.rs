//! Persistent download-queue database (SQLite via sqlx).
//!
//! Keyed store of job rows: dedup/reactivation upsert on
//! `(source_id, target_path)`, full scan in insertion order, point and
//! predicate delete, and the claim/retry transitions the runner drives.

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::job::{Job, JobId, JobSpec, JobState};

/// Percent-encode a path for use in a sqlite:// URI so spaces and special chars don't break parsing.
fn path_to_sqlite_uri(path: &Path) -> String {
    let s = path.to_string_lossy();
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' => out.push_str("%25"),
            ' ' => out.push_str("%20"),
            '#' => out.push_str("%23"),
            '?' => out.push_str("%3F"),
            '&' => out.push_str("%26"),
            c => out.push(c),
        }
    }
    format!("sqlite://{}", out)
}

/// Handle to the SQLite-backed queue database.
///
/// The database file is stored under the XDG state directory:
/// `~/.local/state/dqr/queue.db`.
#[derive(Clone)]
pub struct QueueDb {
    pool: Pool<Sqlite>,
}

impl QueueDb {
    /// Open (or create) the default queue database and run migrations.
    pub async fn open_default() -> Result<Self> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("dqr")?;
        let state_dir = xdg_dirs.get_state_home().join("dqr");
        let db_path = state_dir.join("queue.db");

        tokio::fs::create_dir_all(&state_dir).await?;

        let uri = path_to_sqlite_uri(&db_path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;

        let db = QueueDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// Open (or create) the database at a specific path. Creates parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let uri = path_to_sqlite_uri(path) + "?mode=rwc";
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect(&uri)
            .await?;
        let db = QueueDb { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        // Single jobs table. `state` is the integer-backed JobState; the
        // transient received/filesize counters are deliberately not columns.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id TEXT NOT NULL,
                target_path TEXT NOT NULL,
                quality INTEGER NOT NULL DEFAULT 0,
                private INTEGER NOT NULL DEFAULT 0,
                state INTEGER NOT NULL DEFAULT 0,
                origin_checksum TEXT,
                version_tag TEXT,
                title TEXT,
                art_url TEXT,
                access_token TEXT,
                stream_source_id TEXT,
                is_episode INTEGER NOT NULL DEFAULT 0,
                direct_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn job_from_row(row: &sqlx::sqlite::SqliteRow) -> Job {
        let raw_state: i64 = row.get("state");
        Job {
            id: row.get("id"),
            source_id: row.get("source_id"),
            target_path: row.get("target_path"),
            quality: row.get("quality"),
            private: row.get::<i64, _>("private") != 0,
            // Unknown values cannot appear through this module; map them to
            // Error rather than panicking on a hand-edited database.
            state: JobState::from_i64(raw_state).unwrap_or(JobState::Error),
            origin_checksum: row.get("origin_checksum"),
            version_tag: row.get("version_tag"),
            title: row.get("title"),
            art_url: row.get("art_url"),
            access_token: row.get("access_token"),
            stream_source_id: row.get("stream_source_id"),
            is_episode: row.get::<i64, _>("is_episode") != 0,
            direct_url: row.get("direct_url"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        }
    }

    /// Enqueue one job, applying the dedup/reactivation rule atomically:
    /// an existing `(source_id, target_path)` row at a terminal state is
    /// reset to `None` (same id, quality kept); a non-terminal row is left
    /// untouched; otherwise a new row is inserted.
    pub async fn add_job(&self, spec: &JobSpec) -> Result<JobId> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            r#"
            SELECT id, state FROM jobs
            WHERE source_id = ?1 AND target_path = ?2
            "#,
        )
        .bind(&spec.source_id)
        .bind(&spec.target_path)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(row) = existing {
            let id: i64 = row.get("id");
            let state: i64 = row.get("state");
            if state >= JobState::Done.as_i64() {
                sqlx::query(
                    r#"
                    UPDATE jobs
                    SET state = 0,
                        updated_at = ?1
                    WHERE id = ?2
                    "#,
                )
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await?;
                tracing::debug!(id, source_id = %spec.source_id, "reactivated terminal job");
            } else {
                tracing::debug!(id, source_id = %spec.source_id, "job already queued or in progress");
            }
            tx.commit().await?;
            return Ok(id);
        }

        let id = sqlx::query(
            r#"
            INSERT INTO jobs (
                source_id, target_path, quality, private, state,
                origin_checksum, version_tag, title, art_url,
                access_token, stream_source_id, is_episode, direct_url,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 0,
                      ?5, ?6, ?7, ?8,
                      ?9, ?10, ?11, ?12,
                      ?13, ?14)
            "#,
        )
        .bind(&spec.source_id)
        .bind(&spec.target_path)
        .bind(spec.quality)
        .bind(spec.private as i64)
        .bind(&spec.origin_checksum)
        .bind(&spec.version_tag)
        .bind(&spec.title)
        .bind(&spec.art_url)
        .bind(&spec.access_token)
        .bind(&spec.stream_source_id)
        .bind(spec.is_episode as i64)
        .bind(&spec.direct_url)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;
        tracing::debug!(id, source_id = %spec.source_id, "inserted new job");
        Ok(id)
    }

    /// Enqueue a batch of specs, returning the (existing or new) id for each.
    pub async fn add_jobs(&self, specs: &[JobSpec]) -> Result<Vec<JobId>> {
        let mut ids = Vec::with_capacity(specs.len());
        for spec in specs {
            ids.push(self.add_job(spec).await?);
        }
        Ok(ids)
    }

    /// Full snapshot in persisted insertion order.
    pub async fn list_jobs(&self) -> Result<Vec<Job>> {
        let rows = sqlx::query("SELECT * FROM jobs ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(Self::job_from_row).collect())
    }

    pub async fn get_job(&self, id: JobId) -> Result<Option<Job>> {
        let row = sqlx::query("SELECT * FROM jobs WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(Self::job_from_row))
    }

    /// Atomically pick the next non-terminal job (smallest id) and mark it
    /// `Downloading`. Returns the claimed job, or None when the queue is
    /// drained.
    pub async fn claim_next_job(&self) -> Result<Option<Job>> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            SELECT * FROM jobs
            WHERE state < ?1
            ORDER BY id ASC
            LIMIT 1
            "#,
        )
        .bind(JobState::Done.as_i64())
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let mut job = Self::job_from_row(&row);
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(JobState::Downloading.as_i64())
        .bind(now)
        .bind(job.id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        job.state = JobState::Downloading;
        Ok(Some(job))
    }

    /// Update the state of an existing job.
    pub async fn set_state(&self, id: JobId, state: JobState) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = ?1,
                updated_at = ?2
            WHERE id = ?3
            "#,
        )
        .bind(state.as_i64())
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Permanently remove a job row.
    pub async fn remove_job(&self, id: JobId) -> Result<()> {
        sqlx::query("DELETE FROM jobs WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Predicate delete: every row with `state >= min_state`, except the
    /// optionally excluded id (the currently downloading job, which must be
    /// cancelled before its row goes away). Returns the number removed.
    pub async fn remove_by_state(
        &self,
        min_state: JobState,
        exclude: Option<JobId>,
    ) -> Result<u64> {
        let r = sqlx::query("DELETE FROM jobs WHERE state >= ?1 AND id != ?2")
            .bind(min_state.as_i64())
            .bind(exclude.unwrap_or(-1))
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }

    /// Reset every error-terminal job (`Error`, `DeezerError`) to `None`.
    /// `Done` rows are untouched. Returns the number reset.
    pub async fn retry_all(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 0,
                updated_at = ?1
            WHERE state IN (?2, ?3)
            "#,
        )
        .bind(now)
        .bind(JobState::DeezerError.as_i64())
        .bind(JobState::Error.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Normalize rows stranded at `Downloading`/`Post` by a crash back to
    /// `None`. Call once at worker startup, before the first claim.
    /// Returns the number of jobs reset.
    pub async fn recover_stranded(&self) -> Result<u64> {
        let now = unix_timestamp();
        let r = sqlx::query(
            r#"
            UPDATE jobs
            SET state = 0,
                updated_at = ?1
            WHERE state IN (?2, ?3)
            "#,
        )
        .bind(now)
        .bind(JobState::Downloading.as_i64())
        .bind(JobState::Post.as_i64())
        .execute(&self.pool)
        .await?;
        Ok(r.rows_affected())
    }

    /// Number of non-terminal jobs (what the controller shows as remaining).
    pub async fn queue_size(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM jobs WHERE state < ?1")
            .bind(JobState::Done.as_i64())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }
}

/// Current time as Unix seconds (for DB timestamps).
pub(crate) fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
/// Open an in-memory database for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<QueueDb> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let db = QueueDb { pool };
    db.migrate().await?;
    Ok(db)
}
