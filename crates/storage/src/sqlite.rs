//! SQLite backend for [`WorkflowStore`].
//!
//! Each call opens its own connection on the blocking pool, runs, and drops
//! the connection. Timestamps are stored as integer Unix nanoseconds.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, CodeRecord, DecisionUpdate, NewActivity, Role, SessionRecord,
    SubmissionCounts, SubmissionFilter, SubmissionRecord, SubmissionStatus, UserRecord,
};
use crate::traits::WorkflowStore;

/// How long a connection waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    username      TEXT PRIMARY KEY,
    role          TEXT NOT NULL,
    form_access   TEXT,
    password_hash TEXT
);

CREATE TABLE IF NOT EXISTS submissions (
    id           TEXT PRIMARY KEY,
    form         TEXT NOT NULL,
    user         TEXT NOT NULL,
    subject      TEXT NOT NULL,
    data         TEXT NOT NULL,
    status       TEXT NOT NULL,
    submitted_at INTEGER NOT NULL,
    decided_at   INTEGER,
    reviewed_by  TEXT,
    remarks      TEXT
);
CREATE INDEX IF NOT EXISTS submissions_status_age ON submissions (status, submitted_at);
CREATE INDEX IF NOT EXISTS submissions_user ON submissions (user);

CREATE TABLE IF NOT EXISTS activities (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp   INTEGER NOT NULL,
    user        TEXT NOT NULL,
    event       TEXT NOT NULL,
    description TEXT NOT NULL,
    type        TEXT NOT NULL
);
CREATE TRIGGER IF NOT EXISTS activities_no_update BEFORE UPDATE ON activities
BEGIN
    SELECT RAISE(ABORT, 'activity log is append-only');
END;
CREATE TRIGGER IF NOT EXISTS activities_no_delete BEFORE DELETE ON activities
BEGIN
    SELECT RAISE(ABORT, 'activity log is append-only');
END;

CREATE TABLE IF NOT EXISTS otp_store (
    email     TEXT PRIMARY KEY,
    otp       TEXT NOT NULL,
    timestamp INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    token_hash  TEXT PRIMARY KEY,
    identity    TEXT NOT NULL,
    role        TEXT NOT NULL,
    form_access TEXT,
    created_at  INTEGER NOT NULL,
    expires_at  INTEGER NOT NULL
);
"#;

const SUBMISSION_COLUMNS: &str =
    "id, form, user, subject, data, status, submitted_at, decided_at, reviewed_by, remarks";

impl From<rusqlite::Error> for StorageError {
    fn from(e: rusqlite::Error) -> Self {
        StorageError::Backend(e.to_string())
    }
}

/// File-backed SQLite store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    path: Arc<PathBuf>,
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path` and ensure the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path)?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %path.display(), "sqlite schema ensured");
        Ok(Self {
            path: Arc::new(path),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `f` against a fresh connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let mut conn = open_connection(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| StorageError::Backend(format!("task join error: {}", e)))?
    }
}

fn open_connection(path: &Path) -> Result<Connection, StorageError> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(conn)
}

// ── Value conversion ─────────────────────────────────────────────────────────

fn to_nanos(ts: OffsetDateTime) -> i64 {
    let nanos = ts.unix_timestamp_nanos();
    i64::try_from(nanos).unwrap_or(if nanos < 0 { i64::MIN } else { i64::MAX })
}

fn from_nanos(table: &'static str, nanos: i64) -> Result<OffsetDateTime, StorageError> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(nanos)).map_err(|e| {
        StorageError::Corrupt {
            table,
            message: format!("timestamp {}: {}", nanos, e),
        }
    })
}

fn parse_role(table: &'static str, raw: &str) -> Result<Role, StorageError> {
    raw.parse()
        .map_err(|message| StorageError::Corrupt { table, message })
}

fn parse_status(raw: &str) -> Result<SubmissionStatus, StorageError> {
    raw.parse().map_err(|message| StorageError::Corrupt {
        table: "submissions",
        message,
    })
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == ErrorCode::ConstraintViolation
    )
}

struct RawUser {
    username: String,
    role: String,
    form_access: Option<String>,
    password_hash: Option<String>,
}

impl RawUser {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            username: row.get(0)?,
            role: row.get(1)?,
            form_access: row.get(2)?,
            password_hash: row.get(3)?,
        })
    }

    fn decode(self) -> Result<UserRecord, StorageError> {
        Ok(UserRecord {
            role: parse_role("users", &self.role)?,
            username: self.username,
            form_access: self.form_access,
            password_hash: self.password_hash,
        })
    }
}

struct RawSubmission {
    id: String,
    form: String,
    user: String,
    subject: String,
    data: String,
    status: String,
    submitted_at: i64,
    decided_at: Option<i64>,
    reviewed_by: Option<String>,
    remarks: Option<String>,
}

impl RawSubmission {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            form: row.get(1)?,
            user: row.get(2)?,
            subject: row.get(3)?,
            data: row.get(4)?,
            status: row.get(5)?,
            submitted_at: row.get(6)?,
            decided_at: row.get(7)?,
            reviewed_by: row.get(8)?,
            remarks: row.get(9)?,
        })
    }

    fn decode(self) -> Result<SubmissionRecord, StorageError> {
        let payload = serde_json::from_str(&self.data).map_err(|e| StorageError::Corrupt {
            table: "submissions",
            message: format!("payload of {}: {}", self.id, e),
        })?;
        Ok(SubmissionRecord {
            status: parse_status(&self.status)?,
            submitted_at: from_nanos("submissions", self.submitted_at)?,
            decided_at: self
                .decided_at
                .map(|nanos| from_nanos("submissions", nanos))
                .transpose()?,
            id: self.id,
            form: self.form,
            user: self.user,
            subject: self.subject,
            payload,
            reviewed_by: self.reviewed_by,
            remarks: self.remarks,
        })
    }
}

fn select_submission(conn: &Connection, id: &str) -> Result<SubmissionRecord, StorageError> {
    let sql = format!("SELECT {} FROM submissions WHERE id = ?1", SUBMISSION_COLUMNS);
    let raw = conn
        .query_row(&sql, params![id], RawSubmission::from_row)
        .optional()?;
    match raw {
        Some(raw) => raw.decode(),
        None => Err(StorageError::SubmissionNotFound { id: id.to_string() }),
    }
}

fn insert_activity(conn: &Connection, entry: &NewActivity) -> Result<i64, StorageError> {
    conn.execute(
        "INSERT INTO activities (timestamp, user, event, description, type)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            to_nanos(entry.timestamp),
            entry.user,
            entry.event,
            entry.description,
            entry.category,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn count(conn: &Connection, sql: &str, since: Option<i64>) -> Result<u64, StorageError> {
    let n: i64 = match since {
        Some(since) => conn.query_row(sql, params![since], |row| row.get(0))?,
        None => conn.query_row(sql, [], |row| row.get(0))?,
    };
    Ok(n.max(0) as u64)
}

// ── WorkflowStore impl ───────────────────────────────────────────────────────

#[async_trait]
impl WorkflowStore for SqliteStore {
    async fn seed_user(&self, user: UserRecord) -> Result<bool, StorageError> {
        self.with_conn(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO users (username, role, form_access, password_hash)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.username,
                    user.role.as_str(),
                    user.form_access,
                    user.password_hash,
                ],
            )?;
            Ok(inserted == 1)
        })
        .await
    }

    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError> {
        let username = username.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT username, role, form_access, password_hash FROM users WHERE username = ?1",
                params![username],
                RawUser::from_row,
            )
            .optional()?
            .map(RawUser::decode)
            .transpose()
        })
        .await
    }

    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT username, role, form_access, password_hash FROM users
                 ORDER BY role DESC, username ASC",
            )?;
            let rows = stmt.query_map([], RawUser::from_row)?;
            let mut users = Vec::new();
            for raw in rows {
                users.push(raw?.decode()?);
            }
            Ok(users)
        })
        .await
    }

    async fn put_code(&self, record: CodeRecord) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO otp_store (email, otp, timestamp) VALUES (?1, ?2, ?3)",
                params![record.identity, record.code, to_nanos(record.issued_at)],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_code(&self, identity: &str) -> Result<Option<CodeRecord>, StorageError> {
        let identity = identity.to_string();
        self.with_conn(move |conn| {
            let raw: Option<(String, String, i64)> = conn
                .query_row(
                    "SELECT email, otp, timestamp FROM otp_store WHERE email = ?1",
                    params![identity],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )
                .optional()?;
            raw.map(|(identity, code, issued_at)| {
                Ok(CodeRecord {
                    identity,
                    code,
                    issued_at: from_nanos("otp_store", issued_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn delete_code(&self, identity: &str) -> Result<bool, StorageError> {
        let identity = identity.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute("DELETE FROM otp_store WHERE email = ?1", params![identity])?;
            Ok(removed > 0)
        })
        .await
    }

    async fn insert_session(&self, record: SessionRecord) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO sessions (token_hash, identity, role, form_access, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.token_hash,
                    record.identity,
                    record.role.as_str(),
                    record.form_access,
                    to_nanos(record.created_at),
                    to_nanos(record.expires_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, StorageError> {
        let token_hash = token_hash.to_string();
        self.with_conn(move |conn| {
            let raw: Option<(String, String, String, Option<String>, i64, i64)> = conn
                .query_row(
                    "SELECT token_hash, identity, role, form_access, created_at, expires_at
                     FROM sessions WHERE token_hash = ?1",
                    params![token_hash],
                    |row| {
                        Ok((
                            row.get(0)?,
                            row.get(1)?,
                            row.get(2)?,
                            row.get(3)?,
                            row.get(4)?,
                            row.get(5)?,
                        ))
                    },
                )
                .optional()?;
            raw.map(
                |(token_hash, identity, role, form_access, created_at, expires_at)| {
                    Ok(SessionRecord {
                        token_hash,
                        identity,
                        role: parse_role("sessions", &role)?,
                        form_access,
                        created_at: from_nanos("sessions", created_at)?,
                        expires_at: from_nanos("sessions", expires_at)?,
                    })
                },
            )
            .transpose()
        })
        .await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool, StorageError> {
        let token_hash = token_hash.to_string();
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM sessions WHERE token_hash = ?1",
                params![token_hash],
            )?;
            Ok(removed > 0)
        })
        .await
    }

    async fn purge_sessions(&self, now: OffsetDateTime) -> Result<usize, StorageError> {
        self.with_conn(move |conn| {
            let removed = conn.execute(
                "DELETE FROM sessions WHERE expires_at <= ?1",
                params![to_nanos(now)],
            )?;
            Ok(removed)
        })
        .await
    }

    async fn insert_submission(&self, record: SubmissionRecord) -> Result<(), StorageError> {
        self.with_conn(move |conn| {
            let data = serde_json::to_string(&record.payload)
                .map_err(|e| StorageError::Backend(format!("payload serialization: {}", e)))?;
            let sql = format!(
                "INSERT INTO submissions ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                SUBMISSION_COLUMNS
            );
            let result = conn.execute(
                &sql,
                params![
                    record.id,
                    record.form,
                    record.user,
                    record.subject,
                    data,
                    record.status.as_str(),
                    to_nanos(record.submitted_at),
                    record.decided_at.map(to_nanos),
                    record.reviewed_by,
                    record.remarks,
                ],
            );
            match result {
                Ok(_) => Ok(()),
                Err(e) if is_unique_violation(&e) => {
                    Err(StorageError::DuplicateSubmission { id: record.id })
                }
                Err(e) => Err(e.into()),
            }
        })
        .await
    }

    async fn get_submission(&self, id: &str) -> Result<SubmissionRecord, StorageError> {
        let id = id.to_string();
        self.with_conn(move |conn| select_submission(conn, &id)).await
    }

    async fn list_submissions(
        &self,
        filter: SubmissionFilter,
        limit: usize,
    ) -> Result<Vec<SubmissionRecord>, StorageError> {
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM submissions
                 WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR user = ?2)
                 ORDER BY submitted_at DESC, id DESC
                 LIMIT ?3",
                SUBMISSION_COLUMNS
            );
            // SQLite treats a negative LIMIT as "no limit".
            let limit: i64 = if limit == 0 { -1 } else { limit as i64 };
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(
                params![filter.status.map(|s| s.as_str()), filter.user, limit],
                RawSubmission::from_row,
            )?;
            let mut submissions = Vec::new();
            for raw in rows {
                submissions.push(raw?.decode()?);
            }
            Ok(submissions)
        })
        .await
    }

    async fn promote_overdue(&self, cutoff: OffsetDateTime) -> Result<usize, StorageError> {
        self.with_conn(move |conn| {
            let changed = conn.execute(
                "UPDATE submissions SET status = 'pending'
                 WHERE status = 'activity' AND submitted_at < ?1",
                params![to_nanos(cutoff)],
            )?;
            Ok(changed)
        })
        .await
    }

    async fn apply_decision(
        &self,
        update: DecisionUpdate,
        entry: NewActivity,
    ) -> Result<SubmissionRecord, StorageError> {
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let changed = tx.execute(
                "UPDATE submissions
                 SET status = ?1, decided_at = ?2, reviewed_by = ?3, remarks = ?4
                 WHERE id = ?5",
                params![
                    update.status.as_str(),
                    to_nanos(update.decided_at),
                    update.reviewed_by,
                    update.remarks,
                    update.submission_id,
                ],
            )?;
            if changed == 0 {
                // Dropping the transaction rolls it back.
                return Err(StorageError::SubmissionNotFound {
                    id: update.submission_id,
                });
            }
            insert_activity(&tx, &entry)?;
            let record = select_submission(&tx, &update.submission_id)?;
            tx.commit()?;
            Ok(record)
        })
        .await
    }

    async fn count_submissions(
        &self,
        approved_since: OffsetDateTime,
    ) -> Result<SubmissionCounts, StorageError> {
        self.with_conn(move |conn| {
            Ok(SubmissionCounts {
                total_submissions: count(conn, "SELECT COUNT(id) FROM submissions", None)?,
                pending_approvals: count(
                    conn,
                    "SELECT COUNT(id) FROM submissions WHERE status = 'pending'",
                    None,
                )?,
                active_alerts: count(
                    conn,
                    "SELECT COUNT(id) FROM submissions WHERE status = 'alert'",
                    None,
                )?,
                approved_today: count(
                    conn,
                    "SELECT COUNT(id) FROM submissions WHERE status = 'approved' AND decided_at > ?1",
                    Some(to_nanos(approved_since)),
                )?,
            })
        })
        .await
    }

    async fn append_activity(&self, entry: NewActivity) -> Result<i64, StorageError> {
        self.with_conn(move |conn| insert_activity(conn, &entry)).await
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, timestamp, user, event, description, type FROM activities
                 ORDER BY timestamp DESC, id DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;
            let mut entries = Vec::new();
            for row in rows {
                let (id, timestamp, user, event, description, category) = row?;
                entries.push(ActivityRecord {
                    id,
                    timestamp: from_nanos("activities", timestamp)?,
                    user,
                    event,
                    description,
                    category,
                });
            }
            Ok(entries)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use time::macros::datetime;

    use super::*;
    use crate::conformance::run_conformance_suite;

    #[tokio::test]
    async fn sqlite_conformance() {
        let dir = tempfile::tempdir().unwrap();
        let counter = AtomicUsize::new(0);
        let report = run_conformance_suite(|| {
            let path = dir
                .path()
                .join(format!("conformance-{}.db", counter.fetch_add(1, Ordering::SeqCst)));
            async move { SqliteStore::open(path).unwrap() }
        })
        .await;
        assert_eq!(report.failed, 0, "{report}");
        assert!(report.total > 0);
    }

    #[test]
    fn nanos_round_trip_is_exact() {
        for ts in [
            datetime!(2026-03-01 08:30:15 UTC),
            datetime!(2026-03-01 08:30:15.123456789 UTC),
            datetime!(2026-03-01 08:30:15.987654321 UTC),
            datetime!(1969-12-31 23:59:59.5 UTC),
        ] {
            assert_eq!(from_nanos("t", to_nanos(ts)).unwrap(), ts);
        }
    }

    #[tokio::test]
    async fn sub_second_timestamps_survive_storage() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("nanos.db")).unwrap();
        let issued_at = datetime!(2026-03-01 08:30:15.123456789 UTC);
        store
            .put_code(CodeRecord {
                identity: "a@x".to_string(),
                code: "123456".to_string(),
                issued_at,
            })
            .await
            .unwrap();
        let stored = store.get_code("a@x").await.unwrap().unwrap();
        assert_eq!(stored.issued_at, issued_at);
    }

    #[tokio::test]
    async fn activity_log_rejects_update_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("audit.db")).unwrap();
        store
            .append_activity(NewActivity {
                timestamp: datetime!(2026-03-01 08:00 UTC),
                user: "SYSTEM".to_string(),
                event: "Boot".to_string(),
                description: "started".to_string(),
                category: "AUTOMATION".to_string(),
            })
            .await
            .unwrap();

        let conn = Connection::open(store.path()).unwrap();
        let update = conn.execute("UPDATE activities SET event = 'tampered'", []);
        assert!(update.is_err());
        let delete = conn.execute("DELETE FROM activities", []);
        assert!(delete.is_err());

        let entries = store.recent_activity(10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "Boot");
    }

    #[tokio::test]
    async fn open_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("twice.db");
        SqliteStore::open(&path).unwrap();
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.list_users().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn corrupt_status_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("corrupt.db")).unwrap();
        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO submissions (id, form, user, subject, data, status, submitted_at)
             VALUES ('SBAD', 'f', 'u', 's', '{}', 'archived', 0)",
            [],
        )
        .unwrap();
        let err = store.get_submission("SBAD").await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { table: "submissions", .. }));
    }
}
