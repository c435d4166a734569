//! SQLite implementation of `RatingStore`.
//!
//! Ratings survive service restarts; the cooldown check in particular must
//! not reset when the process does.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::{NewRating, RatingRecord, RatingStore, StoreError};
use crate::ids::UserId;

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed rating store.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime.
pub struct SqliteRatingStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRatingStore {
    /// Open (or create) the database at the given path and run any pending
    /// migrations.
    ///
    /// # Durability
    ///
    /// The database is configured with:
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` for maximum durability
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();

        if path_str != ":memory:" && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        StoreError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| StoreError::storage("open database", e.to_string()))?;

        // WAL can silently fall back to DELETE mode on filesystems without
        // shared-memory support; verify it actually took effect. In-memory
        // databases report "memory", which is fine.
        let is_in_memory = path_str == ":memory:";
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));

        if !journal_mode_ok {
            return Err(StoreError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| StoreError::storage("configure pragmas", e.to_string()))?;

        #[cfg(unix)]
        if !is_in_memory && !path_str.is_empty() {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o600);
            if let Err(e) = std::fs::set_permissions(path_ref, permissions) {
                warn!(
                    "Failed to set restrictive permissions on database file: {}",
                    e
                );
            }
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| StoreError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory store (for testing).
    pub fn new_in_memory() -> Result<Self, StoreError> {
        Self::new(":memory:")
    }

    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), StoreError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(StoreError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS ratings (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    subject TEXT NOT NULL,
                    rater TEXT NOT NULL,
                    shot INTEGER NOT NULL,
                    assist INTEGER NOT NULL,
                    defense INTEGER NOT NULL,
                    goalkeeping INTEGER NOT NULL,
                    comment TEXT NOT NULL,
                    timestamp INTEGER NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_ratings_subject
                    ON ratings(subject, id);
                CREATE INDEX IF NOT EXISTS idx_ratings_pair
                    ON ratings(subject, rater, timestamp DESC);
                "#,
            )
            .map_err(|e| StoreError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| StoreError::storage("update schema version", e.to_string()))?;

        Ok(())
    }
}

/// Convert a stored score to u8, rejecting out-of-range values as corruption.
fn score_from_i64(value: i64, operation: &str) -> Result<u8, StoreError> {
    u8::try_from(value)
        .map_err(|_| StoreError::storage(operation.to_string(), format!("invalid score {value}")))
}

#[async_trait]
impl RatingStore for SqliteRatingStore {
    async fn insert(&self, rating: NewRating) -> Result<RatingRecord, StoreError> {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            conn.execute(
                "INSERT INTO ratings (subject, rater, shot, assist, defense, goalkeeping, comment, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    rating.subject.0,
                    rating.rater.0,
                    i64::from(rating.shot),
                    i64::from(rating.assist),
                    i64::from(rating.defense),
                    i64::from(rating.goalkeeping),
                    rating.comment,
                    rating.timestamp,
                ],
            )
            .map_err(|e| StoreError::storage("insert rating", e.to_string()))?;

            let id = conn.last_insert_rowid();
            Ok(RatingRecord {
                id,
                subject: rating.subject,
                rater: rating.rater,
                shot: rating.shot,
                assist: rating.assist,
                defense: rating.defense,
                goalkeeping: rating.goalkeeping,
                comment: rating.comment,
                timestamp: rating.timestamp,
            })
        })
        .await
        .map_err(|e| StoreError::storage("insert rating", e.to_string()))?
    }

    async fn all_for_subject(&self, subject: &UserId) -> Result<Vec<RatingRecord>, StoreError> {
        let conn = self.conn.clone();
        let subject = subject.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            let mut stmt = conn
                .prepare(
                    "SELECT id, subject, rater, shot, assist, defense, goalkeeping, comment, timestamp
                     FROM ratings
                     WHERE subject = ?1
                     ORDER BY id ASC",
                )
                .map_err(|e| StoreError::storage("all_for_subject", e.to_string()))?;

            let rows = stmt
                .query_map(params![subject.0], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, i64>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, String>(7)?,
                        row.get::<_, i64>(8)?,
                    ))
                })
                .map_err(|e| StoreError::storage("all_for_subject", e.to_string()))?;

            let mut records = Vec::new();
            for row in rows {
                let (id, subject, rater, shot, assist, defense, goalkeeping, comment, timestamp) =
                    row.map_err(|e| StoreError::storage("all_for_subject row", e.to_string()))?;
                records.push(RatingRecord {
                    id,
                    subject: UserId(subject),
                    rater: UserId(rater),
                    shot: score_from_i64(shot, "all_for_subject")?,
                    assist: score_from_i64(assist, "all_for_subject")?,
                    defense: score_from_i64(defense, "all_for_subject")?,
                    goalkeeping: score_from_i64(goalkeeping, "all_for_subject")?,
                    comment,
                    timestamp,
                });
            }

            Ok(records)
        })
        .await
        .map_err(|e| StoreError::storage("all_for_subject", e.to_string()))?
    }

    async fn latest_timestamp(
        &self,
        subject: &UserId,
        rater: &UserId,
    ) -> Result<Option<i64>, StoreError> {
        let conn = self.conn.clone();
        let subject = subject.clone();
        let rater = rater.clone();

        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().unwrap();

            conn.query_row(
                "SELECT MAX(timestamp) FROM ratings WHERE subject = ?1 AND rater = ?2",
                params![subject.0, rater.0],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(|e| StoreError::storage("latest_timestamp", e.to_string()))
        })
        .await
        .map_err(|e| StoreError::storage("latest_timestamp", e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rating(subject: &str, rater: &str, timestamp: i64) -> NewRating {
        NewRating {
            subject: UserId::from(subject),
            rater: UserId::from(rater),
            shot: 8,
            assist: 7,
            defense: 6,
            goalkeeping: 5,
            comment: "good instincts".to_string(),
            timestamp,
        }
    }

    #[tokio::test]
    async fn test_insert_and_fetch_round_trip() {
        let store = SqliteRatingStore::new_in_memory().unwrap();
        let record = store.insert(rating("alice", "bob", 123)).await.unwrap();
        assert_eq!(record.id, 1);

        let fetched = store
            .all_for_subject(&UserId::from("alice"))
            .await
            .unwrap();
        assert_eq!(fetched, vec![record]);
    }

    #[tokio::test]
    async fn test_latest_timestamp_scoped_to_pair() {
        let store = SqliteRatingStore::new_in_memory().unwrap();
        store.insert(rating("alice", "bob", 300)).await.unwrap();
        store.insert(rating("carol", "bob", 900)).await.unwrap();
        store.insert(rating("alice", "dan", 600)).await.unwrap();
        assert_eq!(
            store
                .latest_timestamp(&UserId::from("alice"), &UserId::from("bob"))
                .await
                .unwrap(),
            Some(300)
        );
    }

    #[tokio::test]
    async fn test_latest_timestamp_none_for_new_pair() {
        let store = SqliteRatingStore::new_in_memory().unwrap();
        assert_eq!(
            store
                .latest_timestamp(&UserId::from("s"), &UserId::from("nobody"))
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_reopening_preserves_ratings() {
        let dir = std::env::temp_dir().join(format!("squadboard-test-{}", std::process::id()));
        let path = dir.join("ratings.db");
        {
            let store = SqliteRatingStore::new(&path).unwrap();
            store.insert(rating("alice", "bob", 42)).await.unwrap();
        }
        let store = SqliteRatingStore::new(&path).unwrap();
        let fetched = store
            .all_for_subject(&UserId::from("alice"))
            .await
            .unwrap();
        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0].timestamp, 42);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn test_comment_preserved_verbatim() {
        let store = SqliteRatingStore::new_in_memory().unwrap();
        let mut new = rating("alice", "bob", 1);
        new.comment = "line one\nwith \"quotes\" and unicode ⚽".to_string();
        let record = store.insert(new.clone()).await.unwrap();
        assert_eq!(record.comment, new.comment);
        let fetched = store
            .all_for_subject(&UserId::from("alice"))
            .await
            .unwrap();
        assert_eq!(fetched[0].comment, new.comment);
    }
}
