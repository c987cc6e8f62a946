use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::SqlitePool;
use crate::models::format_timestamp;
use super::errors::RepositoryError;

/// Repository trait for the login audit trail
#[async_trait]
pub trait LoginAttemptRepositoryTrait: Send + Sync {
    /// Log an attempt as failed and return its id
    async fn record_attempt(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        ip_address: &str,
    ) -> Result<i64, RepositoryError>;

    /// Flip a logged attempt to successful
    async fn mark_success(&self, attempt_id: i64) -> Result<(), RepositoryError>;

    /// Failed attempts from an address since the given instant
    async fn count_recent_failures(&self, ip_address: &str, since: DateTime<Utc>) -> Result<u32, RepositoryError>;
}

/// SQLite-backed login attempt repository
#[derive(Clone)]
pub struct LoginAttemptRepository {
    pool: SqlitePool,
}

impl LoginAttemptRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LoginAttemptRepositoryTrait for LoginAttemptRepository {
    async fn record_attempt(
        &self,
        username: Option<&str>,
        email: Option<&str>,
        ip_address: &str,
    ) -> Result<i64, RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO login_attempts (username, email, ip_address, attempt_time, success)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![username, email, ip_address, format_timestamp(Utc::now())],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn mark_success(&self, attempt_id: i64) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute("UPDATE login_attempts SET success = 1 WHERE id = ?1", [attempt_id])?;
        Ok(())
    }

    async fn count_recent_failures(&self, ip_address: &str, since: DateTime<Utc>) -> Result<u32, RepositoryError> {
        let conn = self.pool.get()?;
        let count: u32 = conn.query_row(
            "SELECT COUNT(*) FROM login_attempts
             WHERE ip_address = ?1 AND success = 0 AND attempt_time >= ?2",
            params![ip_address, format_timestamp(since)],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
