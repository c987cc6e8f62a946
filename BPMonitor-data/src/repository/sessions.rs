use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use tracing::debug;

use crate::database::SqlitePool;
use crate::models::{format_timestamp, optional_timestamp_column, timestamp_column};
use crate::models::{NewSessionRecord, SessionRecord, UserRecord};
use super::errors::RepositoryError;

/// Repository trait for login sessions
#[async_trait]
pub trait SessionRepositoryTrait: Send + Sync {
    async fn create_session(&self, session: NewSessionRecord) -> Result<SessionRecord, RepositoryError>;

    /// Look up a session that has not expired at `now`, together with its user
    async fn find_valid_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(SessionRecord, UserRecord)>, RepositoryError>;

    /// Delete a session; returns whether one existed
    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError>;

    /// Sessions of a user, newest first
    async fn sessions_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<SessionRecord>, RepositoryError>;

    /// Remove sessions that expired before `now`
    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError>;
}

/// SQLite-backed session repository
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_session(row: &Row<'_>) -> rusqlite::Result<SessionRecord> {
    Ok(SessionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        session_token: row.get(2)?,
        ip_address: row.get(3)?,
        user_agent: row.get(4)?,
        created_at: timestamp_column(row, 5)?,
        expires_at: timestamp_column(row, 6)?,
    })
}

#[async_trait]
impl SessionRepositoryTrait for SessionRepository {
    async fn create_session(&self, session: NewSessionRecord) -> Result<SessionRecord, RepositoryError> {
        debug!("Creating session for user {}", session.user_id);

        let conn = self.pool.get()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO sessions (user_id, session_token, ip_address, user_agent, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.user_id,
                session.session_token,
                session.ip_address,
                session.user_agent,
                format_timestamp(created_at),
                format_timestamp(session.expires_at),
            ],
        )?;

        let id = conn.last_insert_rowid();
        let stored = conn.query_row(
            "SELECT id, user_id, session_token, ip_address, user_agent, created_at, expires_at
             FROM sessions WHERE id = ?1",
            [id],
            map_session,
        )?;
        Ok(stored)
    }

    async fn find_valid_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<(SessionRecord, UserRecord)>, RepositoryError> {
        let conn = self.pool.get()?;
        let found = conn
            .query_row(
                "SELECT s.id, s.user_id, s.session_token, s.ip_address, s.user_agent, s.created_at, s.expires_at,
                        u.id, u.username, u.email, u.password_hash, u.salt, u.mobile,
                        u.is_email_verified, u.is_mobile_verified, u.verification_code,
                        u.verification_code_expiry, u.last_login, u.created_at, u.updated_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.session_token = ?1 AND s.expires_at > ?2",
                params![token, format_timestamp(now)],
                |row| {
                    let session = map_session(row)?;
                    let user = UserRecord {
                        id: row.get(7)?,
                        username: row.get(8)?,
                        email: row.get(9)?,
                        password_hash: row.get(10)?,
                        salt: row.get(11)?,
                        mobile: row.get(12)?,
                        is_email_verified: row.get(13)?,
                        is_mobile_verified: row.get(14)?,
                        verification_code: row.get(15)?,
                        verification_code_expiry: optional_timestamp_column(row, 16)?,
                        last_login: optional_timestamp_column(row, 17)?,
                        created_at: timestamp_column(row, 18)?,
                        updated_at: timestamp_column(row, 19)?,
                    };
                    Ok((session, user))
                },
            )
            .optional()?;
        Ok(found)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE session_token = ?1", [token])?;
        Ok(deleted > 0)
    }

    async fn sessions_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<SessionRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, user_id, session_token, ip_address, user_agent, created_at, expires_at
             FROM sessions WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT ?2",
        )?;

        let sessions = stmt
            .query_map(params![user_id, limit], map_session)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute(
            "DELETE FROM sessions WHERE expires_at <= ?1",
            [format_timestamp(now)],
        )?;
        debug!("Removed {} expired sessions", deleted);
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::NewUserRecord;
    use crate::repository::{UserRepository, UserRepositoryTrait};
    use chrono::Duration;

    async fn setup() -> (SessionRepository, i64) {
        let db = Database::in_memory().unwrap();
        let users = UserRepository::new(db.auth_pool().clone());
        let user_id = users
            .create_user(NewUserRecord {
                username: "carol".to_string(),
                email: "carol@example.com".to_string(),
                password_hash: "hash".to_string(),
                salt: "salt".to_string(),
                mobile: None,
                is_email_verified: true,
                verification_code: None,
                verification_code_expiry: None,
            })
            .await
            .unwrap();
        (SessionRepository::new(db.auth_pool().clone()), user_id)
    }

    fn session(user_id: i64, token: &str, expires_at: DateTime<Utc>) -> NewSessionRecord {
        NewSessionRecord {
            user_id,
            session_token: token.to_string(),
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_valid_session_joins_user() {
        let (repo, user_id) = setup().await;
        let stored = repo
            .create_session(session(user_id, "abc", Utc::now() + Duration::days(30)))
            .await
            .unwrap();
        assert_eq!(stored.user_agent.as_deref(), Some("test-agent"));

        let (found, user) = repo.find_valid_session("abc", Utc::now()).await.unwrap().unwrap();
        assert_eq!(found.id, stored.id);
        assert_eq!(user.username, "carol");
    }

    #[tokio::test]
    async fn test_expired_session_is_not_valid() {
        let (repo, user_id) = setup().await;
        repo.create_session(session(user_id, "old", Utc::now() - Duration::minutes(1)))
            .await
            .unwrap();

        assert!(repo.find_valid_session("old", Utc::now()).await.unwrap().is_none());
        assert_eq!(repo.delete_expired(Utc::now()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_history() {
        let (repo, user_id) = setup().await;
        for token in ["t1", "t2", "t3"] {
            repo.create_session(session(user_id, token, Utc::now() + Duration::days(1)))
                .await
                .unwrap();
        }

        let history = repo.sessions_for_user(user_id, 2).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].session_token, "t3");

        assert!(repo.delete_session("t3").await.unwrap());
        assert!(!repo.delete_session("t3").await.unwrap());
        assert!(repo.find_valid_session("t3", Utc::now()).await.unwrap().is_none());
    }
}
