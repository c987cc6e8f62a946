use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

use crate::database::SqlitePool;
use crate::models::{format_timestamp, optional_timestamp_column, timestamp_column};
use crate::models::{NewUserRecord, UserChanges, UserRecord};
use super::errors::RepositoryError;

const USER_COLUMNS: &str = "id, username, email, password_hash, salt, mobile, \
    is_email_verified, is_mobile_verified, verification_code, verification_code_expiry, \
    last_login, created_at, updated_at";

/// Repository trait for user accounts
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// Insert a user and return its id
    async fn create_user(&self, user: NewUserRecord) -> Result<i64, RepositoryError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepositoryError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepositoryError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError>;

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError>;

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError>;

    /// Store a fresh verification code, replacing any previous one
    async fn set_verification_code(
        &self,
        id: i64,
        code: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Flag the email as verified and clear the pending code
    async fn mark_email_verified(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Flag the mobile number as verified and clear the pending code
    async fn mark_mobile_verified(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Apply a partial update; returns false when the user does not exist
    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<bool, RepositoryError>;

    async fn touch_last_login(&self, id: i64) -> Result<(), RepositoryError>;
}

/// SQLite-backed user repository
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn find_one(&self, column: &str, value: &dyn rusqlite::ToSql) -> Result<Option<UserRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("SELECT {} FROM users WHERE {} = ?1", USER_COLUMNS, column);
        let user = conn.query_row(&sql, [value], map_user).optional()?;
        Ok(user)
    }

    fn set_flag(&self, id: i64, flag_column: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!(
            "UPDATE users SET {} = 1, verification_code = NULL, verification_code_expiry = NULL, \
             updated_at = ?1 WHERE id = ?2",
            flag_column
        );
        let changed = conn.execute(&sql, params![format_timestamp(Utc::now()), id])?;
        Ok(changed > 0)
    }
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        salt: row.get(4)?,
        mobile: row.get(5)?,
        is_email_verified: row.get(6)?,
        is_mobile_verified: row.get(7)?,
        verification_code: row.get(8)?,
        verification_code_expiry: optional_timestamp_column(row, 9)?,
        last_login: optional_timestamp_column(row, 10)?,
        created_at: timestamp_column(row, 11)?,
        updated_at: timestamp_column(row, 12)?,
    })
}

#[async_trait]
impl UserRepositoryTrait for UserRepository {
    async fn create_user(&self, user: NewUserRecord) -> Result<i64, RepositoryError> {
        debug!("Creating user: username={}", user.username);

        let conn = self.pool.get()?;
        let now = format_timestamp(Utc::now());
        let result = conn.execute(
            "INSERT INTO users
             (username, email, password_hash, salt, mobile, is_email_verified,
              verification_code, verification_code_expiry, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)",
            params![
                user.username,
                user.email,
                user.password_hash,
                user.salt,
                user.mobile,
                user.is_email_verified,
                user.verification_code,
                user.verification_code_expiry.map(format_timestamp),
                now,
            ],
        );

        match result {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(e) => {
                let err = RepositoryError::from(e);
                if err.is_constraint_violation() {
                    let message = if err.to_string().contains("users.email") {
                        "Email already exists"
                    } else {
                        "Username already exists"
                    };
                    Err(RepositoryError::Conflict(message.to_string()))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<UserRecord>, RepositoryError> {
        self.find_one("id", &id)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<UserRecord>, RepositoryError> {
        self.find_one("username", &username)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, RepositoryError> {
        self.find_one("email", &email)
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?1)",
            [username],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn email_exists(&self, email: &str) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
            [email],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    async fn set_verification_code(
        &self,
        id: i64,
        code: &str,
        expiry: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE users SET verification_code = ?1, verification_code_expiry = ?2, updated_at = ?3
             WHERE id = ?4",
            params![code, format_timestamp(expiry), format_timestamp(Utc::now()), id],
        )?;
        Ok(changed > 0)
    }

    async fn mark_email_verified(&self, id: i64) -> Result<bool, RepositoryError> {
        self.set_flag(id, "is_email_verified")
    }

    async fn mark_mobile_verified(&self, id: i64) -> Result<bool, RepositoryError> {
        self.set_flag(id, "is_mobile_verified")
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> Result<bool, RepositoryError> {
        let mut assignments: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(email) = changes.email {
            assignments.push("email = ?");
            assignments.push("is_email_verified = 0");
            values.push(Value::Text(email));
        }
        if let Some(mobile) = changes.mobile {
            assignments.push("mobile = ?");
            assignments.push("is_mobile_verified = 0");
            values.push(Value::Text(mobile));
        }
        if let Some((password_hash, salt)) = changes.password {
            assignments.push("password_hash = ?");
            assignments.push("salt = ?");
            values.push(Value::Text(password_hash));
            values.push(Value::Text(salt));
        }

        assignments.push("updated_at = ?");
        values.push(Value::Text(format_timestamp(Utc::now())));
        values.push(Value::Integer(id));

        let sql = format!("UPDATE users SET {} WHERE id = ?", assignments.join(", "));
        debug!("Updating user {}: {}", id, sql);

        let conn = self.pool.get()?;
        match conn.execute(&sql, params_from_iter(values)) {
            Ok(changed) => Ok(changed > 0),
            Err(e) => {
                let err = RepositoryError::from(e);
                if err.is_constraint_violation() {
                    Err(RepositoryError::Conflict("Email already exists".to_string()))
                } else {
                    Err(err)
                }
            }
        }
    }

    async fn touch_last_login(&self, id: i64) -> Result<(), RepositoryError> {
        let conn = self.pool.get()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![format_timestamp(Utc::now()), id],
        )?;
        Ok(())
    }
}
