use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};
use tracing::{debug, info, warn};

use crate::database::SqlitePool;
use crate::models::{format_timestamp, timestamp_column, NewProfileRecord, ProfileRecord};
use super::errors::RepositoryError;

/// Maximum number of profiles one installation may hold
pub const MAX_PROFILES: usize = 5;

/// Repository trait for family member profiles
#[async_trait]
pub trait ProfileRepositoryTrait: Send + Sync {
    /// Insert a profile, failing with `LimitReached` once `MAX_PROFILES` exist
    async fn create_profile(&self, profile: NewProfileRecord) -> Result<ProfileRecord, RepositoryError>;

    /// All profiles ordered by name
    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, RepositoryError>;

    async fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, RepositoryError>;

    /// Replace name, gender and age; returns false when the profile does not exist
    async fn update_profile(&self, id: i64, profile: NewProfileRecord) -> Result<bool, RepositoryError>;

    /// Delete a profile together with its readings
    async fn delete_profile(&self, id: i64) -> Result<bool, RepositoryError>;

    async fn count_profiles(&self) -> Result<usize, RepositoryError>;
}

/// SQLite-backed profile repository
#[derive(Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_profile(row: &Row<'_>) -> rusqlite::Result<ProfileRecord> {
    Ok(ProfileRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        gender: row.get(2)?,
        age: row.get(3)?,
        created_at: timestamp_column(row, 4)?,
    })
}

#[async_trait]
impl ProfileRepositoryTrait for ProfileRepository {
    async fn create_profile(&self, profile: NewProfileRecord) -> Result<ProfileRecord, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let count: i64 = tx.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        if count as usize >= MAX_PROFILES {
            warn!("Refusing to create profile {}: limit of {} reached", profile.name, MAX_PROFILES);
            return Err(RepositoryError::LimitReached(format!(
                "Maximum number of profiles ({}) reached",
                MAX_PROFILES
            )));
        }

        tx.execute(
            "INSERT INTO profiles (name, gender, age, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![profile.name, profile.gender, profile.age, format_timestamp(Utc::now())],
        )?;
        let id = tx.last_insert_rowid();
        let stored = tx.query_row(
            "SELECT id, name, gender, age, created_at FROM profiles WHERE id = ?1",
            [id],
            map_profile,
        )?;
        tx.commit()?;

        info!("Created profile {} ({})", stored.id, stored.name);
        Ok(stored)
    }

    async fn list_profiles(&self) -> Result<Vec<ProfileRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, gender, age, created_at FROM profiles ORDER BY name, id",
        )?;
        let profiles = stmt
            .query_map([], map_profile)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(profiles)
    }

    async fn get_profile(&self, id: i64) -> Result<Option<ProfileRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let profile = conn
            .query_row(
                "SELECT id, name, gender, age, created_at FROM profiles WHERE id = ?1",
                [id],
                map_profile,
            )
            .optional()?;
        Ok(profile)
    }

    async fn update_profile(&self, id: i64, profile: NewProfileRecord) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let changed = conn.execute(
            "UPDATE profiles SET name = ?1, gender = ?2, age = ?3 WHERE id = ?4",
            params![profile.name, profile.gender, profile.age, id],
        )?;
        Ok(changed > 0)
    }

    async fn delete_profile(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        // Files created before foreign keys were enforced do not cascade on their own.
        let readings = tx.execute("DELETE FROM readings WHERE profile_id = ?1", [id])?;
        let deleted = tx.execute("DELETE FROM profiles WHERE id = ?1", [id])?;
        tx.commit()?;

        debug!("Deleted profile {} and {} readings", id, readings);
        Ok(deleted > 0)
    }

    async fn count_profiles(&self) -> Result<usize, RepositoryError> {
        let conn = self.pool.get()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM profiles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
