use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, OptionalExtension, Row};
use tracing::debug;

use crate::database::SqlitePool;
use crate::models::{format_timestamp, timestamp_column};
use crate::models::{NewReadingRecord, ReadingRecord, DATE_FORMAT, TIME_FORMAT};
use super::errors::RepositoryError;

const READING_SELECT: &str = "SELECT r.id, r.profile_id, r.date, r.time, r.systolic, r.diastolic, \
    r.heart_rate, r.category, r.created_at, p.name, p.gender, p.age \
    FROM readings r JOIN profiles p ON r.profile_id = p.id";

/// Repository trait for blood pressure readings
#[async_trait]
pub trait ReadingRepositoryTrait: Send + Sync {
    /// Insert a reading and return its id
    async fn save_reading(&self, reading: NewReadingRecord) -> Result<i64, RepositoryError>;

    /// Readings of one profile, newest first
    async fn readings_by_profile(&self, profile_id: i64) -> Result<Vec<ReadingRecord>, RepositoryError>;

    /// Readings of every profile, newest first
    async fn all_readings(&self) -> Result<Vec<ReadingRecord>, RepositoryError>;

    /// Readings optionally narrowed to a profile and to dates on or after `since`
    async fn readings_in_range(
        &self,
        profile_id: Option<i64>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<ReadingRecord>, RepositoryError>;

    async fn get_reading(&self, id: i64) -> Result<Option<ReadingRecord>, RepositoryError>;

    async fn delete_reading(&self, id: i64) -> Result<bool, RepositoryError>;

    /// Readings selected like `readings_in_range`, ordered by profile name, date and time
    async fn export_rows(
        &self,
        profile_id: Option<i64>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<ReadingRecord>, RepositoryError>;
}

/// SQLite-backed reading repository
#[derive(Clone)]
pub struct ReadingRepository {
    pool: SqlitePool,
}

impl ReadingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn query(&self, sql: &str, values: Vec<Value>) -> Result<Vec<ReadingRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let mut stmt = conn.prepare(sql)?;
        let readings = stmt
            .query_map(params_from_iter(values), map_reading)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(readings)
    }

    /// Select readings with an optional profile and start-date filter
    fn filtered(
        &self,
        profile_id: Option<i64>,
        since: Option<NaiveDate>,
        order_by: &str,
    ) -> Result<Vec<ReadingRecord>, RepositoryError> {
        let mut sql = String::from(READING_SELECT);
        let mut conditions = Vec::new();
        let mut values = Vec::new();

        if let Some(profile_id) = profile_id {
            conditions.push("r.profile_id = ?");
            values.push(Value::Integer(profile_id));
        }
        if let Some(since) = since {
            conditions.push("r.date >= ?");
            values.push(Value::Text(since.format(DATE_FORMAT).to_string()));
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY ");
        sql.push_str(order_by);

        debug!("Reading query: {}", sql);
        self.query(&sql, values)
    }
}

fn map_reading(row: &Row<'_>) -> rusqlite::Result<ReadingRecord> {
    let date: String = row.get(2)?;
    let time: String = row.get(3)?;

    Ok(ReadingRecord {
        id: row.get(0)?,
        profile_id: row.get(1)?,
        date: NaiveDate::parse_from_str(&date, DATE_FORMAT)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?,
        time: parse_time(&time)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?,
        systolic: row.get(4)?,
        diastolic: row.get(5)?,
        heart_rate: row.get(6)?,
        category: row.get(7)?,
        created_at: timestamp_column(row, 8)?,
        profile_name: row.get(9)?,
        gender: row.get(10)?,
        age: row.get(11)?,
    })
}

// Older rows may carry seconds.
fn parse_time(value: &str) -> Result<NaiveTime, chrono::ParseError> {
    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
}

#[async_trait]
impl ReadingRepositoryTrait for ReadingRepository {
    async fn save_reading(&self, reading: NewReadingRecord) -> Result<i64, RepositoryError> {
        debug!(
            "Storing reading for profile {}: {}/{}",
            reading.profile_id, reading.systolic, reading.diastolic
        );

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO readings
             (profile_id, date, time, systolic, diastolic, heart_rate, category, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                reading.profile_id,
                reading.date.format(DATE_FORMAT).to_string(),
                reading.time.format(TIME_FORMAT).to_string(),
                reading.systolic,
                reading.diastolic,
                reading.heart_rate,
                reading.category,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn readings_by_profile(&self, profile_id: i64) -> Result<Vec<ReadingRecord>, RepositoryError> {
        self.readings_in_range(Some(profile_id), None).await
    }

    async fn all_readings(&self) -> Result<Vec<ReadingRecord>, RepositoryError> {
        self.readings_in_range(None, None).await
    }

    async fn readings_in_range(
        &self,
        profile_id: Option<i64>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<ReadingRecord>, RepositoryError> {
        self.filtered(profile_id, since, "r.date DESC, r.time DESC, r.id DESC")
    }

    async fn get_reading(&self, id: i64) -> Result<Option<ReadingRecord>, RepositoryError> {
        let conn = self.pool.get()?;
        let sql = format!("{} WHERE r.id = ?1", READING_SELECT);
        let reading = conn.query_row(&sql, [id], map_reading).optional()?;
        Ok(reading)
    }

    async fn delete_reading(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.pool.get()?;
        let deleted = conn.execute("DELETE FROM readings WHERE id = ?1", [id])?;
        Ok(deleted > 0)
    }

    async fn export_rows(
        &self,
        profile_id: Option<i64>,
        since: Option<NaiveDate>,
    ) -> Result<Vec<ReadingRecord>, RepositoryError> {
        self.filtered(profile_id, since, "p.name, r.date, r.time, r.id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Database;
    use crate::models::NewProfileRecord;
    use crate::repository::{ProfileRepository, ProfileRepositoryTrait};

    struct Fixture {
        profiles: ProfileRepository,
        readings: ReadingRepository,
    }

    fn fixture() -> Fixture {
        let db = Database::in_memory().unwrap();
        Fixture {
            profiles: ProfileRepository::new(db.readings_pool().clone()),
            readings: ReadingRepository::new(db.readings_pool().clone()),
        }
    }

    async fn add_profile(f: &Fixture, name: &str) -> i64 {
        f.profiles
            .create_profile(NewProfileRecord {
                name: name.to_string(),
                gender: "Male".to_string(),
                age: 55,
            })
            .await
            .unwrap()
            .id
    }

    fn reading(profile_id: i64, date: &str, time: &str, systolic: u32) -> NewReadingRecord {
        NewReadingRecord {
            profile_id,
            date: NaiveDate::parse_from_str(date, DATE_FORMAT).unwrap(),
            time: NaiveTime::parse_from_str(time, TIME_FORMAT).unwrap(),
            systolic,
            diastolic: 80,
            heart_rate: Some(70),
            category: "Normal".to_string(),
        }
    }

    #[tokio::test]
    async fn test_readings_are_newest_first_with_profile_fields() {
        let f = fixture();
        let pid = add_profile(&f, "Omar").await;

        f.readings.save_reading(reading(pid, "2024-03-01", "08:00", 118)).await.unwrap();
        f.readings.save_reading(reading(pid, "2024-03-02", "07:30", 121)).await.unwrap();
        f.readings.save_reading(reading(pid, "2024-03-02", "21:15", 125)).await.unwrap();

        let readings = f.readings.readings_by_profile(pid).await.unwrap();
        let systolic: Vec<u32> = readings.iter().map(|r| r.systolic).collect();
        assert_eq!(systolic, vec![125, 121, 118]);
        assert_eq!(readings[0].profile_name, "Omar");
        assert_eq!(readings[0].age, 55);
        assert_eq!(readings[0].time.format(TIME_FORMAT).to_string(), "21:15");
    }

    #[tokio::test]
    async fn test_range_filter_by_profile_and_date() {
        let f = fixture();
        let a = add_profile(&f, "A").await;
        let b = add_profile(&f, "B").await;

        f.readings.save_reading(reading(a, "2024-01-01", "08:00", 120)).await.unwrap();
        f.readings.save_reading(reading(a, "2024-02-01", "08:00", 130)).await.unwrap();
        f.readings.save_reading(reading(b, "2024-02-01", "09:00", 140)).await.unwrap();

        let since = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(f.readings.readings_in_range(Some(a), since).await.unwrap().len(), 1);
        assert_eq!(f.readings.readings_in_range(None, since).await.unwrap().len(), 2);
        assert_eq!(f.readings.all_readings().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_deleting_profile_removes_its_readings() {
        let f = fixture();
        let a = add_profile(&f, "A").await;
        let b = add_profile(&f, "B").await;
        f.readings.save_reading(reading(a, "2024-01-01", "08:00", 120)).await.unwrap();
        f.readings.save_reading(reading(b, "2024-01-01", "08:00", 120)).await.unwrap();

        f.profiles.delete_profile(a).await.unwrap();

        let remaining = f.readings.all_readings().await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].profile_id, b);
    }

    #[tokio::test]
    async fn test_reading_for_missing_profile_is_rejected() {
        let f = fixture();
        let err = f.readings.save_reading(reading(42, "2024-01-01", "08:00", 120)).await.unwrap_err();
        assert!(err.is_constraint_violation());
    }

    #[tokio::test]
    async fn test_export_order_and_delete() {
        let f = fixture();
        let zed = add_profile(&f, "Zed").await;
        let amy = add_profile(&f, "Amy").await;
        f.readings.save_reading(reading(zed, "2024-01-01", "08:00", 120)).await.unwrap();
        let later = f.readings.save_reading(reading(amy, "2024-01-02", "08:00", 121)).await.unwrap();
        f.readings.save_reading(reading(amy, "2024-01-01", "08:00", 122)).await.unwrap();

        let names: Vec<(String, u32)> = f
            .readings
            .export_rows(None, None)
            .await
            .unwrap()
            .into_iter()
            .map(|r| (r.profile_name, r.systolic))
            .collect();
        assert_eq!(
            names,
            vec![("Amy".to_string(), 122), ("Amy".to_string(), 121), ("Zed".to_string(), 120)]
        );

        assert!(f.readings.delete_reading(later).await.unwrap());
        assert!(f.readings.get_reading(later).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_rows_honours_filters() {
        let f = fixture();
        let zed = add_profile(&f, "Zed").await;
        let amy = add_profile(&f, "Amy").await;
        f.readings.save_reading(reading(zed, "2024-02-01", "08:00", 120)).await.unwrap();
        f.readings.save_reading(reading(amy, "2024-01-01", "08:00", 121)).await.unwrap();
        f.readings.save_reading(reading(amy, "2024-02-03", "08:00", 122)).await.unwrap();
        f.readings.save_reading(reading(amy, "2024-02-02", "08:00", 123)).await.unwrap();

        let amy_rows = f.readings.export_rows(Some(amy), None).await.unwrap();
        assert!(amy_rows.iter().all(|r| r.profile_id == amy));
        assert_eq!(amy_rows.len(), 3);

        let since = NaiveDate::from_ymd_opt(2024, 1, 15);
        let recent: Vec<u32> = f
            .readings
            .export_rows(Some(amy), since)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.systolic)
            .collect();
        assert_eq!(recent, vec![123, 122]);

        assert_eq!(f.readings.export_rows(None, since).await.unwrap().len(), 3);
    }
}
