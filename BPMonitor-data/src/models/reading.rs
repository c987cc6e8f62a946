use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Storage format of the `date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Storage format of the `time` column
pub const TIME_FORMAT: &str = "%H:%M";

/// Reading joined with the profile it belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReadingRecord {
    pub id: i64,
    pub profile_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub systolic: u32,
    pub diastolic: u32,
    pub heart_rate: Option<u32>,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub profile_name: String,
    pub gender: String,
    pub age: u32,
}

/// Values for inserting a reading
#[derive(Debug, Clone)]
pub struct NewReadingRecord {
    pub profile_id: i64,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub systolic: u32,
    pub diastolic: u32,
    pub heart_rate: Option<u32>,
    pub category: String,
}
