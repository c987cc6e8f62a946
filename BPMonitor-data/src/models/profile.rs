use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Row of the `profiles` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProfileRecord {
    pub id: i64,
    pub name: String,
    pub gender: String,
    pub age: u32,
    pub created_at: DateTime<Utc>,
}

/// Values for inserting or replacing a profile
#[derive(Debug, Clone)]
pub struct NewProfileRecord {
    pub name: String,
    pub gender: String,
    pub age: u32,
}
