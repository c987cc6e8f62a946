use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use super::blood_pressure::Gender;

/// A family member whose readings are tracked
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct Profile {
    pub id: i64,
    pub name: String,
    pub gender: Gender,
    pub age: u32,
    pub created_at: DateTime<Utc>,
}

/// Request payload for creating or updating a profile
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ProfileRequest {
    #[validate(length(min = 1, max = 100, message = "Profile name is required"))]
    pub name: String,
    pub gender: Gender,
    #[validate(range(min = 1, max = 120, message = "Age must be between 1 and 120"))]
    pub age: u32,
}
