use bp_monitor_data::models::{NewProfileRecord, ProfileRecord, ReadingRecord, SessionRecord, UserRecord};
use tracing::warn;

use crate::entities::{BloodPressureReading, Gender, LoginHistoryEntry, Profile, ProfileRequest, User};
use crate::services::insights::categorize_blood_pressure;

/// Conversion functions between domain entities and data models.
/// These functions follow the pattern convert_to_[target_layer]_[model_name].

fn parse_gender(raw: &str) -> Gender {
    raw.parse().unwrap_or_else(|_| {
        warn!("Unrecognised gender {:?} in storage, treating as Male", raw);
        Gender::Male
    })
}

/// Convert from data model to domain entity for a reading
pub fn convert_to_domain_reading(record: ReadingRecord) -> BloodPressureReading {
    let gender = parse_gender(&record.gender);
    let category = record.category.parse().unwrap_or_else(|_| {
        categorize_blood_pressure(record.systolic, record.diastolic, gender, record.age)
    });

    BloodPressureReading {
        id: record.id,
        profile_id: record.profile_id,
        profile_name: record.profile_name,
        gender,
        age: record.age,
        date: record.date,
        time: record.time,
        systolic: record.systolic,
        diastolic: record.diastolic,
        heart_rate: record.heart_rate,
        category,
        created_at: record.created_at,
    }
}

/// Convert from data model to domain entity for a profile
pub fn convert_to_domain_profile(record: ProfileRecord) -> Profile {
    Profile {
        id: record.id,
        gender: parse_gender(&record.gender),
        name: record.name,
        age: record.age,
        created_at: record.created_at,
    }
}

/// Convert from domain request to data model for a profile
pub fn convert_to_data_profile(request: &ProfileRequest) -> NewProfileRecord {
    NewProfileRecord {
        name: request.name.trim().to_string(),
        gender: request.gender.as_str().to_string(),
        age: request.age,
    }
}

/// Convert from data model to domain entity for a user, dropping secrets
pub fn convert_to_domain_user(record: UserRecord) -> User {
    User {
        id: record.id,
        username: record.username,
        email: record.email,
        mobile: record.mobile,
        is_email_verified: record.is_email_verified,
        is_mobile_verified: record.is_mobile_verified,
        last_login: record.last_login,
        created_at: record.created_at,
    }
}

/// Convert from data model to domain entity for a login history entry
pub fn convert_to_domain_history(record: SessionRecord) -> LoginHistoryEntry {
    LoginHistoryEntry {
        ip_address: record.ip_address,
        user_agent: record.user_agent,
        created_at: record.created_at,
        expires_at: record.expires_at,
    }
}
