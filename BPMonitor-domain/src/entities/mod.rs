// Domain entities and value objects
pub mod blood_pressure;
pub mod conversions;
pub mod profile;
pub mod user;

// Re-export common types for easier imports
pub use blood_pressure::{
    AnalyticsQuery, BloodPressureCategory, BloodPressureReading, CategoryCount, CreateReadingRequest,
    Gender, ReadingStatistics, TimeRange,
};
pub use profile::{Profile, ProfileRequest};
pub use user::{LoginHistoryEntry, User};
