pub mod charts;
pub mod errors;
pub mod export;
pub mod insights;
pub mod profiles;
pub mod readings;

// Domain services
// This module contains business logic implementations.

pub use errors::ServiceError;
pub use profiles::{ProfileService, ProfileServiceTrait};
pub use readings::{ReadingService, ReadingServiceTrait};

use bp_monitor_data::repository::{ProfileRepository, ReadingRepository};
use bp_monitor_data::Database;

/// Create the reading service backed by the readings database
pub fn create_default_reading_service(db: &Database) -> ReadingService<ReadingRepository, ProfileRepository> {
    let pool = db.readings_pool().clone();
    ReadingService::new(ReadingRepository::new(pool.clone()), ProfileRepository::new(pool))
}

/// Create the profile service backed by the readings database
pub fn create_default_profile_service(db: &Database) -> ProfileService<ProfileRepository> {
    ProfileService::new(ProfileRepository::new(db.readings_pool().clone()))
}
