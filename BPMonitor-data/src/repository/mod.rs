// Repository module structure
pub mod errors;
mod login_attempts;
mod profiles;
mod readings;
mod sessions;
mod users;

// Re-export commonly used types
pub use errors::RepositoryError;
pub use login_attempts::{LoginAttemptRepository, LoginAttemptRepositoryTrait};
pub use profiles::{ProfileRepository, ProfileRepositoryTrait, MAX_PROFILES};
pub use readings::{ReadingRepository, ReadingRepositoryTrait};
pub use sessions::{SessionRepository, SessionRepositoryTrait};
pub use users::{UserRepository, UserRepositoryTrait};
