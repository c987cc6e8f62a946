use async_trait::async_trait;
use tracing::info;
use validator::Validate;

use bp_monitor_data::repository::{ProfileRepositoryTrait, MAX_PROFILES};

use crate::entities::conversions;
use crate::entities::profile::{Profile, ProfileRequest};
use crate::services::errors::{map_repo_error, validation_message, ServiceError};

/// Trait for family member profile operations
#[async_trait]
pub trait ProfileServiceTrait: Send + Sync {
    async fn create_profile(&self, request: ProfileRequest) -> Result<Profile, ServiceError>;

    /// All profiles ordered by name
    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError>;

    async fn get_profile(&self, id: i64) -> Result<Profile, ServiceError>;

    async fn update_profile(&self, id: i64, request: ProfileRequest) -> Result<Profile, ServiceError>;

    /// Delete a profile and every reading it owns
    async fn delete_profile(&self, id: i64) -> Result<(), ServiceError>;

    /// Whether another profile may still be created
    async fn can_add_profile(&self) -> Result<bool, ServiceError>;
}

pub struct ProfileService<P: ProfileRepositoryTrait> {
    repository: P,
}

impl<P: ProfileRepositoryTrait> ProfileService<P> {
    pub fn new(repository: P) -> Self {
        Self { repository }
    }

    fn validate(request: &ProfileRequest) -> Result<(), ServiceError> {
        if request.name.trim().is_empty() {
            return Err(ServiceError::Validation("Profile name is required".to_string()));
        }
        request
            .validate()
            .map_err(|errors| ServiceError::Validation(validation_message(&errors)))
    }

    fn not_found(id: i64) -> ServiceError {
        ServiceError::NotFound(format!("Profile {} not found", id))
    }
}

#[async_trait]
impl<P: ProfileRepositoryTrait> ProfileServiceTrait for ProfileService<P> {
    async fn create_profile(&self, request: ProfileRequest) -> Result<Profile, ServiceError> {
        Self::validate(&request)?;
        let record = self
            .repository
            .create_profile(conversions::convert_to_data_profile(&request))
            .await
            .map_err(map_repo_error)?;
        Ok(conversions::convert_to_domain_profile(record))
    }

    async fn list_profiles(&self) -> Result<Vec<Profile>, ServiceError> {
        let records = self.repository.list_profiles().await.map_err(map_repo_error)?;
        Ok(records.into_iter().map(conversions::convert_to_domain_profile).collect())
    }

    async fn get_profile(&self, id: i64) -> Result<Profile, ServiceError> {
        self.repository
            .get_profile(id)
            .await
            .map_err(map_repo_error)?
            .map(conversions::convert_to_domain_profile)
            .ok_or_else(|| Self::not_found(id))
    }

    async fn update_profile(&self, id: i64, request: ProfileRequest) -> Result<Profile, ServiceError> {
        Self::validate(&request)?;
        let updated = self
            .repository
            .update_profile(id, conversions::convert_to_data_profile(&request))
            .await
            .map_err(map_repo_error)?;
        if !updated {
            return Err(Self::not_found(id));
        }
        info!("Updated profile {}", id);
        self.get_profile(id).await
    }

    async fn delete_profile(&self, id: i64) -> Result<(), ServiceError> {
        let deleted = self.repository.delete_profile(id).await.map_err(map_repo_error)?;
        if !deleted {
            return Err(Self::not_found(id));
        }
        info!("Deleted profile {}", id);
        Ok(())
    }

    async fn can_add_profile(&self) -> Result<bool, ServiceError> {
        let count = self.repository.count_profiles().await.map_err(map_repo_error)?;
        Ok(count < MAX_PROFILES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::blood_pressure::Gender;
    use bp_monitor_data::repository::ProfileRepository;
    use bp_monitor_data::Database;

    fn service() -> ProfileService<ProfileRepository> {
        let db = Database::in_memory().unwrap();
        ProfileService::new(ProfileRepository::new(db.readings_pool().clone()))
    }

    fn request(name: &str, age: u32) -> ProfileRequest {
        ProfileRequest {
            name: name.to_string(),
            gender: Gender::Female,
            age,
        }
    }

    #[tokio::test]
    async fn test_blank_name_and_bad_age_are_rejected() {
        let service = service();
        let err = service.create_profile(request("   ", 30)).await.unwrap_err();
        assert_eq!(err.to_string(), "Profile name is required");

        let err = service.create_profile(request("Ada", 0)).await.unwrap_err();
        assert_eq!(err.to_string(), "Age must be between 1 and 120");
    }

    #[tokio::test]
    async fn test_name_is_trimmed_and_limit_enforced() {
        let service = service();
        let first = service.create_profile(request("  Ada ", 30)).await.unwrap();
        assert_eq!(first.name, "Ada");

        for i in 1..MAX_PROFILES {
            service.create_profile(request(&format!("P{}", i), 30)).await.unwrap();
        }
        assert!(!service.can_add_profile().await.unwrap());

        let err = service.create_profile(request("Extra", 30)).await.unwrap_err();
        assert!(matches!(err, ServiceError::LimitReached(_)));
        assert_eq!(err.to_string(), "Maximum number of profiles (5) reached");
    }

    #[tokio::test]
    async fn test_update_and_delete_missing_profile() {
        let service = service();
        let created = service.create_profile(request("Ada", 30)).await.unwrap();

        let updated = service.update_profile(created.id, request("Ada L", 31)).await.unwrap();
        assert_eq!(updated.age, 31);

        assert!(matches!(
            service.update_profile(77, request("X", 3)).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        service.delete_profile(created.id).await.unwrap();
        assert!(matches!(
            service.get_profile(created.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
