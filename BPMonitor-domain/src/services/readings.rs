use async_trait::async_trait;
use chrono::{Local, NaiveDate, NaiveTime, Timelike};
use tracing::{info, warn};
use validator::Validate;

use bp_monitor_data::models::NewReadingRecord;
use bp_monitor_data::repository::{ProfileRepositoryTrait, ReadingRepositoryTrait};

use crate::entities::blood_pressure::{
    AnalyticsQuery, BloodPressureReading, CreateReadingRequest, Gender, ReadingStatistics,
};
use crate::entities::conversions;
use crate::services::charts::{chart_bundle, ChartBundle};
use crate::services::errors::{map_repo_error, validation_message, ServiceError};
use crate::services::insights::{calculate_statistics, categorize_blood_pressure};

/// Trait for blood pressure reading operations
#[async_trait]
pub trait ReadingServiceTrait: Send + Sync {
    /// Validate a create reading request
    fn validate_create_request(&self, request: &CreateReadingRequest) -> Result<(), ServiceError>;

    /// Categorize and store a reading for a profile
    async fn record_reading(
        &self,
        profile_id: i64,
        request: CreateReadingRequest,
    ) -> Result<BloodPressureReading, ServiceError>;

    /// Readings of one profile, newest first
    async fn readings_for_profile(&self, profile_id: i64) -> Result<Vec<BloodPressureReading>, ServiceError>;

    /// Readings of every profile, newest first
    async fn all_readings(&self) -> Result<Vec<BloodPressureReading>, ServiceError>;

    async fn latest_reading(&self, profile_id: i64) -> Result<Option<BloodPressureReading>, ServiceError>;

    async fn get_reading(&self, id: i64) -> Result<BloodPressureReading, ServiceError>;

    async fn delete_reading(&self, id: i64) -> Result<(), ServiceError>;

    /// Statistics for the readings selected by the query; `None` when there are none
    async fn statistics(&self, query: &AnalyticsQuery) -> Result<Option<ReadingStatistics>, ServiceError>;

    /// Chart data for the readings selected by the query
    async fn charts(&self, query: &AnalyticsQuery) -> Result<ChartBundle, ServiceError>;

    /// Readings selected by the query in export order: profile name, then date and time
    async fn export_readings(&self, query: &AnalyticsQuery) -> Result<Vec<BloodPressureReading>, ServiceError>;
}

/// Reading service over the reading and profile repositories
pub struct ReadingService<R: ReadingRepositoryTrait, P: ProfileRepositoryTrait> {
    readings: R,
    profiles: P,
}

impl<R: ReadingRepositoryTrait, P: ProfileRepositoryTrait> ReadingService<R, P> {
    pub fn new(readings: R, profiles: P) -> Self {
        Self { readings, profiles }
    }

    async fn require_profile(&self, profile_id: i64) -> Result<(Gender, u32), ServiceError> {
        let profile = self
            .profiles
            .get_profile(profile_id)
            .await
            .map_err(map_repo_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Profile {} not found", profile_id)))?;

        let profile = conversions::convert_to_domain_profile(profile);
        Ok((profile.gender, profile.age))
    }

    /// Checks the queried profile exists and returns the range start date
    async fn resolve(&self, query: &AnalyticsQuery) -> Result<Option<NaiveDate>, ServiceError> {
        if let Some(profile_id) = query.profile_id {
            self.require_profile(profile_id).await?;
        }
        Ok(query.range.since(Local::now().date_naive()))
    }

    async fn select(&self, query: &AnalyticsQuery) -> Result<Vec<BloodPressureReading>, ServiceError> {
        let since = self.resolve(query).await?;
        let records = self
            .readings
            .readings_in_range(query.profile_id, since)
            .await
            .map_err(map_repo_error)?;

        Ok(records.into_iter().map(conversions::convert_to_domain_reading).collect())
    }
}

/// Parse the time of a reading, dropping seconds
fn parse_reading_time(raw: &str) -> Result<NaiveTime, ServiceError> {
    let raw = raw.trim();
    let parsed = NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ServiceError::Validation("Time must be in HH:MM format".to_string()))?;

    Ok(truncate_to_minute(parsed))
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

fn reading_timestamp(request: &CreateReadingRequest) -> Result<(NaiveDate, NaiveTime), ServiceError> {
    let now = Local::now().naive_local();
    let date = request.date.unwrap_or_else(|| now.date());
    let time = match request.time.as_deref() {
        Some(raw) if !raw.trim().is_empty() => parse_reading_time(raw)?,
        _ => truncate_to_minute(now.time()),
    };
    Ok((date, time))
}

#[async_trait]
impl<R, P> ReadingServiceTrait for ReadingService<R, P>
where
    R: ReadingRepositoryTrait,
    P: ProfileRepositoryTrait,
{
    fn validate_create_request(&self, request: &CreateReadingRequest) -> Result<(), ServiceError> {
        if let Err(errors) = request.validate() {
            return Err(ServiceError::Validation(validation_message(&errors)));
        }

        if request.systolic <= request.diastolic {
            return Err(ServiceError::Validation(
                "Systolic pressure must be greater than diastolic pressure".to_string(),
            ));
        }

        Ok(())
    }

    async fn record_reading(
        &self,
        profile_id: i64,
        request: CreateReadingRequest,
    ) -> Result<BloodPressureReading, ServiceError> {
        self.validate_create_request(&request)?;
        let (gender, age) = self.require_profile(profile_id).await?;
        let (date, time) = reading_timestamp(&request)?;

        let category = categorize_blood_pressure(request.systolic, request.diastolic, gender, age);
        if category.is_alarming() {
            warn!(
                "Profile {} recorded {}/{} ({})",
                profile_id, request.systolic, request.diastolic, category
            );
        }

        let id = self
            .readings
            .save_reading(NewReadingRecord {
                profile_id,
                date,
                time,
                systolic: request.systolic,
                diastolic: request.diastolic,
                heart_rate: request.heart_rate,
                category: category.to_string(),
            })
            .await
            .map_err(map_repo_error)?;

        info!("Recorded reading {} for profile {}", id, profile_id);
        self.get_reading(id).await
    }

    async fn readings_for_profile(&self, profile_id: i64) -> Result<Vec<BloodPressureReading>, ServiceError> {
        self.require_profile(profile_id).await?;
        let records = self
            .readings
            .readings_by_profile(profile_id)
            .await
            .map_err(map_repo_error)?;

        Ok(records.into_iter().map(conversions::convert_to_domain_reading).collect())
    }

    async fn all_readings(&self) -> Result<Vec<BloodPressureReading>, ServiceError> {
        let records = self.readings.all_readings().await.map_err(map_repo_error)?;
        Ok(records.into_iter().map(conversions::convert_to_domain_reading).collect())
    }

    async fn latest_reading(&self, profile_id: i64) -> Result<Option<BloodPressureReading>, ServiceError> {
        Ok(self.readings_for_profile(profile_id).await?.into_iter().next())
    }

    async fn get_reading(&self, id: i64) -> Result<BloodPressureReading, ServiceError> {
        self.readings
            .get_reading(id)
            .await
            .map_err(map_repo_error)?
            .map(conversions::convert_to_domain_reading)
            .ok_or_else(|| ServiceError::NotFound(format!("Reading {} not found", id)))
    }

    async fn delete_reading(&self, id: i64) -> Result<(), ServiceError> {
        let deleted = self.readings.delete_reading(id).await.map_err(map_repo_error)?;
        if !deleted {
            return Err(ServiceError::NotFound(format!("Reading {} not found", id)));
        }
        info!("Deleted reading {}", id);
        Ok(())
    }

    async fn statistics(&self, query: &AnalyticsQuery) -> Result<Option<ReadingStatistics>, ServiceError> {
        let readings = self.select(query).await?;
        Ok(calculate_statistics(&readings))
    }

    async fn charts(&self, query: &AnalyticsQuery) -> Result<ChartBundle, ServiceError> {
        let readings = self.select(query).await?;
        Ok(chart_bundle(&readings))
    }

    async fn export_readings(&self, query: &AnalyticsQuery) -> Result<Vec<BloodPressureReading>, ServiceError> {
        let since = self.resolve(query).await?;
        let records = self
            .readings
            .export_rows(query.profile_id, since)
            .await
            .map_err(map_repo_error)?;
        Ok(records.into_iter().map(conversions::convert_to_domain_reading).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::blood_pressure::{BloodPressureCategory, TimeRange};
    use bp_monitor_data::models::NewProfileRecord;
    use bp_monitor_data::repository::{ProfileRepository, ReadingRepository};
    use bp_monitor_data::Database;

    type Service = ReadingService<ReadingRepository, ProfileRepository>;

    async fn setup(gender: &str, age: u32) -> (Service, i64) {
        let db = Database::in_memory().unwrap();
        let profiles = ProfileRepository::new(db.readings_pool().clone());
        let profile = profiles
            .create_profile(NewProfileRecord {
                name: "Grace".to_string(),
                gender: gender.to_string(),
                age,
            })
            .await
            .unwrap();
        let service = ReadingService::new(ReadingRepository::new(db.readings_pool().clone()), profiles);
        (service, profile.id)
    }

    fn request(systolic: u32, diastolic: u32) -> CreateReadingRequest {
        CreateReadingRequest {
            systolic,
            diastolic,
            heart_rate: Some(72),
            date: NaiveDate::from_ymd_opt(2024, 4, 2),
            time: Some("08:30".to_string()),
        }
    }

    #[tokio::test]
    async fn test_validate_create_request_invalid_systolic() {
        let (service, _) = setup("Male", 40).await;
        let err = service.validate_create_request(&request(350, 80)).unwrap_err();
        assert!(err.to_string().contains("Systolic"));
    }

    #[tokio::test]
    async fn test_validate_systolic_not_greater_than_diastolic() {
        let (service, _) = setup("Male", 40).await;
        let err = service.validate_create_request(&request(90, 90)).unwrap_err();
        assert!(err.to_string().contains("greater than"));
    }

    #[tokio::test]
    async fn test_record_uses_profile_demographics() {
        let (service, pid) = setup("Female", 45).await;

        // 118/78 is normal on its own but stage 1 after the female adjustment
        let reading = service.record_reading(pid, request(118, 78)).await.unwrap();
        assert_eq!(reading.category, BloodPressureCategory::Hypertension1);
        assert_eq!(reading.profile_name, "Grace");
        assert_eq!(reading.time.format("%H:%M").to_string(), "08:30");
    }

    #[tokio::test]
    async fn test_record_for_missing_profile() {
        let (service, _) = setup("Male", 40).await;
        let err = service.record_reading(999, request(120, 80)).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_bad_time_is_rejected() {
        let (service, pid) = setup("Male", 40).await;
        let mut bad = request(120, 80);
        bad.time = Some("8.30am".to_string());
        let err = service.record_reading(pid, bad).await.unwrap_err();
        assert_eq!(err.to_string(), "Time must be in HH:MM format");
    }

    #[tokio::test]
    async fn test_defaults_to_now_and_drops_seconds() {
        let (service, pid) = setup("Male", 40).await;
        let mut req = request(120, 70);
        req.date = None;
        req.time = Some("21:45:59".to_string());
        let reading = service.record_reading(pid, req).await.unwrap();

        assert_eq!(reading.date, Local::now().date_naive());
        assert_eq!(reading.time, NaiveTime::from_hms_opt(21, 45, 0).unwrap());
    }

    #[tokio::test]
    async fn test_latest_statistics_and_delete() {
        let (service, pid) = setup("Male", 40).await;
        service.record_reading(pid, request(120, 80)).await.unwrap();
        let mut later = request(140, 90);
        later.time = Some("19:00".to_string());
        let last = service.record_reading(pid, later).await.unwrap();

        let latest = service.latest_reading(pid).await.unwrap().unwrap();
        assert_eq!(latest.id, last.id);

        let query = AnalyticsQuery { profile_id: Some(pid), range: TimeRange::All };
        let stats = service.statistics(&query).await.unwrap().unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.avg_systolic, 130.0);

        let charts = service.charts(&query).await.unwrap();
        assert_eq!(charts.trend.series[0].points.len(), 2);

        service.delete_reading(last.id).await.unwrap();
        assert!(matches!(
            service.delete_reading(last.id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
        assert_eq!(service.all_readings().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_statistics_empty_range() {
        let (service, pid) = setup("Male", 40).await;
        // Dated far in the past so the seven day window excludes it
        service.record_reading(pid, request(120, 80)).await.unwrap();

        let query = AnalyticsQuery { profile_id: Some(pid), range: TimeRange::Last7Days };
        assert!(service.statistics(&query).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_export_follows_query() {
        let (service, pid) = setup("Male", 40).await;
        service.record_reading(pid, request(120, 80)).await.unwrap();
        let mut today = request(130, 85);
        today.date = None;
        service.record_reading(pid, today).await.unwrap();

        let all = AnalyticsQuery { profile_id: Some(pid), range: TimeRange::All };
        assert_eq!(service.export_readings(&all).await.unwrap().len(), 2);

        let recent = AnalyticsQuery { profile_id: Some(pid), range: TimeRange::Last7Days };
        let rows = service.export_readings(&recent).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].systolic, 130);

        let missing = AnalyticsQuery { profile_id: Some(999), range: TimeRange::All };
        assert!(matches!(
            service.export_readings(&missing).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }
}
