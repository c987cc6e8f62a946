//! Domain layer health check functionality
//! Reports on both database files behind the API

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, error};

use bp_monitor_data::Database;

/// Queries slower than this mark the database as degraded
const SLOW_QUERY_MS: u128 = 500;

/// System health status
#[derive(Debug, Clone, PartialEq)]
pub enum SystemStatus {
    /// All components are healthy
    Healthy,
    /// Some components are degraded but the system is functional
    Degraded,
    /// System is not functioning properly
    Unhealthy,
}

/// Component health status
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

/// Represents a health component with status and optional details
#[derive(Debug, Clone)]
pub struct HealthComponent {
    pub status: ComponentStatus,
    pub details: Option<String>,
}

/// Represents the overall health of the system
#[derive(Debug, Clone)]
pub struct SystemHealth {
    pub status: SystemStatus,
    /// Map of component names to their health status
    pub components: HashMap<String, HealthComponent>,
}

/// Trait for health services
#[async_trait]
pub trait HealthServiceTrait: Send + Sync + std::fmt::Debug {
    /// Get the overall system health
    async fn get_system_health(&self) -> SystemHealth;

    /// Check both databases.
    ///
    /// `Ok(true)` when they answer promptly, `Ok(false)` when they answer
    /// slowly and `Err` when either cannot be queried.
    async fn check_database_status(&self) -> Result<bool, String>;
}

/// Health service over the database handle
#[derive(Debug, Clone)]
pub struct HealthService {
    db: Database,
}

impl HealthService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl HealthServiceTrait for HealthService {
    async fn get_system_health(&self) -> SystemHealth {
        let database = match self.check_database_status().await {
            Ok(true) => HealthComponent {
                status: ComponentStatus::Healthy,
                details: Some(self.db.get_connection_info()),
            },
            Ok(false) => HealthComponent {
                status: ComponentStatus::Degraded,
                details: Some("Database is available but has performance issues".to_string()),
            },
            Err(e) => HealthComponent {
                status: ComponentStatus::Unhealthy,
                details: Some(e),
            },
        };

        let api = HealthComponent {
            status: ComponentStatus::Healthy,
            details: None,
        };

        let status = match database.status {
            ComponentStatus::Unhealthy => SystemStatus::Unhealthy,
            ComponentStatus::Degraded => SystemStatus::Degraded,
            ComponentStatus::Healthy => SystemStatus::Healthy,
        };

        SystemHealth {
            status,
            components: [("database".to_string(), database), ("api".to_string(), api)]
                .into_iter()
                .collect(),
        }
    }

    async fn check_database_status(&self) -> Result<bool, String> {
        let started = Instant::now();
        match self.db.check_health() {
            Ok(()) => {
                let elapsed = started.elapsed().as_millis();
                debug!("Database health check took {}ms", elapsed);
                Ok(elapsed < SLOW_QUERY_MS)
            }
            Err(e) => {
                error!("Database health check failed: {}", e);
                Err(format!("Database connection error: {}", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_databases_are_healthy() {
        let service = HealthService::new(Database::in_memory().unwrap());

        assert_eq!(service.check_database_status().await, Ok(true));

        let health = service.get_system_health().await;
        assert_eq!(health.status, SystemStatus::Healthy);
        assert!(health.components.contains_key("database"));
        assert_eq!(health.components["api"].status, ComponentStatus::Healthy);
    }
}
