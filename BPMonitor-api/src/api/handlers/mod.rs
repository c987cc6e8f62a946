pub mod analytics;
pub mod auth;
pub mod health;
pub mod profiles;
pub mod readings;

pub use health::health_check;
