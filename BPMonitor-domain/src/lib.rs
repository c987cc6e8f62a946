// BP Monitor Domain
// Business rules for blood pressure tracking: accounts, profiles, readings and their analysis

// Reading, profile, chart and export services
pub mod services;

// Accounts, sessions, signed tokens and Google sign-in
pub mod auth;

// Domain entities
pub mod entities;

// Health checks and system status
pub mod health;

// Text message delivery
pub mod sms;

// Re-export the database module from the data crate for convenience
pub use bp_monitor_data::database;
