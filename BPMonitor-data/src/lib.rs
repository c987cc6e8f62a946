// BP Monitor Data
// This crate owns the two SQLite files and the repositories over them

// Database connection management
pub mod database;

// Repository implementations for data access
pub mod repository;

// Data storage models
pub mod models;

pub use database::{Database, DatabaseConfig, DatabaseError, SqlitePool};
pub use repository::RepositoryError;
