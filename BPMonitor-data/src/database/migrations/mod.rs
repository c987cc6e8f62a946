// Schema migrations, one module per database file
mod auth;
mod readings;

pub use auth::run_migrations as run_auth_migrations;
pub use readings::run_migrations as run_readings_migrations;
