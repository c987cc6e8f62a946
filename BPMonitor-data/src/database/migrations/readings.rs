use rusqlite::Connection;
use tracing::info;

/// Run migrations for the blood pressure database
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running readings database migrations");

    create_profiles_table(conn)?;
    create_readings_table(conn)?;
    create_readings_index(conn)?;

    info!("Readings database migrations completed successfully");
    Ok(())
}

/// Create the profiles table
fn create_profiles_table(conn: &Connection) -> Result<(), String> {
    info!("Creating profiles table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS profiles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            gender TEXT NOT NULL,
            age INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

/// Create the readings table
fn create_readings_table(conn: &Connection) -> Result<(), String> {
    info!("Creating readings table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS readings (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            profile_id INTEGER NOT NULL,
            date TEXT NOT NULL,
            time TEXT NOT NULL,
            systolic INTEGER NOT NULL,
            diastolic INTEGER NOT NULL,
            heart_rate INTEGER,
            category TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (profile_id) REFERENCES profiles (id) ON DELETE CASCADE
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

/// Create index on profile and date for the history queries
fn create_readings_index(conn: &Connection) -> Result<(), String> {
    info!("Creating index on profile_id, date");

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_readings_profile_date
        ON readings (profile_id, date DESC, time DESC)",
        [],
    ).map_err(|e| format!("Failed to create index: {}", e))?;

    Ok(())
}
