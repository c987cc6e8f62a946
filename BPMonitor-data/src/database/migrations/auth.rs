use rusqlite::Connection;
use tracing::info;

/// Run migrations for the authentication database
pub fn run_migrations(conn: &Connection) -> Result<(), String> {
    info!("Running auth database migrations");

    create_users_table(conn)?;
    create_sessions_table(conn)?;
    create_login_attempts_table(conn)?;
    create_auth_indexes(conn)?;

    info!("Auth database migrations completed successfully");
    Ok(())
}

/// Create the users table
fn create_users_table(conn: &Connection) -> Result<(), String> {
    info!("Creating users table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT,
            salt TEXT,
            mobile TEXT,
            is_email_verified INTEGER NOT NULL DEFAULT 0,
            is_mobile_verified INTEGER NOT NULL DEFAULT 0,
            verification_code TEXT,
            verification_code_expiry TEXT,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

/// Create the sessions table
fn create_sessions_table(conn: &Connection) -> Result<(), String> {
    info!("Creating sessions table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            session_token TEXT NOT NULL,
            ip_address TEXT,
            user_agent TEXT,
            created_at TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

/// Create the login attempts table
fn create_login_attempts_table(conn: &Connection) -> Result<(), String> {
    info!("Creating login_attempts table if not exists");

    conn.execute(
        "CREATE TABLE IF NOT EXISTS login_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT,
            email TEXT,
            ip_address TEXT NOT NULL,
            attempt_time TEXT NOT NULL,
            success INTEGER NOT NULL DEFAULT 0
        )",
        [],
    ).map_err(|e| e.to_string())?;

    Ok(())
}

fn create_auth_indexes(conn: &Connection) -> Result<(), String> {
    conn.execute_batch(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_sessions_token ON sessions (session_token);
         CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions (user_id, created_at DESC);
         CREATE INDEX IF NOT EXISTS idx_login_attempts_ip ON login_attempts (ip_address, attempt_time);"
    ).map_err(|e| format!("Failed to create index: {}", e))?;

    Ok(())
}
