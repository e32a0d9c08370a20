use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Result};

use crate::core::error::AppResult;
use crate::storage::migrations::run_migrations;

/// A registered bot user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Telegram ID of the user
    pub telegram_id: i64,
    /// First name as reported by Telegram at registration time
    pub first_name: Option<String>,
    /// Registration timestamp (SQLite `CURRENT_TIMESTAMP`, UTC)
    pub created_at: String,
}

pub type DbPool = Pool<SqliteConnectionManager>;
pub type DbConnection = PooledConnection<SqliteConnectionManager>;

/// Create a new database connection pool
///
/// Initializes a connection pool with up to 10 connections and applies the
/// embedded schema migrations.
///
/// # Arguments
///
/// * `database_path` - Path to SQLite database file
///
/// # Example
///
/// ```no_run
/// use encodebot::storage::create_pool;
///
/// let pool = create_pool("database.sqlite")?;
/// # Ok::<(), encodebot::core::error::AppError>(())
/// ```
pub fn create_pool(database_path: &str) -> AppResult<DbPool> {
    let manager = SqliteConnectionManager::file(database_path);
    let pool = Pool::builder()
        .max_size(10) // Maximum 10 connections in the pool
        .build(manager)?;

    let mut conn = pool.get()?;
    run_migrations(&mut conn)?;

    Ok(pool)
}

/// Get a connection from the pool
///
/// The connection is returned to the pool when dropped.
pub fn get_connection(pool: &DbPool) -> Result<DbConnection, r2d2::Error> {
    pool.get()
}

/// Registers a user unless they already exist.
///
/// Idempotent: a second call for the same id leaves the stored first name
/// untouched.
///
/// # Returns
///
/// `Ok(true)` if a new row was inserted, `Ok(false)` if the user was already known.
pub fn ensure_user(conn: &DbConnection, telegram_id: i64, first_name: Option<&str>) -> Result<bool> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO users (telegram_id, first_name) VALUES (?1, ?2)",
        params![telegram_id, first_name],
    )?;
    Ok(inserted > 0)
}

/// Fetches a user by Telegram ID.
///
/// # Returns
///
/// `Ok(Some(User))` if found, `Ok(None)` if the user never ran /start.
pub fn get_user(conn: &DbConnection, telegram_id: i64) -> Result<Option<User>> {
    conn.query_row(
        "SELECT telegram_id, first_name, created_at FROM users WHERE telegram_id = ?1",
        params![telegram_id],
        |row| {
            Ok(User {
                telegram_id: row.get(0)?,
                first_name: row.get(1)?,
                created_at: row.get(2)?,
            })
        },
    )
    .optional()
}

/// Number of registered users.
pub fn count_users(conn: &DbConnection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn test_pool() -> (TempDir, DbPool) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.sqlite");
        let pool = create_pool(path.to_str().unwrap()).unwrap();
        (dir, pool)
    }

    #[test]
    fn test_get_unknown_user() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();
        assert_eq!(get_user(&conn, 42).unwrap(), None);
    }

    #[test]
    fn test_ensure_user_is_idempotent() {
        let (_dir, pool) = test_pool();
        let conn = get_connection(&pool).unwrap();

        assert!(ensure_user(&conn, 42, Some("Alice")).unwrap());
        assert!(!ensure_user(&conn, 42, Some("Renamed")).unwrap());

        let user = get_user(&conn, 42).unwrap().unwrap();
        assert_eq!(user.telegram_id, 42);
        assert_eq!(user.first_name.as_deref(), Some("Alice"));
        assert_eq!(count_users(&conn).unwrap(), 1);
    }

    #[test]
    fn test_reopen_keeps_users() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("persist.sqlite");
        let path = path.to_str().unwrap();

        {
            let pool = create_pool(path).unwrap();
            let conn = get_connection(&pool).unwrap();
            ensure_user(&conn, 7, None).unwrap();
        }

        let pool = create_pool(path).unwrap();
        let conn = get_connection(&pool).unwrap();
        let user = get_user(&conn, 7).unwrap().unwrap();
        assert_eq!(user.first_name, None);
    }
}
