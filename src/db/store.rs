//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

use super::models::*;

mod embedded {
    refinery::embed_migrations!("migrations");
}

const DB_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const USER_COLUMNS: &str = "id, username, email, hashed_password, is_active, is_superuser, \
     token, token_expires_at, last_login, created_at, updated_at";

const CREDENTIAL_COLUMNS: &str =
    "id, user_id, service_name, token, token_expires_at, is_active, created_at, updated_at";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Constraint violated: {0}")]
    Conflict(String),
    #[error("Database connection lock poisoned")]
    Poisoned,
    #[error("Not found")]
    NotFound,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let mut conn = self.conn()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let report = embedded::migrations::runner()
            .run(&mut *conn)
            .map_err(|e| DbError::Migration(e.to_string()))?;
        for migration in report.applied_migrations() {
            tracing::info!("Applied migration {}", migration);
        }
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    // --- Users ---

    /// Insert a user and return the stored row.
    pub fn create_user(&self, user: &NewUser) -> Result<User, DbError> {
        let now = format_db_time(Utc::now());
        let id = {
            let conn = self.conn()?;
            conn.execute(
                "INSERT INTO users (username, email, hashed_password, is_active, is_superuser, created_at, updated_at) VALUES (?1, ?2, ?3, 1, ?4, ?5, ?5)",
                params![user.username, user.email, user.hashed_password, user.is_superuser, now],
            )
            .map_err(constraint_error)?;
            conn.last_insert_rowid()
        };
        self.get_user(id)
    }

    /// Get a user by ID.
    pub fn get_user(&self, id: i64) -> Result<User, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )
            .optional()?;
        user.ok_or(DbError::NotFound)
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    pub fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DbError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE email = ?1", USER_COLUMNS),
                params![email],
                user_from_row,
            )
            .optional()?;
        Ok(user)
    }

    /// Record a fresh login token on the user row.
    pub fn set_user_token(
        &self,
        user_id: i64,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), DbError> {
        let now = format_db_time(Utc::now());
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE users SET token = ?1, token_expires_at = ?2, last_login = ?3, updated_at = ?3 WHERE id = ?4",
            params![token, format_db_time(expires_at), now, user_id],
        )?;
        if updated == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }

    pub fn count_superusers(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE is_superuser = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // --- Service credentials ---

    /// Create the credential for `(user_id, service_name)` or rotate its token.
    pub fn upsert_service_credential(
        &self,
        user_id: i64,
        service_name: &str,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<ServiceCredential, DbError> {
        let now = format_db_time(Utc::now());
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO service_credentials (user_id, service_name, token, token_expires_at, is_active, created_at, updated_at) \
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5) \
             ON CONFLICT(user_id, service_name) DO UPDATE SET \
             token = excluded.token, token_expires_at = excluded.token_expires_at, is_active = 1, updated_at = excluded.updated_at",
            params![user_id, service_name, token, format_db_time(expires_at), now],
        )
        .map_err(constraint_error)?;

        let credential = conn.query_row(
            &format!(
                "SELECT {} FROM service_credentials WHERE user_id = ?1 AND service_name = ?2",
                CREDENTIAL_COLUMNS
            ),
            params![user_id, service_name],
            credential_from_row,
        )?;
        Ok(credential)
    }

    pub fn find_service_credential_by_token(
        &self,
        token: &str,
    ) -> Result<Option<ServiceCredential>, DbError> {
        let conn = self.conn()?;
        let credential = conn
            .query_row(
                &format!(
                    "SELECT {} FROM service_credentials WHERE token = ?1",
                    CREDENTIAL_COLUMNS
                ),
                params![token],
                credential_from_row,
            )
            .optional()?;
        Ok(credential)
    }

    /// Active credentials owned by a user.
    pub fn list_service_credentials(&self, user_id: i64) -> Result<Vec<ServiceCredential>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_credentials WHERE user_id = ?1 AND is_active = 1 ORDER BY service_name",
            CREDENTIAL_COLUMNS
        ))?;

        let credentials = stmt
            .query_map(params![user_id], credential_from_row)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(credentials)
    }

    pub fn get_service_credential(&self, id: i64) -> Result<ServiceCredential, DbError> {
        let conn = self.conn()?;
        let credential = conn
            .query_row(
                &format!("SELECT {} FROM service_credentials WHERE id = ?1", CREDENTIAL_COLUMNS),
                params![id],
                credential_from_row,
            )
            .optional()?;
        credential.ok_or(DbError::NotFound)
    }

    pub fn delete_service_credential(&self, id: i64) -> Result<(), DbError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM service_credentials WHERE id = ?1", params![id])?;
        if deleted == 0 {
            return Err(DbError::NotFound);
        }
        Ok(())
    }
}

fn user_from_row(row: &Row<'_>) -> SqlResult<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        hashed_password: row.get(3)?,
        is_active: row.get(4)?,
        is_superuser: row.get(5)?,
        token: row.get(6)?,
        token_expires_at: row.get::<_, Option<String>>(7)?.and_then(|s| parse_db_time(&s)),
        last_login: row.get::<_, Option<String>>(8)?.and_then(|s| parse_db_time(&s)),
        created_at: parse_db_time(&row.get::<_, String>(9)?).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&row.get::<_, String>(10)?).unwrap_or_else(Utc::now),
    })
}

fn credential_from_row(row: &Row<'_>) -> SqlResult<ServiceCredential> {
    Ok(ServiceCredential {
        id: row.get(0)?,
        user_id: row.get(1)?,
        service_name: row.get(2)?,
        token: row.get(3)?,
        // An unreadable expiry is treated as already expired.
        token_expires_at: parse_db_time(&row.get::<_, String>(4)?)
            .unwrap_or(DateTime::<Utc>::MIN_UTC),
        is_active: row.get(5)?,
        created_at: parse_db_time(&row.get::<_, String>(6)?).unwrap_or_else(Utc::now),
        updated_at: parse_db_time(&row.get::<_, String>(7)?).unwrap_or_else(Utc::now),
    })
}

fn constraint_error(e: rusqlite::Error) -> DbError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg) if err.code == ErrorCode::ConstraintViolation => {
            DbError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => DbError::Sqlite(e),
    }
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(DB_TIME_FORMAT).to_string()
}

fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [DB_TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{}@example.com", name),
            hashed_password: "hash".to_string(),
            is_superuser: false,
        }
    }

    #[test]
    fn test_user_crud() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();

        // Create
        let user = store.create_user(&new_user("alice")).unwrap();
        assert!(user.id > 0);
        assert!(user.is_active);
        assert!(user.token.is_none());

        // Read
        let fetched = store.find_user_by_username("alice").unwrap().unwrap();
        assert_eq!(fetched.email, "alice@example.com");
        assert!(store.find_user_by_username("bob").unwrap().is_none());
        assert!(store.find_user_by_email("alice@example.com").unwrap().is_some());

        // Token
        let expires = Utc::now() + Duration::minutes(30);
        store.set_user_token(user.id, "tok", expires).unwrap();
        let fetched = store.get_user(user.id).unwrap();
        assert_eq!(fetched.token.as_deref(), Some("tok"));
        assert_eq!(fetched.token_expires_at, Some(expires));
        assert!(fetched.last_login.is_some());

        assert!(matches!(store.get_user(999), Err(DbError::NotFound)));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        store.create_user(&new_user("alice")).unwrap();

        let mut dup = new_user("alice");
        dup.email = "other@example.com".to_string();
        assert!(matches!(store.create_user(&dup), Err(DbError::Conflict(_))));
    }

    #[test]
    fn test_reopen_keeps_data() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let store = Store::new(tmp.path()).unwrap();
            let mut admin = new_user("admin");
            admin.is_superuser = true;
            store.create_user(&admin).unwrap();
        }
        let store = Store::new(tmp.path()).unwrap();
        assert_eq!(store.count_superusers().unwrap(), 1);
    }

    #[test]
    fn test_service_credential_rotation() {
        let tmp = NamedTempFile::new().unwrap();
        let store = Store::new(tmp.path()).unwrap();
        let user = store.create_user(&new_user("alice")).unwrap();
        let expires = Utc::now() + Duration::minutes(30);

        let first = store
            .upsert_service_credential(user.id, "grafana", "t1", expires)
            .unwrap();
        let second = store
            .upsert_service_credential(user.id, "grafana", "t2", expires)
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.token, "t2");
        assert!(store.find_service_credential_by_token("t1").unwrap().is_none());
        assert!(store.find_service_credential_by_token("t2").unwrap().is_some());

        store
            .upsert_service_credential(user.id, "proxmox", "t3", expires)
            .unwrap();
        let listed = store.list_service_credentials(user.id).unwrap();
        let names: Vec<_> = listed.iter().map(|c| c.service_name.as_str()).collect();
        assert_eq!(names, vec!["grafana", "proxmox"]);

        store.delete_service_credential(first.id).unwrap();
        assert!(matches!(
            store.get_service_credential(first.id),
            Err(DbError::NotFound)
        ));
        assert!(matches!(
            store.delete_service_credential(first.id),
            Err(DbError::NotFound)
        ));
    }

    #[test]
    fn test_parse_db_time() {
        let t = Utc::now();
        assert_eq!(parse_db_time(&format_db_time(t)), Some(t));
        assert!(parse_db_time("2024-05-01T10:00:00Z").is_some());
        assert!(parse_db_time("yesterday").is_none());
    }
}
