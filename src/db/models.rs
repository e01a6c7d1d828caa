//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A registered API user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub is_superuser: bool,
    /// Current login token and its expiry.
    pub token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields required to insert a user.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_superuser: bool,
}

/// A per-service bearer token owned by a user.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceCredential {
    pub id: i64,
    pub user_id: i64,
    pub service_name: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub token_expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
