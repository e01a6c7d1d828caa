//! User registration, login and bearer token verification.

mod password;
mod token;

pub use password::{hash_password, verify_password};
pub use token::{Claims, IssuedToken, TokenIssuer};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::db::{DbError, NewUser, ServiceCredential, Store, User};

/// Username of the account seeded on first start.
pub const ADMIN_USERNAME: &str = "admin";
const ADMIN_EMAIL: &str = "admin@localhost";

/// Authentication error types.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Incorrect username or password")]
    InvalidCredentials,
    #[error("Username already registered")]
    UsernameTaken,
    #[error("Email already registered")]
    EmailTaken,
    #[error("Inactive user")]
    Inactive,
    #[error("Could not validate credentials")]
    InvalidToken,
    #[error("Service credential not found")]
    CredentialNotFound,
    #[error("Failed to hash password")]
    Hash,
    #[error("Failed to sign token: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_superuser: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            is_active: user.is_active,
            is_superuser: user.is_superuser,
            last_login: user.last_login,
            created_at: user.created_at,
        }
    }
}

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    pub token: IssuedToken,
    pub service_credentials: Vec<ServiceCredential>,
}

/// Who a verified bearer token belongs to.
#[derive(Debug, Clone)]
pub struct Principal {
    pub user: User,
    /// Set when authenticated with a per-service token.
    pub service: Option<String>,
}

/// Registers users and issues and verifies their tokens.
pub struct CredentialsService {
    store: Arc<Store>,
    tokens: TokenIssuer,
}

impl CredentialsService {
    pub fn new(store: Arc<Store>, tokens: TokenIssuer) -> Self {
        Self { store, tokens }
    }

    /// Create an account and log it in straight away.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(User, IssuedToken), AuthError> {
        if self.store.find_user_by_username(username)?.is_some() {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.find_user_by_email(email)?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let user = self.create_user(username, email, password, false)?;
        tracing::info!("Registered user {}", user.username);

        let token = self.start_session(&user)?;
        let user = self.store.get_user(user.id)?;
        Ok((user, token))
    }

    /// Check a username/password pair.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self
            .store
            .find_user_by_username(username)?
            .ok_or(AuthError::InvalidCredentials)?;
        if !verify_password(password, &user.hashed_password) {
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Inactive);
        }
        Ok(user)
    }

    pub fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, AuthError> {
        let user = self.authenticate(username, password)?;
        let token = self.start_session(&user)?;
        let service_credentials = self.store.list_service_credentials(user.id)?;
        let user = self.store.get_user(user.id)?;
        tracing::info!("User {} logged in", user.username);

        Ok(LoginOutcome {
            user,
            token,
            service_credentials,
        })
    }

    /// Issue a token scoped to `service_name`, replacing any previous one.
    pub fn issue_service_token(
        &self,
        username: &str,
        password: &str,
        service_name: &str,
    ) -> Result<(ServiceCredential, IssuedToken), AuthError> {
        let user = self.authenticate(username, password)?;
        let token = self.tokens.issue(&user.username, Some(service_name))?;
        let credential = self.store.upsert_service_credential(
            user.id,
            service_name,
            &token.access_token,
            token.expires_at,
        )?;
        tracing::info!("Issued {} token for {}", service_name, user.username);
        Ok((credential, token))
    }

    /// Verify a bearer token against its signature and the stored credential.
    pub fn verify_bearer(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.tokens.verify(token)?;
        let user = self
            .store
            .find_user_by_username(&claims.sub)?
            .ok_or(AuthError::InvalidToken)?;
        if !user.is_active {
            return Err(AuthError::Inactive);
        }

        let now = Utc::now();
        match claims.service {
            Some(service) => {
                let credential = self
                    .store
                    .find_service_credential_by_token(token)?
                    .ok_or(AuthError::InvalidToken)?;
                if !credential.is_active
                    || credential.user_id != user.id
                    || credential.token_expires_at <= now
                {
                    return Err(AuthError::InvalidToken);
                }
                Ok(Principal {
                    user,
                    service: Some(service),
                })
            }
            None => {
                let current = user.token.as_deref() == Some(token)
                    && user.token_expires_at.map_or(false, |exp| exp > now);
                if !current {
                    return Err(AuthError::InvalidToken);
                }
                Ok(Principal {
                    user,
                    service: None,
                })
            }
        }
    }

    /// Delete one of the user's own service credentials.
    pub fn delete_service_credential(&self, user: &User, credential_id: i64) -> Result<(), AuthError> {
        let credential = match self.store.get_service_credential(credential_id) {
            Ok(c) => c,
            Err(DbError::NotFound) => return Err(AuthError::CredentialNotFound),
            Err(e) => return Err(e.into()),
        };
        if credential.user_id != user.id {
            return Err(AuthError::CredentialNotFound);
        }
        self.store.delete_service_credential(credential_id)?;
        tracing::info!(
            "Deleted {} credential {} of {}",
            credential.service_name,
            credential_id,
            user.username
        );
        Ok(())
    }

    /// Create the `admin` superuser when no superuser exists yet.
    ///
    /// Returns whether an account was created.
    pub fn ensure_admin(&self, password: &str) -> Result<bool, AuthError> {
        if self.store.count_superusers()? > 0
            || self.store.find_user_by_username(ADMIN_USERNAME)?.is_some()
        {
            return Ok(false);
        }
        self.create_user(ADMIN_USERNAME, ADMIN_EMAIL, password, true)?;
        Ok(true)
    }

    fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        is_superuser: bool,
    ) -> Result<User, AuthError> {
        let hashed_password = hash_password(password).map_err(|_| AuthError::Hash)?;
        let user = self.store.create_user(&NewUser {
            username: username.to_string(),
            email: email.to_string(),
            hashed_password,
            is_superuser,
        })?;
        Ok(user)
    }

    fn start_session(&self, user: &User) -> Result<IssuedToken, AuthError> {
        let token = self.tokens.issue(&user.username, None)?;
        self.store
            .set_user_token(user.id, &token.access_token, token.expires_at)?;
        Ok(token)
    }
}
