//! HS256 bearer tokens.

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

const ALGORITHM: Algorithm = Algorithm::HS256;

/// Token claims. `service` is set on per-service tokens only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
}

/// A freshly signed token as returned to clients.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_at: DateTime<Utc>,
}

/// Signs and checks tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
}

impl TokenIssuer {
    pub fn new(secret: &str, lifetime_minutes: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            lifetime: Duration::minutes(lifetime_minutes),
        }
    }

    pub fn issue(&self, subject: &str, service: Option<&str>) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let exp = now + self.lifetime;
        let claims = Claims {
            sub: subject.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            jti: hex::encode(rand::random::<[u8; 16]>()),
            service: service.map(String::from),
        };

        let access_token = encode(&Header::new(ALGORITHM), &claims, &self.encoding)?;
        Ok(IssuedToken {
            access_token,
            token_type: "bearer",
            // Second precision, matching what the token itself carries.
            expires_at: Utc.timestamp_opt(claims.exp, 0).single().unwrap_or(exp),
        })
    }

    /// Check signature and expiry and return the claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        decode::<Claims>(token, &self.decoding, &Validation::new(ALGORITHM))
            .map(|data| data.claims)
            .map_err(|e| {
                tracing::debug!("Rejected bearer token: {}", e);
                AuthError::InvalidToken
            })
    }
}
