//! bcrypt password hashes.

use bcrypt::BcryptError;

const COST: u32 = if cfg!(test) { 4 } else { bcrypt::DEFAULT_COST };

pub fn hash_password(password: &str) -> Result<String, BcryptError> {
    bcrypt::hash(password, COST)
}

/// Check a password against a stored hash. Malformed hashes never match.
pub fn verify_password(password: &str, stored: &str) -> bool {
    bcrypt::verify(password, stored).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("hunter2").unwrap();
        assert!(hash.starts_with("$2b$"));
        assert!(verify_password("hunter2", &hash));
        assert!(!verify_password("hunter3", &hash));
    }

    #[test]
    fn test_salted() {
        assert_ne!(hash_password("same").unwrap(), hash_password("same").unwrap());
    }

    #[test]
    fn test_malformed_hash() {
        assert!(!verify_password("x", ""));
        assert!(!verify_password("x", "plain-text"));
        assert!(!verify_password("x", "$2b$04$short"));
        assert!(!verify_password("x", "hmac-sha256$10000$00$00"));
    }
}
