//! Password hashing/verification. Argon2id, the teacher's adaptive hash of
//! choice — constant-time comparison is built into `argon2::PasswordVerifier`.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::rngs::OsRng;

pub fn hash_password(plain: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| format!("password hash failed: {e}"))
}

/// `verify_password(plain, stored_hash) -> bool`, per spec.md §4.B.
///
/// Any malformed stored hash is treated as a verification failure rather
/// than propagated, matching the boolean contract the spec calls for.
pub fn verify_password(plain: &str, stored_hash: &str) -> bool {
    let parsed = match PasswordHash::new(stored_hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let hash = hash_password("changeme").expect("hash");
        assert!(verify_password("changeme", &hash));
        assert!(!verify_password("wrong", &hash));
    }

    #[test]
    fn malformed_hash_is_false_not_panic() {
        assert!(!verify_password("changeme", "not-a-hash"));
    }
}
