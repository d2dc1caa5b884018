//! TOTP verification with a ±1 step window (≈±30s), per spec.md §4.B.

use totp_rs::{Algorithm, Secret, TOTP};

const DIGITS: usize = 6;
const SKEW: u8 = 1;
const STEP_SECONDS: u64 = 30;

/// `verify_totp(code, secret) -> bool`. Any failure constructing the TOTP
/// (bad base32 secret, clock error) maps to `false`, matching the spec's
/// contract that internal exceptions never propagate as errors here.
pub fn verify_totp(code: &str, secret: &str) -> bool {
    let secret_bytes = match Secret::Encoded(secret.to_string()).to_bytes() {
        Ok(b) => b,
        Err(_) => return false,
    };
    let totp = match TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP_SECONDS, secret_bytes) {
        Ok(t) => t,
        Err(_) => return false,
    };
    totp.check_current(code).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "JBSWY3DPEHPK3PXP";

    #[test]
    fn valid_current_code_accepted() {
        let secret_bytes = Secret::Encoded(TEST_SECRET.to_string())
            .to_bytes()
            .expect("valid base32");
        let totp = TOTP::new(Algorithm::SHA1, DIGITS, SKEW, STEP_SECONDS, secret_bytes)
            .expect("valid totp config");
        let code = totp.generate_current().expect("generate");
        assert!(verify_totp(&code, TEST_SECRET));
    }

    #[test]
    fn garbage_code_rejected() {
        assert!(!verify_totp("000000", TEST_SECRET));
    }

    #[test]
    fn malformed_secret_is_false_not_panic() {
        assert!(!verify_totp("123456", "not valid base32!!"));
    }
}
