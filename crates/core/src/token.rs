//! Symmetric-signed bearer tokens with a `scope` claim, per spec.md §4.A.

use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Access,
    Proof,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id, as a string (JWT convention for `sub`).
    pub sub: String,
    pub scope: Scope,
    /// Absolute expiry, seconds since the epoch.
    pub exp: i64,
}

#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_seconds: i64,
    proof_ttl_seconds: i64,
}

impl JwtManager {
    pub fn new(secret: &str, access_ttl_seconds: i64, proof_ttl_seconds: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_ttl_seconds,
            proof_ttl_seconds,
        }
    }

    fn mint(&self, user_id: i64, scope: Scope, ttl_seconds: i64) -> CoreResult<String> {
        let exp = (sessiond_shared::now_utc() + time::Duration::seconds(ttl_seconds)).unix_timestamp();
        let claims = Claims {
            sub: user_id.to_string(),
            scope,
            exp,
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Internal(format!("token mint failed: {e}")))
    }

    pub fn mint_access(&self, user_id: i64) -> CoreResult<String> {
        self.mint(user_id, Scope::Access, self.access_ttl_seconds)
    }

    pub fn mint_proof(&self, user_id: i64) -> CoreResult<String> {
        self.mint(user_id, Scope::Proof, self.proof_ttl_seconds)
    }

    pub fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub fn proof_ttl_seconds(&self) -> i64 {
        self.proof_ttl_seconds
    }

    /// Verify the token and require it to carry `expected_scope`. Rejects on
    /// bad signature, wrong algorithm, expired `exp`, or scope mismatch.
    pub fn verify(&self, token: &str, expected_scope: Scope) -> CoreResult<Claims> {
        let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
        validation.validate_exp = true;
        let data = decode::<Claims>(token, &self.decoding_key, &validation)
            .map_err(|_| CoreError::Unauthenticated)?;
        if data.claims.scope != expected_scope {
            return Err(CoreError::Unauthenticated);
        }
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new("test-secret", 900, 60)
    }

    #[test]
    fn access_token_rejected_by_proof_scope() {
        let mgr = manager();
        let token = mgr.mint_access(7).expect("mint");
        assert!(mgr.verify(&token, Scope::Access).is_ok());
        assert!(mgr.verify(&token, Scope::Proof).is_err());
    }

    #[test]
    fn proof_token_rejected_by_access_scope() {
        let mgr = manager();
        let token = mgr.mint_proof(7).expect("mint");
        assert!(mgr.verify(&token, Scope::Proof).is_ok());
        assert!(mgr.verify(&token, Scope::Access).is_err());
    }

    #[test]
    fn bad_signature_rejected() {
        let mgr = manager();
        let other = JwtManager::new("different-secret", 900, 60);
        let token = mgr.mint_access(7).expect("mint");
        assert!(other.verify(&token, Scope::Access).is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let mgr = JwtManager::new("test-secret", -5, -5);
        let token = mgr.mint_access(7).expect("mint");
        assert!(mgr.verify(&token, Scope::Access).is_err());
    }
}
