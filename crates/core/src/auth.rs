//! Login and step-up protocol, per spec.md §4.H.

use sqlx::PgPool;

use crate::audit;
use crate::challenge::{self, ChallengeType};
use crate::error::{CoreError, CoreResult};
use crate::password::verify_password;
use crate::token::JwtManager;
use crate::user;

pub struct StartedChallenge {
    pub challenge_id: String,
    pub mfa_required: bool,
    pub challenge_expires_in: i64,
}

pub struct LoginTokens {
    pub access_token: String,
    pub access_expires_in: i64,
    pub proof_token: String,
    pub proof_expires_in: i64,
}

pub struct ProofToken {
    pub proof_token: String,
    pub proof_expires_in: i64,
}

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt: JwtManager,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt: JwtManager) -> Self {
        Self { pool, jwt }
    }

    /// `auth_start(username, password)`. Unknown user and wrong password
    /// collapse onto the same error — no user-enumeration signal beyond
    /// the single `InvalidCredentials` variant.
    pub async fn auth_start(&self, username: &str, password: &str) -> CoreResult<StartedChallenge> {
        let found = user::find_by_username(&self.pool, username).await?;
        let user = match found {
            Some(u) if u.is_active && verify_password(password, &u.password_hash) => u,
            _ => return Err(CoreError::InvalidCredentials),
        };

        let ch = challenge::create(&self.pool, user.id, ChallengeType::Login).await?;
        audit::record(&self.pool, "auth_start", Some(user.id), None, None).await?;

        Ok(StartedChallenge {
            challenge_id: ch.id,
            mfa_required: true,
            challenge_expires_in: challenge::CHALLENGE_TTL_SECONDS,
        })
    }

    /// `verify_mfa(challenge_id, totp_code)`: mints both token scopes.
    pub async fn verify_mfa(&self, challenge_id: &str, totp_code: &str) -> CoreResult<LoginTokens> {
        let owner_id = self.peek_challenge_owner(challenge_id, ChallengeType::Login).await?;
        let owner = user::find_by_id(&self.pool, owner_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("challenge not found".into()))?;

        let challenge = challenge::verify_and_consume(
            &self.pool,
            challenge_id,
            ChallengeType::Login,
            None,
            totp_code,
            &owner.mfa_secret,
        )
        .await?;

        audit::record(&self.pool, "auth_mfa_verified", Some(challenge.user_id), None, None).await?;

        Ok(LoginTokens {
            access_token: self.jwt.mint_access(challenge.user_id)?,
            access_expires_in: self.jwt.access_ttl_seconds(),
            proof_token: self.jwt.mint_proof(challenge.user_id)?,
            proof_expires_in: self.jwt.proof_ttl_seconds(),
        })
    }

    /// `step_up_start(current_user_from_access_token)`.
    pub async fn step_up_start(&self, user_id: i64) -> CoreResult<StartedChallenge> {
        let ch = challenge::create(&self.pool, user_id, ChallengeType::Stepup).await?;
        audit::record(&self.pool, "stepup_start", Some(user_id), None, None).await?;

        Ok(StartedChallenge {
            challenge_id: ch.id,
            mfa_required: true,
            challenge_expires_in: challenge::CHALLENGE_TTL_SECONDS,
        })
    }

    /// `step_up_verify(challenge_id, totp_code, current_user_from_access_token)`.
    ///
    /// Check order matches `original_source/app/api/routes/auth.py::verify_stepup`:
    /// not-found/wrong-type, then consumed/expired, then the owner check
    /// (`Forbidden`), then tries-exhausted, then the TOTP compare itself —
    /// all enforced inside `verify_and_consume` via `expected_owner`.
    pub async fn step_up_verify(
        &self,
        challenge_id: &str,
        totp_code: &str,
        current_user_id: i64,
    ) -> CoreResult<ProofToken> {
        let caller = user::find_by_id(&self.pool, current_user_id)
            .await?
            .ok_or_else(|| CoreError::NotFound("user not found".into()))?;

        let challenge = challenge::verify_and_consume(
            &self.pool,
            challenge_id,
            ChallengeType::Stepup,
            Some(current_user_id),
            totp_code,
            &caller.mfa_secret,
        )
        .await?;

        audit::record(&self.pool, "stepup_mfa_verified", Some(challenge.user_id), None, None).await?;

        Ok(ProofToken {
            proof_token: self.jwt.mint_proof(challenge.user_id)?,
            proof_expires_in: self.jwt.proof_ttl_seconds(),
        })
    }

    /// Look up whose challenge this is, so `verify_mfa` can load that
    /// user's `mfa_secret` before the caller has any token to identify
    /// themselves with.
    async fn peek_challenge_owner(&self, challenge_id: &str, expected_type: ChallengeType) -> CoreResult<i64> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT user_id FROM challenges WHERE id = $1 AND type = $2",
        )
        .bind(challenge_id)
        .bind(expected_type)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id,)| id)
            .ok_or_else(|| CoreError::NotFound("challenge not found".into()))
    }
}
