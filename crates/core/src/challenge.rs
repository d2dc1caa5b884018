//! Short-lived MFA challenges, per spec.md §3 and §4.F.
//!
//! `tries`/`consumed` checks and the post-bad-code increment happen inside
//! one transaction with a row lock, so two concurrent verifies of the same
//! challenge (which the spec calls out as a possibility despite the
//! single-handler-at-a-time client design) never double-count a try or
//! double-consume.

use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::totp::verify_totp;

pub const CHALLENGE_TTL_SECONDS: i64 = 120;
const MAX_TRIES: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type, serde::Serialize, serde::Deserialize)]
#[sqlx(type_name = "challenge_type", rename_all = "UPPERCASE")]
pub enum ChallengeType {
    Login,
    /// Reserved for backward schema compatibility; no code path emits it —
    /// renew now requires a proof token instead of a challenge.
    Renew,
    Stepup,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Challenge {
    pub id: String,
    pub user_id: i64,
    #[sqlx(rename = "type")]
    pub challenge_type: ChallengeType,
    pub tries: i32,
    pub consumed: bool,
    pub expires_at: OffsetDateTime,
    pub created_at: OffsetDateTime,
}

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    challenge_type: ChallengeType,
) -> CoreResult<Challenge> {
    let id = Uuid::new_v4().to_string();
    let expires_at = sessiond_shared::now_utc() + time::Duration::seconds(CHALLENGE_TTL_SECONDS);

    let challenge = sqlx::query_as::<_, Challenge>(
        r#"
        INSERT INTO challenges (id, user_id, type, expires_at)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, type, tries, consumed, expires_at, created_at
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(challenge_type)
    .bind(expires_at)
    .fetch_one(pool)
    .await?;

    Ok(challenge)
}

/// Validate `code` against a challenge of the expected type and, on
/// success, mark it consumed. Returns the now-consumed challenge.
///
/// Mirrors the check order from `original_source/app/api/routes/auth.py`:
/// missing/wrong-type -> `NotFound`, consumed/expired -> `Gone`,
/// owner mismatch (when `expected_owner` is given, for the step-up path)
/// -> `Forbidden`, tries exhausted -> `TooManyTries`, bad code ->
/// `InvalidMfa` (with the try counter bumped before the error is
/// returned).
pub async fn verify_and_consume(
    pool: &PgPool,
    challenge_id: &str,
    expected_type: ChallengeType,
    expected_owner: Option<i64>,
    code: &str,
    mfa_secret: &str,
) -> CoreResult<Challenge> {
    let mut tx = pool.begin().await?;

    let challenge = sqlx::query_as::<_, Challenge>(
        r#"
        SELECT id, user_id, type, tries, consumed, expires_at, created_at
        FROM challenges WHERE id = $1 FOR UPDATE
        "#,
    )
    .bind(challenge_id)
    .fetch_optional(&mut *tx)
    .await?;

    let challenge = match challenge {
        Some(c) if c.challenge_type == expected_type => c,
        _ => return Err(CoreError::NotFound("challenge not found".into())),
    };

    if challenge.consumed {
        return Err(CoreError::Gone("challenge consumed".into()));
    }
    let now = sessiond_shared::now_utc();
    if challenge.expires_at <= now {
        return Err(CoreError::Gone("challenge expired".into()));
    }
    if let Some(owner) = expected_owner {
        if challenge.user_id != owner {
            return Err(CoreError::Forbidden("challenge belongs to another user".into()));
        }
    }
    if challenge.tries >= MAX_TRIES {
        return Err(CoreError::TooManyTries);
    }

    if !verify_totp(code, mfa_secret) {
        sqlx::query("UPDATE challenges SET tries = tries + 1 WHERE id = $1")
            .bind(challenge_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        return Err(CoreError::InvalidMfa);
    }

    sqlx::query("UPDATE challenges SET consumed = TRUE WHERE id = $1")
        .bind(challenge_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    Ok(Challenge {
        consumed: true,
        ..challenge
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_type_round_trips_through_sqlx_type() {
        assert_eq!(ChallengeType::Login, ChallengeType::Login);
        assert_ne!(ChallengeType::Login, ChallengeType::Stepup);
    }
}
