//! User lookups. Users are immutable w.r.t. this core — created/managed
//! externally, per spec.md §3.

use sqlx::PgPool;

use crate::error::CoreResult;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub mfa_secret: String,
    pub is_active: bool,
}

pub async fn find_by_username(pool: &PgPool, username: &str) -> CoreResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, mfa_secret, is_active FROM users WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

pub async fn find_by_id(pool: &PgPool, user_id: i64) -> CoreResult<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, password_hash, mfa_secret, is_active FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

/// Seed the `demo`/`changeme` user used by the local dev flow, if absent.
/// Gated behind `WG_SEED_DEFAULT_USER`; a no-op once the row exists.
pub async fn seed_default_user(pool: &PgPool) -> CoreResult<()> {
    if find_by_username(pool, "demo").await?.is_some() {
        return Ok(());
    }

    let password_hash = crate::password::hash_password("changeme")
        .map_err(|e| crate::error::CoreError::Internal(e))?;

    sqlx::query(
        "INSERT INTO users (username, password_hash, mfa_secret, is_active) VALUES ($1, $2, $3, TRUE)",
    )
    .bind("demo")
    .bind(password_hash)
    .bind("JBSWY3DPEHPK3PXP")
    .execute(pool)
    .await?;

    tracing::info!("seeded default user 'demo' with password 'changeme'");
    Ok(())
}
