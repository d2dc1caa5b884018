//! Process-wide advisory lock keyed by project name, used by the pool
//! synchronizer so multiple instances starting up simultaneously serialize
//! instead of racing to insert/delete the same rows.

use sqlx::PgPool;

pub struct AdvisoryLock<'a> {
    pool: &'a PgPool,
    key: String,
}

impl<'a> AdvisoryLock<'a> {
    /// Acquire `pg_advisory_lock(hashtext(key))`, blocking until granted.
    pub async fn acquire(pool: &'a PgPool, key: &str) -> Result<AdvisoryLock<'a>, sqlx::Error> {
        sqlx::query("SELECT pg_advisory_lock(hashtext($1))")
            .bind(key)
            .execute(pool)
            .await?;
        Ok(AdvisoryLock {
            pool,
            key: key.to_string(),
        })
    }

    pub async fn release(self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT pg_advisory_unlock(hashtext($1))")
            .bind(&self.key)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}
